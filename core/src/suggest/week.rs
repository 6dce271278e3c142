use chrono::{Datelike, Days, NaiveDateTime, NaiveTime};

/// Monday 00:00:00.000 through Sunday 23:59:59.999 of the week containing a
/// given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl WeekWindow {
    #[must_use]
    pub fn containing(now: NaiveDateTime) -> Self {
        let date = now.date();
        let back = u64::from(date.weekday().num_days_from_monday());
        let monday = date - Days::new(back);
        let start = monday.and_time(NaiveTime::MIN);
        let end = start + chrono::Duration::days(7) - chrono::Duration::milliseconds(1);
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Monday through Friday.
#[must_use]
pub fn is_weekday(now: NaiveDateTime) -> bool {
    now.weekday().num_days_from_monday() < 5
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_midweek() {
        // 2024-06-12 is a Wednesday
        let week = WeekWindow::containing(at(2024, 6, 12, 18, 30));
        assert_eq!(week.start, at(2024, 6, 10, 0, 0));
        assert_eq!(
            week.end,
            NaiveDate::from_ymd_opt(2024, 6, 16)
                .unwrap()
                .and_hms_milli_opt(23, 59, 59, 999)
                .unwrap()
        );
    }

    #[test]
    fn test_sunday_belongs_to_the_week_that_started_monday() {
        let week = WeekWindow::containing(at(2024, 6, 16, 21, 0));
        assert_eq!(week.start, at(2024, 6, 10, 0, 0));
    }

    #[test]
    fn test_monday_midnight_starts_a_new_week() {
        let week = WeekWindow::containing(at(2024, 6, 17, 0, 0));
        assert_eq!(week.start, at(2024, 6, 17, 0, 0));
        assert!(week.contains(at(2024, 6, 17, 0, 0)));
        assert!(!week.contains(at(2024, 6, 16, 23, 59)));
        assert!(week.contains(at(2024, 6, 23, 23, 59)));
        assert!(!week.contains(at(2024, 6, 24, 0, 0)));
    }

    #[test]
    fn test_is_weekday() {
        assert!(is_weekday(at(2024, 6, 10, 12, 0))); // Monday
        assert!(is_weekday(at(2024, 6, 14, 12, 0))); // Friday
        assert!(!is_weekday(at(2024, 6, 15, 12, 0))); // Saturday
        assert!(!is_weekday(at(2024, 6, 16, 12, 0))); // Sunday
    }
}
