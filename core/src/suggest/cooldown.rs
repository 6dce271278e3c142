use std::collections::HashSet;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::Meal;

/// Start of the day `cooldown_days` before `now`. Meals on or after this
/// instant put their recipe in cooldown.
#[must_use]
pub fn cooldown_cutoff(now: NaiveDateTime, cooldown_days: i64) -> NaiveDateTime {
    let days = u64::try_from(cooldown_days).unwrap_or(0);
    now.date()
        .checked_sub_days(Days::new(days))
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Recipe ids with at least one meal dated on or after `cutoff`.
#[must_use]
pub fn recently_eaten(meals: &[Meal], cutoff: NaiveDateTime) -> HashSet<i64> {
    meals
        .iter()
        .filter(|m| m.date >= cutoff)
        .map(|m| m.recipe_id)
        .collect()
}

/// Drop everything in `recent` from the pool, unless that would empty it.
/// The flag reports whether the filter had to be bypassed.
pub fn apply_cooldown<T>(
    pool: Vec<T>,
    recent: &HashSet<i64>,
    id_of: impl Fn(&T) -> i64,
) -> (Vec<T>, bool) {
    if pool.iter().all(|item| recent.contains(&id_of(item))) {
        let bypassed = !pool.is_empty();
        return (pool, bypassed);
    }
    let kept = pool
        .into_iter()
        .filter(|item| !recent.contains(&id_of(item)))
        .collect();
    (kept, false)
}
