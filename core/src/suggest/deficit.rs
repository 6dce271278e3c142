use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Meal, Preferences};
use crate::suggest::week::WeekWindow;

/// How far a category is below its weekly target. Never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deficit {
    pub category: String,
    pub deficit: i64,
}

/// Count this week's meals per category. A meal counts once for every
/// category of its recipe. Meals whose recipe is unknown are skipped.
#[must_use]
pub fn consumed_this_week(
    meals: &[Meal],
    categories_by_recipe: &HashMap<i64, &[String]>,
    week: &WeekWindow,
) -> HashMap<String, i64> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for meal in meals.iter().filter(|m| week.contains(m.date)) {
        let Some(categories) = categories_by_recipe.get(&meal.recipe_id) else {
            continue;
        };
        for category in *categories {
            *counts.entry(category.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// One deficit per configured category, in preference order.
#[must_use]
pub fn compute_deficits(prefs: &Preferences, consumed: &HashMap<String, i64>) -> Vec<Deficit> {
    prefs
        .targets
        .iter()
        .map(|t| Deficit {
            category: t.category.clone(),
            deficit: (t.per_week - consumed.get(&t.category).copied().unwrap_or(0)).max(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryTarget;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap()
    }

    fn meal(recipe_id: i64, date: NaiveDateTime) -> Meal {
        Meal {
            id: 0,
            uuid: String::new(),
            recipe_id,
            date,
            served_at: None,
            notes: None,
            created_at: String::new(),
            recipe_title: None,
        }
    }

    #[test]
    fn test_no_meals_gives_full_targets() {
        let prefs = Preferences::default();
        let deficits = compute_deficits(&prefs, &HashMap::new());
        let pairs: Vec<(&str, i64)> = deficits
            .iter()
            .map(|d| (d.category.as_str(), d.deficit))
            .collect();
        assert_eq!(
            pairs,
            vec![("meat", 1), ("fish", 1), ("chicken", 3), ("vegan", 2)]
        );
    }

    #[test]
    fn test_meal_counts_toward_every_category() {
        let surf_and_turf = vec!["meat".to_string(), "fish".to_string()];
        let mut index: HashMap<i64, &[String]> = HashMap::new();
        index.insert(1, &surf_and_turf);

        // Wednesday 2024-06-12 -> week of Mon 10th
        let week = WeekWindow::containing(at(12));
        let meals = vec![meal(1, at(11)), meal(1, at(9)), meal(99, at(11))];
        let consumed = consumed_this_week(&meals, &index, &week);

        // The 9th is the previous week, recipe 99 is unknown
        assert_eq!(consumed.get("meat"), Some(&1));
        assert_eq!(consumed.get("fish"), Some(&1));
        assert_eq!(consumed.len(), 2);
    }

    #[test]
    fn test_deficits_never_negative() {
        let prefs = Preferences {
            targets: vec![
                CategoryTarget {
                    category: "fish".to_string(),
                    per_week: 1,
                },
                CategoryTarget {
                    category: "vegan".to_string(),
                    per_week: 0,
                },
            ],
            cooldown_days: 5,
        };
        let consumed = HashMap::from([("fish".to_string(), 4), ("vegan".to_string(), 2)]);
        for d in compute_deficits(&prefs, &consumed) {
            assert_eq!(d.deficit, 0, "{}", d.category);
        }
    }

    #[test]
    fn test_partial_consumption() {
        let prefs = Preferences::default();
        let consumed = HashMap::from([("chicken".to_string(), 2), ("pasta".to_string(), 5)]);
        let deficits = compute_deficits(&prefs, &consumed);
        let chicken = deficits.iter().find(|d| d.category == "chicken").unwrap();
        assert_eq!(chicken.deficit, 1);
        // Unconfigured categories produce no entry
        assert!(deficits.iter().all(|d| d.category != "pasta"));
    }
}
