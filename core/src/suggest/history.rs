use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::models::Meal;

/// Most recent meal date per recipe. Recipes never eaten are absent.
///
/// Works on history in any order; the store happens to return it newest
/// first.
#[must_use]
pub fn last_eaten_index(meals: &[Meal]) -> HashMap<i64, NaiveDateTime> {
    let mut index: HashMap<i64, NaiveDateTime> = HashMap::new();
    for meal in meals {
        index
            .entry(meal.recipe_id)
            .and_modify(|latest| {
                if meal.date > *latest {
                    *latest = meal.date;
                }
            })
            .or_insert(meal.date);
    }
    index
}
