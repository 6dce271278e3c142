use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::SuggestionError;
use crate::models::{Meal, MealRange, NewMeal, Preferences, Recipe, RecipeFilter};
use crate::suggest::cooldown::{apply_cooldown, cooldown_cutoff, recently_eaten};
use crate::suggest::deficit::{Deficit, compute_deficits, consumed_this_week};
use crate::suggest::history::last_eaten_index;
use crate::suggest::rank::{Candidate, RankContext, rank_candidates};
use crate::suggest::week::{WeekWindow, is_weekday};

/// What the engine needs from persistence.
///
/// `Database` is the production implementation; tests plug in stores that
/// fail on purpose.
pub trait SuggestionStore {
    /// Recipes in insertion order.
    fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>>;
    fn get_recipe(&self, id: i64) -> Result<Option<Recipe>>;
    fn list_meals(&self, range: &MealRange) -> Result<Vec<Meal>>;
    fn create_meal(&self, meal: &NewMeal) -> Result<Meal>;
    /// `None` until preferences have been initialized.
    fn get_preferences(&self) -> Result<Option<Preferences>>;
}

impl SuggestionStore for Database {
    fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
        Database::list_recipes(self, filter)
    }

    fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        Database::get_recipe(self, id)
    }

    fn list_meals(&self, range: &MealRange) -> Result<Vec<Meal>> {
        Database::list_meals(self, range)
    }

    fn create_meal(&self, meal: &NewMeal) -> Result<Meal> {
        self.insert_meal(meal)
    }

    fn get_preferences(&self) -> Result<Option<Preferences>> {
        Database::get_preferences(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "recipe_id", rename_all = "snake_case")]
pub enum Suggestion {
    NoSuggestion,
    Suggested(i64),
}

impl Suggestion {
    #[must_use]
    pub fn recipe_id(self) -> Option<i64> {
        match self {
            Self::NoSuggestion => None,
            Self::Suggested(id) => Some(id),
        }
    }
}

impl From<Option<i64>> for Suggestion {
    fn from(id: Option<i64>) -> Self {
        id.map_or(Self::NoSuggestion, Self::Suggested)
    }
}

/// One entry of the ranked candidate list, with the inputs that placed it.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRecipe {
    pub id: i64,
    pub title: String,
    pub categories: Vec<String>,
    pub max_deficit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_eaten: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_eaten: Option<i64>,
    pub is_favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_minutes: Option<i64>,
}

/// Full outcome of one suggestion computation.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionPlan {
    pub generated_at: NaiveDateTime,
    pub week_start: NaiveDateTime,
    pub week_end: NaiveDateTime,
    pub is_weekday: bool,
    pub deficits: Vec<Deficit>,
    pub cooldown_days: i64,
    /// Recipes eaten on or after the cooldown cutoff.
    pub in_cooldown: Vec<i64>,
    /// Set when every candidate was in cooldown and the filter was skipped.
    pub cooldown_bypassed: bool,
    /// Best first.
    pub ranked: Vec<RankedRecipe>,
}

impl SuggestionPlan {
    #[must_use]
    pub fn suggestion(&self) -> Suggestion {
        self.ranked.first().map(|r| r.id).into()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptOutcome {
    pub meal: Meal,
    pub next_suggestion_id: Option<i64>,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Stateless orchestrator over a [`SuggestionStore`]. Nothing is cached
/// between calls.
pub struct Suggester<'a, S: SuggestionStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SuggestionStore + ?Sized> Suggester<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Compute the full ranking as of `now`, leaving out `exclude`.
    pub fn plan_at(&self, now: NaiveDateTime, exclude: Option<i64>) -> Result<SuggestionPlan> {
        let week = WeekWindow::containing(now);
        let prefs = self
            .store
            .get_preferences()
            .context("failed to read preferences")?
            .unwrap_or_default();
        let recipes = self
            .store
            .list_recipes(&RecipeFilter::default())
            .context("failed to list recipes")?;
        let meals = self
            .store
            .list_meals(&MealRange::all())
            .context("failed to list meals")?;

        let categories_by_recipe: HashMap<i64, &[String]> = recipes
            .iter()
            .map(|r| (r.id, r.categories.as_slice()))
            .collect();
        let consumed = consumed_this_week(&meals, &categories_by_recipe, &week);
        let deficits = compute_deficits(&prefs, &consumed);

        let recent = recently_eaten(&meals, cooldown_cutoff(now, prefs.cooldown_days));
        let last_eaten = last_eaten_index(&meals);

        let pool: Vec<Candidate<'_>> = recipes
            .iter()
            .filter(|r| Some(r.id) != exclude)
            .map(|r| Candidate::from_recipe(r, last_eaten.get(&r.id).copied()))
            .collect();
        let pool_size = pool.len();
        let (pool, cooldown_bypassed) = apply_cooldown(pool, &recent, |c| c.id);
        if cooldown_bypassed {
            debug!(pool_size, "every candidate is in cooldown, ranking the full pool");
        } else {
            debug!(pool_size, eligible = pool.len(), "cooldown applied");
        }

        let weekday = is_weekday(now);
        let ctx = RankContext::new(&deficits, now, weekday);
        let ranked: Vec<RankedRecipe> = rank_candidates(pool, &ctx)
            .iter()
            .map(|c| RankedRecipe {
                id: c.id,
                title: c.title.to_string(),
                categories: c.categories.to_vec(),
                max_deficit: ctx.max_deficit(c),
                last_eaten: c.last_eaten,
                days_since_eaten: c.last_eaten.map(|d| ctx.days_since(d)),
                is_favorite: c.is_favorite,
                time_minutes: c.time_minutes,
            })
            .collect();

        let mut in_cooldown: Vec<i64> = recent.into_iter().collect();
        in_cooldown.sort_unstable();

        Ok(SuggestionPlan {
            generated_at: now,
            week_start: week.start,
            week_end: week.end,
            is_weekday: weekday,
            deficits,
            cooldown_days: prefs.cooldown_days,
            in_cooldown,
            cooldown_bypassed,
            ranked,
        })
    }

    /// Best recipe as of `now`. Store failures degrade to `NoSuggestion`.
    pub fn suggest_next_at(&self, now: NaiveDateTime, exclude: Option<i64>) -> Suggestion {
        match self.plan_at(now, exclude) {
            Ok(plan) => plan.suggestion(),
            Err(err) => {
                warn!("suggestion unavailable: {err:#}");
                Suggestion::NoSuggestion
            }
        }
    }

    pub fn suggest_next(&self, exclude: Option<i64>) -> Suggestion {
        self.suggest_next_at(local_now(), exclude)
    }

    /// Record a meal of `recipe_id` dated `now` and return what to cook after it.
    pub fn accept_at(
        &self,
        now: NaiveDateTime,
        recipe_id: i64,
        served_at: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AcceptOutcome, SuggestionError> {
        self.require_recipe(recipe_id)?;

        let meal = self
            .store
            .create_meal(&NewMeal {
                recipe_id,
                date: now,
                served_at: non_blank(served_at),
                notes: non_blank(notes),
            })
            .map_err(SuggestionError::StoreUnavailable)?;
        info!(recipe_id, meal_id = meal.id, "suggestion accepted");

        let next_suggestion_id = self.suggest_next_at(now, None).recipe_id();
        Ok(AcceptOutcome {
            meal,
            next_suggestion_id,
        })
    }

    pub fn accept(
        &self,
        recipe_id: i64,
        served_at: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AcceptOutcome, SuggestionError> {
        self.accept_at(local_now(), recipe_id, served_at, notes)
    }

    /// Acknowledge a declined suggestion. Nothing is stored and future
    /// rankings are unchanged; ask again with `exclude` set to get an
    /// alternative.
    pub fn decline(&self, recipe_id: i64) -> Result<(), SuggestionError> {
        self.require_recipe(recipe_id)?;
        info!(recipe_id, "suggestion declined");
        Ok(())
    }

    fn require_recipe(&self, recipe_id: i64) -> Result<Recipe, SuggestionError> {
        if recipe_id <= 0 {
            return Err(SuggestionError::Validation(format!(
                "recipe id must be positive (got {recipe_id})"
            )));
        }
        self.store
            .get_recipe(recipe_id)
            .map_err(SuggestionError::StoreUnavailable)?
            .ok_or(SuggestionError::NotFound(recipe_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryTarget, NewRecipe};
    use chrono::NaiveDate;

    // 2024-06-12 is a Wednesday
    fn wednesday() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 12)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap()
    }

    fn saturday() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap()
    }

    fn days_before(now: NaiveDateTime, days: i64) -> NaiveDateTime {
        now - chrono::Duration::days(days)
    }

    fn add_recipe(db: &Database, title: &str, categories: &[&str]) -> Recipe {
        db.create_recipe(&NewRecipe {
            title: title.to_string(),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
            ..NewRecipe::default()
        })
        .unwrap()
    }

    fn eat(db: &Database, recipe_id: i64, date: NaiveDateTime) {
        db.insert_meal(&NewMeal {
            recipe_id,
            date,
            served_at: None,
            notes: None,
        })
        .unwrap();
    }

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.ensure_preferences().unwrap();
        db
    }

    struct FailingStore;

    impl SuggestionStore for FailingStore {
        fn list_recipes(&self, _filter: &RecipeFilter) -> Result<Vec<Recipe>> {
            anyhow::bail!("connection refused")
        }
        fn get_recipe(&self, _id: i64) -> Result<Option<Recipe>> {
            anyhow::bail!("connection refused")
        }
        fn list_meals(&self, _range: &MealRange) -> Result<Vec<Meal>> {
            anyhow::bail!("connection refused")
        }
        fn create_meal(&self, _meal: &NewMeal) -> Result<Meal> {
            anyhow::bail!("connection refused")
        }
        fn get_preferences(&self) -> Result<Option<Preferences>> {
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn test_no_recipes_no_suggestion() {
        let db = seeded_db();
        let engine = Suggester::new(&db);
        assert_eq!(
            engine.suggest_next_at(wednesday(), None),
            Suggestion::NoSuggestion
        );
    }

    #[test]
    fn test_default_deficits_prefer_chicken() {
        let db = seeded_db();
        let meat = add_recipe(&db, "Steak", &["meat"]);
        let chicken = add_recipe(&db, "Roast Chicken", &["chicken"]);
        let engine = Suggester::new(&db);

        let plan = engine.plan_at(wednesday(), None).unwrap();
        let deficits: Vec<(&str, i64)> = plan
            .deficits
            .iter()
            .map(|d| (d.category.as_str(), d.deficit))
            .collect();
        assert_eq!(
            deficits,
            vec![("meat", 1), ("fish", 1), ("chicken", 3), ("vegan", 2)]
        );
        assert_eq!(plan.suggestion(), Suggestion::Suggested(chicken.id));
        assert_eq!(plan.ranked[1].id, meat.id);
    }

    #[test]
    fn test_missing_preferences_use_defaults() {
        let db = Database::open_in_memory().unwrap();
        add_recipe(&db, "Steak", &["meat"]);
        let vegan = add_recipe(&db, "Lentil Stew", &["vegan"]);
        let engine = Suggester::new(&db);

        let plan = engine.plan_at(wednesday(), None).unwrap();
        assert_eq!(plan.cooldown_days, 5);
        assert_eq!(plan.suggestion(), Suggestion::Suggested(vegan.id));
        // Suggesting never initializes preferences
        assert!(db.get_preferences().unwrap().is_none());
    }

    #[test]
    fn test_meals_this_week_reduce_deficit() {
        let db = seeded_db();
        let chicken = add_recipe(&db, "Roast Chicken", &["chicken"]);
        let curry = add_recipe(&db, "Chicken Curry", &["chicken"]);
        let fish = add_recipe(&db, "Baked Cod", &["fish"]);
        let now = wednesday();
        // Three chicken meals this week (Mon, Tue) and one last week
        eat(&db, chicken.id, days_before(now, 2));
        eat(&db, curry.id, days_before(now, 1));
        eat(&db, curry.id, days_before(now, 1));
        eat(&db, fish.id, days_before(now, 8));

        let plan = Suggester::new(&db).plan_at(now, None).unwrap();
        let chicken_deficit = plan
            .deficits
            .iter()
            .find(|d| d.category == "chicken")
            .unwrap();
        assert_eq!(chicken_deficit.deficit, 0);
        let fish_deficit = plan.deficits.iter().find(|d| d.category == "fish").unwrap();
        assert_eq!(fish_deficit.deficit, 1);
        assert_eq!(plan.suggestion(), Suggestion::Suggested(fish.id));
    }

    #[test]
    fn test_cooldown_excludes_recent_recipe() {
        let db = seeded_db();
        let a = add_recipe(&db, "Falafel", &["vegan"]);
        let b = add_recipe(&db, "Dal", &["vegan"]);
        let now = wednesday();
        eat(&db, a.id, days_before(now, 10));
        eat(&db, b.id, days_before(now, 2));

        let plan = Suggester::new(&db).plan_at(now, None).unwrap();
        assert_eq!(plan.in_cooldown, vec![b.id]);
        assert!(!plan.cooldown_bypassed);
        assert_eq!(plan.ranked.len(), 1);
        assert_eq!(plan.suggestion(), Suggestion::Suggested(a.id));
        assert_eq!(plan.ranked[0].days_since_eaten, Some(10));
    }

    #[test]
    fn test_cooldown_fallback_when_everything_is_recent() {
        let db = seeded_db();
        let a = add_recipe(&db, "Falafel", &["vegan"]);
        let b = add_recipe(&db, "Dal", &["vegan"]);
        let now = wednesday();
        eat(&db, a.id, days_before(now, 1));
        eat(&db, b.id, days_before(now, 3));

        let plan = Suggester::new(&db).plan_at(now, None).unwrap();
        assert!(plan.cooldown_bypassed);
        assert_eq!(plan.ranked.len(), 2);
        // Eaten longer ago comes first
        assert_eq!(plan.suggestion(), Suggestion::Suggested(b.id));
    }

    #[test]
    fn test_suggestion_respects_cooldown_unless_pool_would_be_empty() {
        let db = seeded_db();
        let now = wednesday();
        let recipes: Vec<Recipe> = ["Tacos", "Ramen", "Paella", "Risotto"]
            .iter()
            .map(|t| add_recipe(&db, t, &["meat"]))
            .collect();
        let engine = Suggester::new(&db);

        // Eat recipes one at a time; the pick stays out of cooldown until
        // every recipe is in it.
        for (i, recipe) in recipes.iter().enumerate() {
            eat(&db, recipe.id, days_before(now, 1));
            let plan = engine.plan_at(now, None).unwrap();
            let pick = plan.suggestion().recipe_id().unwrap();
            if i + 1 < recipes.len() {
                assert!(!plan.in_cooldown.contains(&pick));
            } else {
                assert!(plan.cooldown_bypassed);
            }
        }
    }

    #[test]
    fn test_exclude_gives_alternative() {
        let db = seeded_db();
        let chicken = add_recipe(&db, "Roast Chicken", &["chicken"]);
        let vegan = add_recipe(&db, "Lentil Stew", &["vegan"]);
        let engine = Suggester::new(&db);

        let first = engine.suggest_next_at(wednesday(), None);
        assert_eq!(first, Suggestion::Suggested(chicken.id));
        // Same inputs, same answer
        assert_eq!(engine.suggest_next_at(wednesday(), None), first);

        let alternative = engine.suggest_next_at(wednesday(), Some(chicken.id));
        assert_eq!(alternative, Suggestion::Suggested(vegan.id));
    }

    #[test]
    fn test_exclude_only_recipe_gives_nothing() {
        let db = seeded_db();
        let only = add_recipe(&db, "Roast Chicken", &["chicken"]);
        let engine = Suggester::new(&db);
        assert_eq!(
            engine.suggest_next_at(wednesday(), Some(only.id)),
            Suggestion::NoSuggestion
        );
    }

    #[test]
    fn test_weekday_time_rule() {
        let db = seeded_db();
        let slow = db
            .create_recipe(&NewRecipe {
                title: "Slow Stew".to_string(),
                time_minutes: Some(45),
                categories: vec!["vegan".to_string()],
                ..NewRecipe::default()
            })
            .unwrap();
        let quick = db
            .create_recipe(&NewRecipe {
                title: "Quick Salad".to_string(),
                time_minutes: Some(15),
                categories: vec!["vegan".to_string()],
                ..NewRecipe::default()
            })
            .unwrap();
        let engine = Suggester::new(&db);

        assert_eq!(
            engine.suggest_next_at(wednesday(), None),
            Suggestion::Suggested(quick.id)
        );
        assert_eq!(
            engine.suggest_next_at(saturday(), None),
            Suggestion::Suggested(slow.id)
        );
    }

    #[test]
    fn test_custom_category_targets() {
        let db = Database::open_in_memory().unwrap();
        db.save_preferences(&Preferences {
            targets: vec![CategoryTarget {
                category: "pasta".to_string(),
                per_week: 2,
            }],
            cooldown_days: 5,
        })
        .unwrap();
        add_recipe(&db, "Roast Chicken", &["chicken"]);
        let pasta = add_recipe(&db, "Carbonara", &["pasta"]);

        let plan = Suggester::new(&db).plan_at(wednesday(), None).unwrap();
        assert_eq!(plan.deficits.len(), 1);
        assert_eq!(plan.suggestion(), Suggestion::Suggested(pasta.id));
    }

    #[test]
    fn test_accept_records_meal_and_moves_on() {
        let db = seeded_db();
        let r1 = add_recipe(&db, "Roast Chicken", &["chicken"]);
        let r2 = add_recipe(&db, "Chicken Curry", &["chicken"]);
        let engine = Suggester::new(&db);
        let now = wednesday();
        assert_eq!(engine.suggest_next_at(now, None), Suggestion::Suggested(r1.id));

        let outcome = engine
            .accept_at(now, r1.id, Some("dinner"), Some("  "))
            .unwrap();
        assert_eq!(outcome.meal.recipe_id, r1.id);
        assert_eq!(outcome.meal.date, now);
        assert_eq!(outcome.meal.served_at.as_deref(), Some("dinner"));
        assert_eq!(outcome.meal.notes, None);
        assert_eq!(outcome.next_suggestion_id, Some(r2.id));

        let meals = db.list_meals(&MealRange::all()).unwrap();
        assert_eq!(meals.len(), 1);
    }

    #[test]
    fn test_accept_unknown_recipe() {
        let db = seeded_db();
        let engine = Suggester::new(&db);
        let err = engine.accept_at(wednesday(), 42, None, None).unwrap_err();
        assert!(matches!(err, SuggestionError::NotFound(42)));
        assert!(db.list_meals(&MealRange::all()).unwrap().is_empty());

        let err = engine.accept_at(wednesday(), 0, None, None).unwrap_err();
        assert!(matches!(err, SuggestionError::Validation(_)));
    }

    #[test]
    fn test_decline_changes_nothing() {
        let db = seeded_db();
        let r1 = add_recipe(&db, "Roast Chicken", &["chicken"]);
        add_recipe(&db, "Steak", &["meat"]);
        let engine = Suggester::new(&db);

        engine.decline(r1.id).unwrap();
        assert!(db.list_meals(&MealRange::all()).unwrap().is_empty());
        assert_eq!(
            engine.suggest_next_at(wednesday(), None),
            Suggestion::Suggested(r1.id)
        );
        assert!(matches!(
            engine.decline(999),
            Err(SuggestionError::NotFound(999))
        ));
    }

    #[test]
    fn test_store_failure_degrades_gracefully() {
        let engine = Suggester::new(&FailingStore);
        assert_eq!(
            engine.suggest_next_at(wednesday(), None),
            Suggestion::NoSuggestion
        );
        assert!(engine.plan_at(wednesday(), None).is_err());

        let err = engine.accept_at(wednesday(), 1, None, None).unwrap_err();
        assert!(matches!(err, SuggestionError::StoreUnavailable(_)));
        assert!(matches!(
            engine.decline(1),
            Err(SuggestionError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_suggestion_serialization() {
        let json = serde_json::to_value(Suggestion::Suggested(3)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "suggested", "recipe_id": 3}));
        let json = serde_json::to_value(Suggestion::NoSuggestion).unwrap();
        assert_eq!(json, serde_json::json!({"state": "no_suggestion"}));
        assert_eq!(Suggestion::from(None), Suggestion::NoSuggestion);
    }
}
