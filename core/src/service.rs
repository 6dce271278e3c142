use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;

use crate::db::Database;
use crate::error::SuggestionError;
use crate::models::{
    Meal, MealRange, NewMeal, NewRecipe, Preferences, Recipe, RecipeFilter, UpdateRecipe,
    validate_new_recipe, validate_preferences, validate_update_recipe,
};
use crate::suggest::engine::non_blank;
use crate::suggest::{AcceptOutcome, Suggester, Suggestion, SuggestionPlan};

/// Single entry point for front ends: the recipe store plus the suggestion
/// engine, with input validation in front of every write.
pub struct NextDishService {
    db: Database,
}

impl NextDishService {
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    fn suggester(&self) -> Suggester<'_, Database> {
        Suggester::new(&self.db)
    }

    // --- Recipes ---

    pub fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let recipe = validate_new_recipe(recipe)?;
        self.db.create_recipe(&recipe)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        self.db.get_recipe(id)
    }

    pub fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
        self.db.list_recipes(filter)
    }

    pub fn update_recipe(&self, id: i64, update: &UpdateRecipe) -> Result<Option<Recipe>> {
        if update.is_empty() {
            bail!("Nothing to update");
        }
        let update = validate_update_recipe(update)?;
        self.db.update_recipe(id, &update)
    }

    pub fn toggle_favorite(&self, id: i64) -> Result<Option<Recipe>> {
        self.db.toggle_favorite(id)
    }

    /// Delete a recipe. Its meal history goes with it.
    pub fn delete_recipe(&self, id: i64) -> Result<bool> {
        self.db.delete_recipe(id)
    }

    pub fn list_categories(&self) -> Result<Vec<String>> {
        self.db.list_categories()
    }

    // --- Meals ---

    /// Record a meal eaten at `date` outside of the suggestion flow.
    ///
    /// A missing recipe is reported as [`SuggestionError::NotFound`] inside
    /// the `anyhow::Error`. Blank `served_at`/`notes` are stored as `None`.
    pub fn log_meal(
        &self,
        recipe_id: i64,
        date: NaiveDateTime,
        served_at: Option<String>,
        notes: Option<String>,
    ) -> Result<Meal> {
        if self.db.get_recipe(recipe_id)?.is_none() {
            return Err(SuggestionError::NotFound(recipe_id).into());
        }
        self.db.insert_meal(&NewMeal {
            recipe_id,
            date,
            served_at: non_blank(served_at.as_deref()),
            notes: non_blank(notes.as_deref()),
        })
    }

    pub fn list_meals(&self, range: &MealRange) -> Result<Vec<Meal>> {
        self.db.list_meals(range)
    }

    pub fn delete_meal(&self, id: i64) -> Result<bool> {
        self.db.delete_meal(id)
    }

    // --- Preferences ---

    /// Stored preferences, or `None` before `ensure_preferences` has run.
    pub fn get_preferences(&self) -> Result<Option<Preferences>> {
        self.db.get_preferences()
    }

    /// What the engine will actually use: stored preferences or the defaults.
    pub fn effective_preferences(&self) -> Result<Preferences> {
        Ok(self.db.get_preferences()?.unwrap_or_default())
    }

    pub fn ensure_preferences(&self) -> Result<Preferences> {
        self.db
            .ensure_preferences()
            .context("failed to initialize preferences")
    }

    pub fn update_preferences(&self, prefs: &Preferences) -> Result<Preferences> {
        let prefs = validate_preferences(prefs)?;
        self.db.save_preferences(&prefs)
    }

    // --- Suggestions ---

    pub fn suggest_next(&self, exclude: Option<i64>) -> Suggestion {
        self.suggester().suggest_next(exclude)
    }

    /// The suggested recipe itself rather than its id.
    pub fn suggest_recipe(&self, exclude: Option<i64>) -> Result<Option<Recipe>> {
        match self.suggest_next(exclude).recipe_id() {
            Some(id) => self.db.get_recipe(id),
            None => Ok(None),
        }
    }

    /// The full ranking behind a suggestion, for inspection.
    pub fn suggestion_plan(&self, exclude: Option<i64>) -> Result<SuggestionPlan> {
        self.suggester()
            .plan_at(chrono::Local::now().naive_local(), exclude)
    }

    pub fn accept_suggestion(
        &self,
        recipe_id: i64,
        served_at: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AcceptOutcome, SuggestionError> {
        self.suggester().accept(recipe_id, served_at, notes)
    }

    pub fn accept_suggestion_at(
        &self,
        now: NaiveDateTime,
        recipe_id: i64,
        served_at: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AcceptOutcome, SuggestionError> {
        self.suggester().accept_at(now, recipe_id, served_at, notes)
    }

    pub fn decline_suggestion(&self, recipe_id: i64) -> Result<(), SuggestionError> {
        self.suggester().decline(recipe_id)
    }

    /// Decline `recipe_id` and return the best alternative to it.
    pub fn decline_and_suggest(&self, recipe_id: i64) -> Result<Suggestion, SuggestionError> {
        self.decline_and_suggest_at(chrono::Local::now().naive_local(), recipe_id)
    }

    pub fn decline_and_suggest_at(
        &self,
        now: NaiveDateTime,
        recipe_id: i64,
    ) -> Result<Suggestion, SuggestionError> {
        let engine = self.suggester();
        engine.decline(recipe_id)?;
        Ok(engine.suggest_next_at(now, Some(recipe_id)))
    }
}
