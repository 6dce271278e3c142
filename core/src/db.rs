use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::models::{
    CategoryTarget, Meal, MealRange, NewMeal, NewRecipe, Preferences, Recipe, RecipeFilter,
    RecipeIngredient, RecipeStep, TIMESTAMP_FORMAT, UpdateRecipe,
};

pub struct Database {
    conn: Connection,
}

const RECIPE_COLUMNS: &str = "r.id, r.uuid, r.title, r.description, r.image_url, r.time_minutes,
     r.cuisine, r.is_favorite, r.created_at, r.updated_at";

const MEAL_COLUMNS: &str =
    "m.id, m.uuid, m.recipe_id, m.date, m.served_at, m.notes, m.created_at, r.title";

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn escape_like(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    description TEXT,
                    image_url TEXT,
                    time_minutes INTEGER,
                    cuisine TEXT,
                    is_favorite INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS recipe_categories (
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    category_id INTEGER NOT NULL REFERENCES categories(id),
                    position INTEGER NOT NULL,
                    PRIMARY KEY (recipe_id, category_id)
                );

                CREATE TABLE IF NOT EXISTS recipe_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    amount TEXT,
                    position INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_steps (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    step_order INTEGER NOT NULL,
                    text TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    served_at TEXT,
                    notes TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meals_date ON meals(date);
                CREATE INDEX IF NOT EXISTS idx_meals_recipe ON meals(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_recipe_categories_category ON recipe_categories(category_id);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            // Singleton preferences row plus an ordered list of category targets.
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS preferences (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    cooldown_days INTEGER NOT NULL CHECK (cooldown_days >= 0),
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS category_targets (
                    category TEXT PRIMARY KEY,
                    per_week INTEGER NOT NULL CHECK (per_week >= 0),
                    position INTEGER NOT NULL
                );

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects RECIPE_COLUMNS order. Categories, ingredients and steps are
    // filled in by `hydrate_recipe`.
    fn recipe_from_row(row: &Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            uuid: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            image_url: row.get(4)?,
            time_minutes: row.get(5)?,
            cuisine: row.get(6)?,
            is_favorite: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            categories: Vec::new(),
            ingredients: Vec::new(),
            steps: Vec::new(),
        })
    }

    // Expects MEAL_COLUMNS order.
    fn meal_from_row(row: &Row) -> rusqlite::Result<Meal> {
        let raw_date: String = row.get(3)?;
        Ok(Meal {
            id: row.get(0)?,
            uuid: row.get(1)?,
            recipe_id: row.get(2)?,
            date: parse_timestamp(3, &raw_date)?,
            served_at: row.get(4)?,
            notes: row.get(5)?,
            created_at: row.get(6)?,
            recipe_title: row.get(7)?,
        })
    }

    fn hydrate_recipe(&self, mut recipe: Recipe) -> Result<Recipe> {
        recipe.categories = self.get_recipe_categories(recipe.id)?;

        let mut stmt = self.conn.prepare(
            "SELECT name, amount FROM recipe_ingredients WHERE recipe_id = ?1 ORDER BY position, id",
        )?;
        recipe.ingredients = stmt
            .query_map(params![recipe.id], |row| {
                Ok(RecipeIngredient {
                    name: row.get(0)?,
                    amount: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT step_order, text FROM recipe_steps WHERE recipe_id = ?1 ORDER BY step_order, id",
        )?;
        recipe.steps = stmt
            .query_map(params![recipe.id], |row| {
                Ok(RecipeStep {
                    order: row.get(0)?,
                    text: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(recipe)
    }

    // --- Categories ---

    fn category_id(&self, name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO categories (name) VALUES (?1)",
            params![name],
        )?;
        self.conn
            .query_row(
                "SELECT id FROM categories WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .context("Category not found")
    }

    pub fn get_recipe_categories(&self, recipe_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.name FROM recipe_categories rc
             JOIN categories c ON c.id = rc.category_id
             WHERE rc.recipe_id = ?1
             ORDER BY rc.position",
        )?;
        let names = stmt
            .query_map(params![recipe_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Every category name known to the store, whether from recipes or
    /// preferences.
    pub fn list_categories(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM categories
             UNION
             SELECT category FROM category_targets
             ORDER BY 1",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn set_recipe_categories(&self, recipe_id: i64, categories: &[String]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM recipe_categories WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        for (position, name) in categories.iter().enumerate() {
            let category_id = self.category_id(name)?;
            self.conn.execute(
                "INSERT OR IGNORE INTO recipe_categories (recipe_id, category_id, position) VALUES (?1, ?2, ?3)",
                params![recipe_id, category_id, i64::try_from(position)?],
            )?;
        }
        Ok(())
    }

    fn set_recipe_ingredients(&self, recipe_id: i64, ingredients: &[RecipeIngredient]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        for (position, ing) in ingredients.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO recipe_ingredients (recipe_id, name, amount, position) VALUES (?1, ?2, ?3, ?4)",
                params![recipe_id, ing.name.trim(), ing.amount, i64::try_from(position)?],
            )?;
        }
        Ok(())
    }

    fn set_recipe_steps(&self, recipe_id: i64, steps: &[RecipeStep]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM recipe_steps WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        for step in steps {
            self.conn.execute(
                "INSERT INTO recipe_steps (recipe_id, step_order, text) VALUES (?1, ?2, ?3)",
                params![recipe_id, step.order, step.text.trim()],
            )?;
        }
        Ok(())
    }

    // --- Recipes ---

    /// Insert a recipe with its categories, ingredients and steps. Input is
    /// expected to be validated already (see `models::validate_new_recipe`).
    pub fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();

        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "INSERT INTO recipes (uuid, title, description, image_url, time_minutes, cuisine, is_favorite, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                uuid,
                recipe.title,
                recipe.description,
                recipe.image_url,
                recipe.time_minutes,
                recipe.cuisine,
                recipe.is_favorite,
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.set_recipe_categories(id, &recipe.categories)?;
        self.set_recipe_ingredients(id, &recipe.ingredients)?;
        self.set_recipe_steps(id, &recipe.steps)?;
        tx.commit()?;

        self.get_recipe(id)?.context("Recipe not found")
    }

    pub fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        let base = self
            .conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = ?1"),
                params![id],
                Self::recipe_from_row,
            )
            .optional()?;
        base.map(|r| self.hydrate_recipe(r)).transpose()
    }

    /// List recipes in insertion order, optionally narrowed by category,
    /// title search and favorite flag.
    pub fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
        let category = filter
            .category
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(escape_like);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r
             WHERE (?1 IS NULL OR EXISTS (
                        SELECT 1 FROM recipe_categories rc
                        JOIN categories c ON c.id = rc.category_id
                        WHERE rc.recipe_id = r.id AND c.name = ?1))
               AND (?2 IS NULL OR r.title LIKE ?2 ESCAPE '\\')
               AND (?3 IS NULL OR r.is_favorite = ?3)
             ORDER BY r.id"
        ))?;
        let bases = stmt
            .query_map(
                params![category, pattern, filter.favorite],
                Self::recipe_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        bases.into_iter().map(|r| self.hydrate_recipe(r)).collect()
    }

    /// Apply a partial update. Returns `None` when the recipe does not exist.
    pub fn update_recipe(&self, id: i64, update: &UpdateRecipe) -> Result<Option<Recipe>> {
        if self.get_recipe(id)?.is_none() {
            return Ok(None);
        }

        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        if let Some(ref title) = update.title {
            self.conn.execute(
                "UPDATE recipes SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now, id],
            )?;
        }
        if let Some(ref description) = update.description {
            self.conn.execute(
                "UPDATE recipes SET description = ?1, updated_at = ?2 WHERE id = ?3",
                params![description, now, id],
            )?;
        }
        if let Some(ref image_url) = update.image_url {
            self.conn.execute(
                "UPDATE recipes SET image_url = ?1, updated_at = ?2 WHERE id = ?3",
                params![image_url, now, id],
            )?;
        }
        if let Some(time_minutes) = update.time_minutes {
            self.conn.execute(
                "UPDATE recipes SET time_minutes = ?1, updated_at = ?2 WHERE id = ?3",
                params![time_minutes, now, id],
            )?;
        }
        if let Some(ref cuisine) = update.cuisine {
            self.conn.execute(
                "UPDATE recipes SET cuisine = ?1, updated_at = ?2 WHERE id = ?3",
                params![cuisine, now, id],
            )?;
        }
        if let Some(is_favorite) = update.is_favorite {
            self.conn.execute(
                "UPDATE recipes SET is_favorite = ?1, updated_at = ?2 WHERE id = ?3",
                params![is_favorite, now, id],
            )?;
        }
        if let Some(ref categories) = update.categories {
            self.set_recipe_categories(id, categories)?;
        }
        if let Some(ref ingredients) = update.ingredients {
            self.set_recipe_ingredients(id, ingredients)?;
        }
        if let Some(ref steps) = update.steps {
            self.set_recipe_steps(id, steps)?;
        }
        if update.categories.is_some() || update.ingredients.is_some() || update.steps.is_some() {
            self.conn.execute(
                "UPDATE recipes SET updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
        }
        tx.commit()?;

        self.get_recipe(id)
    }

    /// Flip the favorite flag. Returns `None` when the recipe does not exist.
    pub fn toggle_favorite(&self, id: i64) -> Result<Option<Recipe>> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE recipes SET is_favorite = NOT is_favorite, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_recipe(id)
    }

    /// Delete a recipe together with its meal history.
    pub fn delete_recipe(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Meals ---

    pub fn insert_meal(&self, meal: &NewMeal) -> Result<Meal> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO meals (uuid, recipe_id, date, served_at, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid,
                meal.recipe_id,
                format_timestamp(meal.date),
                meal.served_at,
                meal.notes,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_meal(id)
    }

    pub fn get_meal(&self, id: i64) -> Result<Meal> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {MEAL_COLUMNS} FROM meals m
                     JOIN recipes r ON r.id = m.recipe_id
                     WHERE m.id = ?1"
                ),
                params![id],
                Self::meal_from_row,
            )
            .context("Meal not found")
    }

    /// Meals inside `range`, most recent first.
    pub fn list_meals(&self, range: &MealRange) -> Result<Vec<Meal>> {
        let start = range.start.map(format_timestamp);
        let end = range.end.map(format_timestamp);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals m
             JOIN recipes r ON r.id = m.recipe_id
             WHERE (?1 IS NULL OR m.date >= ?1)
               AND (?2 IS NULL OR m.date <= ?2)
             ORDER BY m.date DESC, m.id DESC"
        ))?;
        let meals = stmt
            .query_map(params![start, end], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    pub fn delete_meal(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM meals WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Preferences ---

    /// Read the stored preferences. Never writes; `None` means the record
    /// has not been initialized.
    pub fn get_preferences(&self) -> Result<Option<Preferences>> {
        let cooldown_days: Option<i64> = self
            .conn
            .query_row(
                "SELECT cooldown_days FROM preferences WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let Some(cooldown_days) = cooldown_days else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT category, per_week FROM category_targets ORDER BY position, category",
        )?;
        let targets = stmt
            .query_map([], |row| {
                Ok(CategoryTarget {
                    category: row.get(0)?,
                    per_week: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Preferences {
            targets,
            cooldown_days,
        }))
    }

    /// Replace the preferences record. Input is expected to be validated
    /// already (see `models::validate_preferences`).
    pub fn save_preferences(&self, prefs: &Preferences) -> Result<Preferences> {
        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO preferences (id, cooldown_days, updated_at) VALUES (1, ?1, ?2)",
            params![prefs.cooldown_days, now],
        )?;
        self.conn.execute("DELETE FROM category_targets", [])?;
        for (position, target) in prefs.targets.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO category_targets (category, per_week, position) VALUES (?1, ?2, ?3)",
                params![target.category, target.per_week, i64::try_from(position)?],
            )?;
        }
        tx.commit()?;
        Ok(prefs.clone())
    }

    /// Explicit initialization step: store `Preferences::default()` unless a
    /// record already exists. Returns the effective record.
    pub fn ensure_preferences(&self) -> Result<Preferences> {
        if let Some(existing) = self.get_preferences()? {
            return Ok(existing);
        }
        self.save_preferences(&Preferences::default())
    }
}
