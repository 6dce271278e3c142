use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Stored timestamp layout for meal dates. Fixed width so that text
/// comparison in SQL matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Categories seeded into a fresh preferences record, with their weekly targets.
pub const DEFAULT_CATEGORY_TARGETS: &[(&str, i64)] =
    &[("meat", 1), ("fish", 1), ("chicken", 3), ("vegan", 2)];

pub const DEFAULT_COOLDOWN_DAYS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub order: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    pub is_favorite: bool,
    pub categories: Vec<String>,
    pub ingredients: Vec<RecipeIngredient>,
    pub steps: Vec<RecipeStep>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub time_minutes: Option<i64>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub steps: Vec<RecipeStep>,
}

/// Partial recipe update. `None` leaves a field untouched; for the nullable
/// columns `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateRecipe {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub time_minutes: Option<Option<i64>>,
    pub cuisine: Option<Option<String>>,
    pub is_favorite: Option<bool>,
    pub categories: Option<Vec<String>>,
    pub ingredients: Option<Vec<RecipeIngredient>>,
    pub steps: Option<Vec<RecipeStep>>,
}

impl UpdateRecipe {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.time_minutes.is_none()
            && self.cuisine.is_none()
            && self.is_favorite.is_none()
            && self.categories.is_none()
            && self.ingredients.is_none()
            && self.steps.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeFilter {
    /// Only recipes tagged with this category.
    pub category: Option<String>,
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    pub favorite: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: i64,
    pub uuid: String,
    pub recipe_id: i64,
    pub date: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    // Joined for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub recipe_id: i64,
    pub date: NaiveDateTime,
    pub served_at: Option<String>,
    pub notes: Option<String>,
}

/// Inclusive date range for meal queries. Either bound may be open.
#[derive(Debug, Clone, Copy, Default)]
pub struct MealRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl MealRange {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Whole days from `start` through `end`, both inclusive.
    #[must_use]
    pub fn days(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start: start.and_then(|d| d.and_hms_opt(0, 0, 0)),
            end: end.and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTarget {
    pub category: String,
    pub per_week: i64,
}

/// Weekly eating targets per category plus the repeat cooldown.
///
/// There is at most one stored record. A missing record is never created
/// behind a read; callers either run `Database::ensure_preferences` or fall
/// back to [`Preferences::default`]: meat 1, fish 1, chicken 3, vegan 2,
/// cooldown 5 days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub targets: Vec<CategoryTarget>,
    pub cooldown_days: i64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            targets: DEFAULT_CATEGORY_TARGETS
                .iter()
                .map(|&(category, per_week)| CategoryTarget {
                    category: category.to_string(),
                    per_week,
                })
                .collect(),
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
        }
    }
}

impl Preferences {
    #[must_use]
    pub fn target_for(&self, category: &str) -> Option<i64> {
        self.targets
            .iter()
            .find(|t| t.category == category)
            .map(|t| t.per_week)
    }
}

// --- Validation ---

/// Normalize a category tag: trimmed and lowercased, never empty.
pub fn normalize_category(raw: &str) -> Result<String> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        bail!("Category name must not be empty");
    }
    Ok(name)
}

/// Normalize a list of category tags, dropping duplicates but keeping the
/// first-seen order.
pub fn normalize_categories(raw: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for c in raw {
        let name = normalize_category(c)?;
        if !out.contains(&name) {
            out.push(name);
        }
    }
    Ok(out)
}

pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.chars().count() < 2 {
        bail!("Recipe title must be at least 2 characters");
    }
    Ok(title.to_string())
}

pub fn validate_time_minutes(minutes: Option<i64>) -> Result<()> {
    if minutes.is_some_and(|m| m <= 0) {
        bail!("time_minutes must be greater than 0");
    }
    Ok(())
}

pub fn validate_image_url(url: Option<&str>) -> Result<()> {
    if let Some(url) = url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("Invalid image URL '{url}'. Must start with http:// or https://");
        }
    }
    Ok(())
}

pub fn validate_ingredients(ingredients: &[RecipeIngredient]) -> Result<()> {
    if ingredients.iter().any(|i| i.name.trim().is_empty()) {
        bail!("Ingredient name must not be empty");
    }
    Ok(())
}

pub fn validate_steps(steps: &[RecipeStep]) -> Result<()> {
    if steps.iter().any(|s| s.text.trim().is_empty()) {
        bail!("Step text must not be empty");
    }
    Ok(())
}

/// Validate a new recipe and return it with a trimmed title and normalized
/// categories.
pub fn validate_new_recipe(recipe: &NewRecipe) -> Result<NewRecipe> {
    let title = validate_title(&recipe.title)?;
    validate_time_minutes(recipe.time_minutes)?;
    validate_image_url(recipe.image_url.as_deref())?;
    validate_ingredients(&recipe.ingredients)?;
    validate_steps(&recipe.steps)?;
    let categories = normalize_categories(&recipe.categories)?;
    Ok(NewRecipe {
        title,
        categories,
        ..recipe.clone()
    })
}

pub fn validate_update_recipe(update: &UpdateRecipe) -> Result<UpdateRecipe> {
    let title = update.title.as_deref().map(validate_title).transpose()?;
    if let Some(minutes) = update.time_minutes {
        validate_time_minutes(minutes)?;
    }
    if let Some(url) = &update.image_url {
        validate_image_url(url.as_deref())?;
    }
    if let Some(ingredients) = &update.ingredients {
        validate_ingredients(ingredients)?;
    }
    if let Some(steps) = &update.steps {
        validate_steps(steps)?;
    }
    let categories = update
        .categories
        .as_deref()
        .map(normalize_categories)
        .transpose()?;
    Ok(UpdateRecipe {
        title,
        categories,
        ..update.clone()
    })
}

/// Validate preferences: non-negative targets and cooldown, at least one
/// category, no duplicate categories. Returns the normalized record.
pub fn validate_preferences(prefs: &Preferences) -> Result<Preferences> {
    if prefs.cooldown_days < 0 {
        bail!("cooldown_days must not be negative");
    }
    if prefs.targets.is_empty() {
        bail!("At least one category target is required");
    }
    let mut targets: Vec<CategoryTarget> = Vec::with_capacity(prefs.targets.len());
    for t in &prefs.targets {
        let category = normalize_category(&t.category)?;
        if t.per_week < 0 {
            bail!("Target for '{category}' must not be negative");
        }
        if targets.iter().any(|existing| existing.category == category) {
            bail!("Duplicate target for category '{category}'");
        }
        targets.push(CategoryTarget {
            category,
            per_week: t.per_week,
        });
    }
    Ok(Preferences {
        targets,
        cooldown_days: prefs.cooldown_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preferences() {
        let prefs = Preferences::default();
        assert_eq!(prefs.cooldown_days, 5);
        assert_eq!(prefs.target_for("meat"), Some(1));
        assert_eq!(prefs.target_for("fish"), Some(1));
        assert_eq!(prefs.target_for("chicken"), Some(3));
        assert_eq!(prefs.target_for("vegan"), Some(2));
        assert_eq!(prefs.target_for("pasta"), None);
    }

    #[test]
    fn test_normalize_categories_dedups_and_lowercases() {
        let raw = vec![
            " Vegan ".to_string(),
            "fish".to_string(),
            "VEGAN".to_string(),
        ];
        assert_eq!(normalize_categories(&raw).unwrap(), vec!["vegan", "fish"]);
        assert!(normalize_categories(&["  ".to_string()]).is_err());
    }

    #[test]
    fn test_validate_new_recipe() {
        let ok = validate_new_recipe(&NewRecipe {
            title: "  Dal  ".to_string(),
            time_minutes: Some(30),
            categories: vec!["Vegan".to_string()],
            ..NewRecipe::default()
        })
        .unwrap();
        assert_eq!(ok.title, "Dal");
        assert_eq!(ok.categories, vec!["vegan"]);

        let short = NewRecipe {
            title: "x".to_string(),
            ..NewRecipe::default()
        };
        assert!(validate_new_recipe(&short).is_err());

        let bad_time = NewRecipe {
            title: "Soup".to_string(),
            time_minutes: Some(0),
            ..NewRecipe::default()
        };
        assert!(validate_new_recipe(&bad_time).is_err());

        let bad_url = NewRecipe {
            title: "Soup".to_string(),
            image_url: Some("ftp://example.com/soup.png".to_string()),
            ..NewRecipe::default()
        };
        assert!(validate_new_recipe(&bad_url).is_err());

        let blank_step = NewRecipe {
            title: "Soup".to_string(),
            steps: vec![RecipeStep {
                order: 1,
                text: " ".to_string(),
            }],
            ..NewRecipe::default()
        };
        assert!(validate_new_recipe(&blank_step).is_err());
    }

    #[test]
    fn test_validate_preferences() {
        let prefs = Preferences {
            targets: vec![CategoryTarget {
                category: " Pasta ".to_string(),
                per_week: 2,
            }],
            cooldown_days: 3,
        };
        let normalized = validate_preferences(&prefs).unwrap();
        assert_eq!(normalized.targets[0].category, "pasta");

        let negative = Preferences {
            targets: vec![CategoryTarget {
                category: "meat".to_string(),
                per_week: -1,
            }],
            cooldown_days: 3,
        };
        assert!(validate_preferences(&negative).is_err());

        let dup = Preferences {
            targets: vec![
                CategoryTarget {
                    category: "meat".to_string(),
                    per_week: 1,
                },
                CategoryTarget {
                    category: "MEAT".to_string(),
                    per_week: 2,
                },
            ],
            cooldown_days: 3,
        };
        assert!(validate_preferences(&dup).is_err());

        let negative_cooldown = Preferences {
            cooldown_days: -2,
            ..Preferences::default()
        };
        assert!(validate_preferences(&negative_cooldown).is_err());
    }

    #[test]
    fn test_meal_range_days_is_inclusive() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let range = MealRange::days(Some(d), Some(d));
        assert_eq!(range.start.unwrap().to_string(), "2024-06-15 00:00:00");
        assert_eq!(range.end.unwrap().to_string(), "2024-06-15 23:59:59.999");
    }
}
