use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nextdish_core::models::{CategoryTarget, Meal, Recipe, RecipeIngredient, RecipeStep};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// When a meal was eaten: now when no date is given, otherwise midnight of
/// that date.
pub(crate) fn parse_meal_date(date_str: Option<String>) -> Result<NaiveDateTime> {
    match date_str {
        None => Ok(Local::now().naive_local()),
        Some(s) => {
            let date = parse_date(Some(s))?;
            Ok(date.and_time(chrono::NaiveTime::MIN))
        }
    }
}

/// Parse `name` or `name:amount` (e.g. "flour:200 g").
pub(crate) fn parse_ingredient(s: &str) -> Result<RecipeIngredient> {
    let (name, amount) = match s.split_once(':') {
        Some((name, amount)) => (name.trim(), Some(amount.trim())),
        None => (s.trim(), None),
    };
    if name.is_empty() {
        bail!("Invalid ingredient '{s}'. Use 'name' or 'name:amount'");
    }
    Ok(RecipeIngredient {
        name: name.to_string(),
        amount: amount.filter(|a| !a.is_empty()).map(str::to_string),
    })
}

/// Number steps in the order they were given, starting at 1.
pub(crate) fn build_steps(steps: &[String]) -> Vec<RecipeStep> {
    (1_i64..)
        .zip(steps)
        .map(|(order, text)| RecipeStep {
            order,
            text: text.clone(),
        })
        .collect()
}

/// Parse a weekly target like `chicken=3`.
pub(crate) fn parse_target(s: &str) -> Result<CategoryTarget> {
    let (category, count) = s
        .split_once('=')
        .with_context(|| format!("Invalid target '{s}'. Use 'category=count', e.g. 'fish=2'"))?;
    let per_week: i64 = count
        .trim()
        .parse()
        .with_context(|| format!("Invalid count '{}' in target '{s}'", count.trim()))?;
    Ok(CategoryTarget {
        category: category.to_string(),
        per_week,
    })
}

pub(crate) fn print_recipe_table(recipes: &[Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Categories")]
        categories: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Fav")]
        favorite: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            title: truncate(&r.title, 40),
            categories: r.categories.join(", "),
            time: r.time_minutes.map_or("-".into(), |m| format!("{m} min")),
            favorite: if r.is_favorite { "*".into() } else { String::new() },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_meal_table(meals: &[Meal]) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
        #[tabled(rename = "Served")]
        served_at: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.id,
            date: m.date.format("%Y-%m-%d %H:%M").to_string(),
            recipe: m
                .recipe_title
                .as_deref()
                .map_or_else(|| format!("#{}", m.recipe_id), |t| truncate(t, 35)),
            served_at: m.served_at.clone().unwrap_or_default(),
            notes: m.notes.as_deref().map(|n| truncate(n, 30)).unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_recipe_detail(recipe: &Recipe) {
    let fav = if recipe.is_favorite { " *" } else { "" };
    println!("{}{fav}  (id: {})", recipe.title, recipe.id);
    if let Some(ref description) = recipe.description {
        println!("{description}");
    }
    let mut facts = Vec::new();
    if let Some(minutes) = recipe.time_minutes {
        facts.push(format!("{minutes} min"));
    }
    if let Some(ref cuisine) = recipe.cuisine {
        facts.push(cuisine.clone());
    }
    if !recipe.categories.is_empty() {
        facts.push(recipe.categories.join(", "));
    }
    if !facts.is_empty() {
        println!("{}", facts.join(" | "));
    }
    if let Some(ref url) = recipe.image_url {
        println!("Image: {url}");
    }
    if !recipe.ingredients.is_empty() {
        println!("\nIngredients:");
        for ing in &recipe.ingredients {
            match ing.amount {
                Some(ref amount) => println!("  - {amount} {}", ing.name),
                None => println!("  - {}", ing.name),
            }
        }
    }
    if !recipe.steps.is_empty() {
        println!("\nSteps:");
        for step in &recipe.steps {
            println!("  {}. {}", step.order, step.text);
        }
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso_and_invalid() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_parse_meal_date_uses_midnight() {
        let ts = parse_meal_date(Some("2024-03-02".to_string())).unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2024, 3, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_ingredient() {
        let plain = parse_ingredient("salt").unwrap();
        assert_eq!(plain.name, "salt");
        assert_eq!(plain.amount, None);

        let with_amount = parse_ingredient("flour: 200 g").unwrap();
        assert_eq!(with_amount.name, "flour");
        assert_eq!(with_amount.amount.as_deref(), Some("200 g"));

        assert_eq!(parse_ingredient("pepper:").unwrap().amount, None);
        assert!(parse_ingredient(":2 cups").is_err());
    }

    #[test]
    fn test_build_steps_numbers_from_one() {
        let steps = build_steps(&["Chop".to_string(), "Fry".to_string()]);
        assert_eq!(steps[0].order, 1);
        assert_eq!(steps[1].order, 2);
        assert_eq!(steps[1].text, "Fry");
    }

    #[test]
    fn test_parse_target() {
        let t = parse_target("fish=2").unwrap();
        assert_eq!(t.category, "fish");
        assert_eq!(t.per_week, 2);
        assert!(parse_target("fish").is_err());
        assert!(parse_target("fish=lots").is_err());
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("nope"), r#"{"error":"nope"}"#);
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
    }
}
