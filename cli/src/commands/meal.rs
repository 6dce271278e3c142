use anyhow::{Result, bail};
use chrono::Days;
use std::process;

use nextdish_core::error::SuggestionError;
use nextdish_core::models::MealRange;
use nextdish_core::service::NextDishService;

use super::helpers::{json_error, parse_date, parse_meal_date, print_meal_table};

pub(crate) fn cmd_meal_log(
    svc: &NextDishService,
    recipe_id: i64,
    date: Option<String>,
    served_at: Option<String>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_meal_date(date)?;
    let meal = match svc.log_meal(recipe_id, date, served_at, notes) {
        Ok(meal) => meal,
        Err(err) => match err.downcast_ref::<SuggestionError>() {
            Some(not_found @ SuggestionError::NotFound(_)) => {
                let message = not_found.to_string();
                if json {
                    println!("{}", json_error(&message));
                } else {
                    eprintln!("{message}");
                }
                process::exit(2);
            }
            _ => return Err(err),
        },
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        let title = meal.recipe_title.as_deref().unwrap_or("?");
        let when = meal.date.format("%Y-%m-%d");
        println!("Logged {title} on {when} (meal id: {})", meal.id);
    }
    Ok(())
}

pub(crate) fn cmd_meal_history(
    svc: &NextDishService,
    start: Option<String>,
    end: Option<String>,
    days: Option<u32>,
    json: bool,
) -> Result<()> {
    let range = match days {
        Some(_) if start.is_some() => bail!("Use either --days or --start, not both"),
        Some(days) => {
            let today = parse_date(None)?;
            let Some(from) = today.checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
            else {
                bail!("--days {days} reaches too far back");
            };
            MealRange::days(Some(from), Some(today))
        }
        None => MealRange::days(
            start.map(Some).map(parse_date).transpose()?,
            end.map(Some).map(parse_date).transpose()?,
        ),
    };

    let meals = svc.list_meals(&range)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meals)?);
        return Ok(());
    }
    if meals.is_empty() {
        eprintln!("No meals logged in this range");
        process::exit(2);
    }
    print_meal_table(&meals);
    Ok(())
}

pub(crate) fn cmd_meal_delete(svc: &NextDishService, meal_id: i64, json: bool) -> Result<()> {
    if svc.delete_meal(meal_id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": meal_id }));
        } else {
            println!("Deleted meal {meal_id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Meal {meal_id} not found")));
        } else {
            eprintln!("Meal {meal_id} not found");
        }
        process::exit(2);
    }
}
