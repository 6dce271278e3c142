use anyhow::Result;
use std::process;
use tabled::{Table, Tabled, settings::Style};

use nextdish_core::error::SuggestionError;
use nextdish_core::models::Recipe;
use nextdish_core::service::NextDishService;
use nextdish_core::suggest::SuggestionPlan;

use super::helpers::{json_error, print_recipe_detail};

fn print_plan(plan: &SuggestionPlan) {
    #[derive(Tabled)]
    struct RankRow {
        #[tabled(rename = "#")]
        rank: usize,
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Deficit")]
        deficit: i64,
        #[tabled(rename = "Last eaten")]
        last_eaten: String,
        #[tabled(rename = "Fav")]
        favorite: String,
        #[tabled(rename = "Time")]
        time: String,
    }

    let deficits: Vec<String> = plan
        .deficits
        .iter()
        .map(|d| format!("{} {}", d.category, d.deficit))
        .collect();
    println!(
        "Week {} to {}, still to eat: {}",
        plan.week_start.format("%Y-%m-%d"),
        plan.week_end.format("%Y-%m-%d"),
        deficits.join(", ")
    );
    if plan.cooldown_bypassed {
        println!(
            "Everything was eaten in the last {} days, cooldown ignored",
            plan.cooldown_days
        );
    } else if !plan.in_cooldown.is_empty() {
        println!(
            "{} recipe(s) skipped, eaten in the last {} days",
            plan.in_cooldown.len(),
            plan.cooldown_days
        );
    }

    let rows: Vec<RankRow> = plan
        .ranked
        .iter()
        .enumerate()
        .map(|(i, r)| RankRow {
            rank: i + 1,
            id: r.id,
            title: r.title.clone(),
            deficit: r.max_deficit,
            last_eaten: r
                .days_since_eaten
                .map_or("never".into(), |d| format!("{d} days ago")),
            favorite: if r.is_favorite { "*".into() } else { String::new() },
            time: r.time_minutes.map_or("-".into(), |m| format!("{m} min")),
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

fn print_suggestion(recipe: Option<&Recipe>) {
    match recipe {
        Some(recipe) => {
            println!("How about this?\n");
            print_recipe_detail(recipe);
        }
        None => println!("Nothing to suggest yet. Add a recipe with `nextdish recipe add`"),
    }
}

pub(crate) fn cmd_suggest(
    svc: &NextDishService,
    exclude: Option<i64>,
    explain: bool,
    json: bool,
) -> Result<()> {
    if explain {
        let plan = svc.suggestion_plan(exclude)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&plan);
        }
        return Ok(());
    }

    let recipe = svc.suggest_recipe(exclude)?;
    if json {
        println!("{}", serde_json::json!({ "recipe": recipe }));
    } else {
        print_suggestion(recipe.as_ref());
    }
    Ok(())
}

fn exit_with(err: &SuggestionError, json: bool) -> ! {
    let message = err.to_string();
    if json {
        println!("{}", json_error(&message));
    } else {
        eprintln!("{message}");
    }
    process::exit(match err {
        SuggestionError::NotFound(_) => 2,
        SuggestionError::StoreUnavailable(_) | SuggestionError::Validation(_) => 1,
    });
}

fn next_title(svc: &NextDishService, next: Option<i64>) -> Result<Option<String>> {
    match next {
        Some(id) => Ok(svc.get_recipe(id)?.map(|r| r.title)),
        None => Ok(None),
    }
}

pub(crate) fn cmd_accept(
    svc: &NextDishService,
    recipe_id: i64,
    served_at: Option<&str>,
    notes: Option<&str>,
    json: bool,
) -> Result<()> {
    let outcome = match svc.accept_suggestion(recipe_id, served_at, notes) {
        Ok(outcome) => outcome,
        Err(err) => exit_with(&err, json),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "success": true,
                "meal": outcome.meal,
                "next_suggestion_id": outcome.next_suggestion_id,
            })
        );
        return Ok(());
    }

    let title = outcome.meal.recipe_title.as_deref().unwrap_or("?");
    println!("Enjoy your {title}! (meal id: {})", outcome.meal.id);
    if let Some(next) = next_title(svc, outcome.next_suggestion_id)? {
        println!("Next time: {next}");
    }
    Ok(())
}

pub(crate) fn cmd_decline(svc: &NextDishService, recipe_id: i64, json: bool) -> Result<()> {
    let next = match svc.decline_and_suggest(recipe_id) {
        Ok(next) => next.recipe_id(),
        Err(err) => exit_with(&err, json),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "success": true, "next_suggestion_id": next })
        );
        return Ok(());
    }

    match (next, next_title(svc, next)?) {
        (Some(id), Some(title)) => println!("Instead, how about {title}? (id: {id})"),
        _ => println!("No other recipe to suggest"),
    }
    Ok(())
}
