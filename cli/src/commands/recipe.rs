use anyhow::{Result, bail};
use clap::Args;
use std::process;

use nextdish_core::models::{NewRecipe, RecipeFilter, UpdateRecipe};
use nextdish_core::service::NextDishService;

use super::helpers::{
    build_steps, json_error, parse_ingredient, print_recipe_detail, print_recipe_table,
};

#[derive(Args)]
pub(crate) struct RecipeAddArgs {
    /// Recipe title
    pub title: String,
    /// Short description
    #[arg(short, long)]
    pub description: Option<String>,
    /// Category tag (repeatable), e.g. -c chicken -c quick
    #[arg(short, long = "category")]
    pub categories: Vec<String>,
    /// Cooking time in minutes
    #[arg(short, long)]
    pub time: Option<i64>,
    /// Cuisine, e.g. "thai"
    #[arg(long)]
    pub cuisine: Option<String>,
    /// Image URL (http or https)
    #[arg(long)]
    pub image_url: Option<String>,
    /// Ingredient as "name" or "name:amount" (repeatable)
    #[arg(short, long = "ingredient")]
    pub ingredients: Vec<String>,
    /// Preparation step (repeatable, in order)
    #[arg(short, long = "step")]
    pub steps: Vec<String>,
    /// Mark as favorite
    #[arg(long)]
    pub favorite: bool,
}

#[derive(Args)]
pub(crate) struct RecipeEditArgs {
    /// Recipe ID
    pub id: i64,
    /// New title
    #[arg(long)]
    pub title: Option<String>,
    /// New description
    #[arg(short, long)]
    pub description: Option<String>,
    /// Replace categories (repeatable)
    #[arg(short, long = "category")]
    pub categories: Vec<String>,
    /// New cooking time in minutes
    #[arg(short, long)]
    pub time: Option<i64>,
    /// New cuisine
    #[arg(long)]
    pub cuisine: Option<String>,
    /// New image URL
    #[arg(long)]
    pub image_url: Option<String>,
    /// Replace ingredients (repeatable, "name" or "name:amount")
    #[arg(short, long = "ingredient")]
    pub ingredients: Vec<String>,
    /// Replace steps (repeatable, in order)
    #[arg(short, long = "step")]
    pub steps: Vec<String>,
    /// Clear a field: description, time, cuisine, image-url, categories, ingredients, steps
    #[arg(long, value_name = "FIELD")]
    pub clear: Vec<String>,
}

fn not_found(id: i64, json: bool) -> ! {
    let message = format!("Recipe {id} not found");
    if json {
        println!("{}", json_error(&message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn cmd_recipe_add(
    svc: &NextDishService,
    args: RecipeAddArgs,
    json: bool,
) -> Result<()> {
    let ingredients = args
        .ingredients
        .iter()
        .map(|s| parse_ingredient(s))
        .collect::<Result<Vec<_>>>()?;
    let recipe = svc.create_recipe(&NewRecipe {
        title: args.title,
        description: args.description,
        image_url: args.image_url,
        time_minutes: args.time,
        cuisine: args.cuisine,
        is_favorite: args.favorite,
        categories: args.categories,
        ingredients,
        steps: build_steps(&args.steps),
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let title = &recipe.title;
        let id = recipe.id;
        println!("Created recipe: {title} (id: {id})");
        if recipe.categories.is_empty() {
            println!("Tip: tag it with categories so it counts toward weekly targets (-c fish)");
        }
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(
    svc: &NextDishService,
    filter: &RecipeFilter,
    json: bool,
) -> Result<()> {
    let recipes = svc.list_recipes(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }
    if recipes.is_empty() {
        eprintln!("No recipes found");
        process::exit(2);
    }
    print_recipe_table(&recipes);
    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &NextDishService, id: i64, json: bool) -> Result<()> {
    let Some(recipe) = svc.get_recipe(id)? else {
        not_found(id, json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        print_recipe_detail(&recipe);
    }
    Ok(())
}

#[allow(clippy::option_option)]
fn edit_field<T>(value: Option<T>, field: &str, clear: &[String]) -> Option<Option<T>> {
    if clear.iter().any(|c| c == field) {
        Some(None)
    } else {
        value.map(Some)
    }
}

fn edit_list<T>(values: Vec<T>, field: &str, clear: &[String]) -> Option<Vec<T>> {
    if clear.iter().any(|c| c == field) {
        Some(Vec::new())
    } else if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn build_update(args: RecipeEditArgs) -> Result<UpdateRecipe> {
    const CLEARABLE: &[&str] = &[
        "description",
        "time",
        "cuisine",
        "image-url",
        "categories",
        "ingredients",
        "steps",
    ];
    if let Some(bad) = args.clear.iter().find(|c| !CLEARABLE.contains(&c.as_str())) {
        bail!(
            "Cannot clear '{bad}'. Clearable fields: {}",
            CLEARABLE.join(", ")
        );
    }

    let ingredients = args
        .ingredients
        .iter()
        .map(|s| parse_ingredient(s))
        .collect::<Result<Vec<_>>>()?;
    let steps = build_steps(&args.steps);
    let clear = &args.clear;

    Ok(UpdateRecipe {
        title: args.title,
        description: edit_field(args.description, "description", clear),
        image_url: edit_field(args.image_url, "image-url", clear),
        time_minutes: edit_field(args.time, "time", clear),
        cuisine: edit_field(args.cuisine, "cuisine", clear),
        is_favorite: None,
        categories: edit_list(args.categories, "categories", clear),
        ingredients: edit_list(ingredients, "ingredients", clear),
        steps: edit_list(steps, "steps", clear),
    })
}

pub(crate) fn cmd_recipe_edit(
    svc: &NextDishService,
    args: RecipeEditArgs,
    json: bool,
) -> Result<()> {
    let id = args.id;
    let update = build_update(args)?;
    if update.is_empty() {
        bail!("Nothing to update. Provide at least one field to change or --clear");
    }

    let Some(recipe) = svc.update_recipe(id, &update)? else {
        not_found(id, json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        println!("Updated recipe {id}: {}", recipe.title);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_favorite(svc: &NextDishService, id: i64, json: bool) -> Result<()> {
    let Some(recipe) = svc.toggle_favorite(id)? else {
        not_found(id, json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else if recipe.is_favorite {
        println!("Marked {} as a favorite", recipe.title);
    } else {
        println!("Removed {} from favorites", recipe.title);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_delete(svc: &NextDishService, id: i64, json: bool) -> Result<()> {
    if !svc.delete_recipe(id)? {
        not_found(id, json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe {id} and its meal history");
    }
    Ok(())
}
