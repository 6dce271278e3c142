mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    RecipeAddArgs, RecipeEditArgs, cmd_accept, cmd_decline, cmd_meal_delete, cmd_meal_history,
    cmd_meal_log, cmd_prefs_init, cmd_prefs_set, cmd_prefs_show, cmd_recipe_add,
    cmd_recipe_delete, cmd_recipe_edit, cmd_recipe_favorite, cmd_recipe_list, cmd_recipe_show,
    cmd_suggest,
};
use crate::config::Config;
use nextdish_core::models::RecipeFilter;
use nextdish_core::service::NextDishService;

const DEFAULT_LOG_FILTER: &str = "nextdish=info,nextdish_core=info";

#[derive(Parser)]
#[command(
    name = "nextdish",
    version,
    about = "A recipe box that tells you what to cook next",
    long_about = "A recipe box that tells you what to cook next.\n\n\
        Suggestions balance weekly per-category targets, skip recipes eaten \
        in the last few days, and prefer quick dishes on weekdays."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Log and review eaten meals
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Weekly category targets and repeat cooldown
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },
    /// Suggest what to cook next
    Suggest {
        /// Recipe ID to leave out (e.g. the one just declined)
        #[arg(long)]
        exclude: Option<i64>,
        /// Show the full ranking and the numbers behind it
        #[arg(long)]
        explain: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Accept a suggestion: log the recipe as eaten now
    Accept {
        /// Recipe ID
        recipe_id: i64,
        /// Occasion, e.g. "dinner"
        #[arg(long)]
        served_at: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decline a suggestion and get an alternative
    Decline {
        /// Recipe ID
        recipe_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the JSON API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Add a recipe
    Add {
        #[command(flatten)]
        args: RecipeAddArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recipes
    List {
        /// Only recipes in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Filter by title
        #[arg(short, long)]
        search: Option<String>,
        /// Only favorites
        #[arg(long)]
        favorites: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with ingredients and steps
    Show {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of a recipe
    Edit {
        #[command(flatten)]
        args: RecipeEditArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle the favorite flag
    Favorite {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe and its meal history
    Delete {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Log a meal eaten outside of the suggestion flow
    Log {
        /// Recipe ID
        recipe_id: i64,
        /// Date eaten (YYYY-MM-DD or today/yesterday, default: now)
        #[arg(long)]
        date: Option<String>,
        /// Occasion, e.g. "lunch"
        #[arg(long)]
        served_at: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show eaten meals, most recent first
    History {
        /// First day (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        start: Option<String>,
        /// Last day (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        end: Option<String>,
        /// Only the last N days, today included
        #[arg(short, long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal by ID
    Delete {
        /// Meal ID
        meal_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Show weekly targets and cooldown
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change targets and/or cooldown
    Set {
        /// Weekly target as category=count (repeatable, replaces all targets)
        #[arg(short, long = "target")]
        targets: Vec<String>,
        /// Days before a recipe may be suggested again
        #[arg(long)]
        cooldown: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store the default preferences if none exist yet
    Init {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = NextDishService::open(&config.db_path)?;

    match cli.command {
        Commands::Recipe { command } => match command {
            RecipeCommands::Add { args, json } => cmd_recipe_add(&svc, args, json),
            RecipeCommands::List {
                category,
                search,
                favorites,
                json,
            } => {
                let filter = RecipeFilter {
                    category,
                    search,
                    favorite: favorites.then_some(true),
                };
                cmd_recipe_list(&svc, &filter, json)
            }
            RecipeCommands::Show { id, json } => cmd_recipe_show(&svc, id, json),
            RecipeCommands::Edit { args, json } => cmd_recipe_edit(&svc, args, json),
            RecipeCommands::Favorite { id, json } => cmd_recipe_favorite(&svc, id, json),
            RecipeCommands::Delete { id, json } => cmd_recipe_delete(&svc, id, json),
        },
        Commands::Meal { command } => match command {
            MealCommands::Log {
                recipe_id,
                date,
                served_at,
                notes,
                json,
            } => cmd_meal_log(&svc, recipe_id, date, served_at, notes, json),
            MealCommands::History {
                start,
                end,
                days,
                json,
            } => cmd_meal_history(&svc, start, end, days, json),
            MealCommands::Delete { meal_id, json } => cmd_meal_delete(&svc, meal_id, json),
        },
        Commands::Prefs { command } => match command {
            PrefsCommands::Show { json } => cmd_prefs_show(&svc, json),
            PrefsCommands::Set {
                targets,
                cooldown,
                json,
            } => cmd_prefs_set(&svc, &targets, cooldown, json),
            PrefsCommands::Init { json } => cmd_prefs_init(&svc, json),
        },
        Commands::Suggest {
            exclude,
            explain,
            json,
        } => cmd_suggest(&svc, exclude, explain, json),
        Commands::Accept {
            recipe_id,
            served_at,
            notes,
            json,
        } => cmd_accept(
            &svc,
            recipe_id,
            served_at.as_deref(),
            notes.as_deref(),
            json,
        ),
        Commands::Decline { recipe_id, json } => cmd_decline(&svc, recipe_id, json),
        Commands::Serve { port, bind } => server::start_server(svc, port, &bind).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recipe_add() {
        let cli = Cli::try_parse_from([
            "nextdish", "recipe", "add", "Fish Tacos", "-c", "fish", "-t", "25", "-i",
            "cod:400 g", "--json",
        ])
        .unwrap();
        let Commands::Recipe {
            command: RecipeCommands::Add { args, json },
        } = cli.command
        else {
            panic!("expected recipe add");
        };
        assert!(json);
        assert_eq!(args.title, "Fish Tacos");
        assert_eq!(args.categories, vec!["fish"]);
        assert_eq!(args.time, Some(25));
        assert_eq!(args.ingredients, vec!["cod:400 g"]);
    }

    #[test]
    fn test_parse_suggest_exclude() {
        let cli = Cli::try_parse_from(["nextdish", "suggest", "--exclude", "4"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Suggest {
                exclude: Some(4),
                explain: false,
                json: false
            }
        ));
    }
}
