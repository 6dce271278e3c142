use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nextdish_core::models::Preferences;
use nextdish_core::service::NextDishService;

use super::helpers::parse_target;

fn print_preferences(prefs: &Preferences, stored: bool) {
    #[derive(Tabled)]
    struct TargetRow {
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Per week")]
        per_week: i64,
    }

    let rows: Vec<TargetRow> = prefs
        .targets
        .iter()
        .map(|t| TargetRow {
            category: t.category.clone(),
            per_week: t.per_week,
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(1)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("Cooldown: {} days", prefs.cooldown_days);
    if !stored {
        println!("(defaults, run `nextdish prefs init` to store them)");
    }
}

pub(crate) fn cmd_prefs_show(svc: &NextDishService, json: bool) -> Result<()> {
    let stored = svc.get_preferences()?;
    let is_stored = stored.is_some();
    let prefs = stored.unwrap_or_default();
    if json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else {
        print_preferences(&prefs, is_stored);
    }
    Ok(())
}

pub(crate) fn cmd_prefs_set(
    svc: &NextDishService,
    targets: &[String],
    cooldown: Option<i64>,
    json: bool,
) -> Result<()> {
    if targets.is_empty() && cooldown.is_none() {
        bail!("Nothing to update. Provide --target and/or --cooldown");
    }

    let current = svc.effective_preferences()?;
    let targets = if targets.is_empty() {
        current.targets
    } else {
        targets
            .iter()
            .map(|t| parse_target(t))
            .collect::<Result<Vec<_>>>()?
    };
    let prefs = svc.update_preferences(&Preferences {
        targets,
        cooldown_days: cooldown.unwrap_or(current.cooldown_days),
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else {
        println!("Preferences updated");
        print_preferences(&prefs, true);
    }
    Ok(())
}

pub(crate) fn cmd_prefs_init(svc: &NextDishService, json: bool) -> Result<()> {
    let existed = svc.get_preferences()?.is_some();
    let prefs = svc.ensure_preferences()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else {
        if existed {
            println!("Preferences already initialized");
        } else {
            println!("Stored default preferences");
        }
        print_preferences(&prefs, true);
    }
    Ok(())
}
