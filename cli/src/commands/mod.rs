mod helpers;
mod meal;
mod prefs;
mod recipe;
mod suggest;

pub(crate) use meal::{cmd_meal_delete, cmd_meal_history, cmd_meal_log};
pub(crate) use prefs::{cmd_prefs_init, cmd_prefs_set, cmd_prefs_show};
pub(crate) use recipe::{
    RecipeAddArgs, RecipeEditArgs, cmd_recipe_add, cmd_recipe_delete, cmd_recipe_edit,
    cmd_recipe_favorite, cmd_recipe_list, cmd_recipe_show,
};
pub(crate) use suggest::{cmd_accept, cmd_decline, cmd_suggest};
