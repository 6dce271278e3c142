//! The "what should I cook next" engine.
//!
//! Every request recomputes from the store: the current week's category
//! deficits, the set of recipes still in cooldown, and when each recipe was
//! last eaten. The remaining candidates are ordered by [`rank::rank_candidates`]
//! and the first one wins.

pub mod cooldown;
pub mod deficit;
pub mod engine;
pub mod history;
pub mod rank;
pub mod week;

pub use deficit::Deficit;
pub use engine::{
    AcceptOutcome, RankedRecipe, Suggester, Suggestion, SuggestionPlan, SuggestionStore,
};
pub use week::WeekWindow;
