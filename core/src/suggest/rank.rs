use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::models::Recipe;
use crate::suggest::deficit::Deficit;

/// Stand-in for a recipe without a cooking time, so it sorts after any
/// realistic one on weekdays.
pub const MISSING_TIME_MINUTES: i64 = 999;

const SECONDS_PER_DAY: i64 = 86_400;

/// A recipe as seen by the ranker.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub id: i64,
    pub title: &'a str,
    pub categories: &'a [String],
    pub is_favorite: bool,
    pub time_minutes: Option<i64>,
    pub last_eaten: Option<NaiveDateTime>,
}

impl<'a> Candidate<'a> {
    #[must_use]
    pub fn from_recipe(recipe: &'a Recipe, last_eaten: Option<NaiveDateTime>) -> Self {
        Self {
            id: recipe.id,
            title: &recipe.title,
            categories: &recipe.categories,
            is_favorite: recipe.is_favorite,
            time_minutes: recipe.time_minutes,
            last_eaten,
        }
    }
}

/// Everything the ordering rules need besides the two candidates.
#[derive(Debug, Clone)]
pub struct RankContext {
    deficits: HashMap<String, i64>,
    now: NaiveDateTime,
    is_weekday: bool,
}

impl RankContext {
    #[must_use]
    pub fn new(deficits: &[Deficit], now: NaiveDateTime, is_weekday: bool) -> Self {
        Self {
            deficits: deficits
                .iter()
                .map(|d| (d.category.clone(), d.deficit))
                .collect(),
            now,
            is_weekday,
        }
    }

    /// Largest deficit over the candidate's categories. Categories without a
    /// target, and uncategorized recipes, score 0.
    #[must_use]
    pub fn max_deficit(&self, candidate: &Candidate<'_>) -> i64 {
        candidate
            .categories
            .iter()
            .map(|c| self.deficits.get(c).copied().unwrap_or(0))
            .max()
            .unwrap_or(0)
    }

    /// Whole days between `ts` and now, rounded down.
    #[must_use]
    pub fn days_since(&self, ts: NaiveDateTime) -> i64 {
        (self.now - ts).num_seconds().div_euclid(SECONDS_PER_DAY)
    }
}

/// One tie-break rule. `Less` means `a` is the better suggestion.
type Rule = fn(&RankContext, &Candidate<'_>, &Candidate<'_>) -> Ordering;

/// Applied in order; a rule only matters when every earlier rule tied.
const RULES: &[Rule] = &[
    by_deficit,
    by_time_since_eaten,
    by_favorite,
    by_weekday_cooking_time,
];

fn by_deficit(ctx: &RankContext, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    ctx.max_deficit(b).cmp(&ctx.max_deficit(a))
}

fn by_time_since_eaten(ctx: &RankContext, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    match (a.last_eaten, b.last_eaten) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_date), Some(b_date)) => ctx.days_since(b_date).cmp(&ctx.days_since(a_date)),
    }
}

fn by_favorite(_ctx: &RankContext, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.is_favorite.cmp(&a.is_favorite)
}

fn by_weekday_cooking_time(ctx: &RankContext, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    if !ctx.is_weekday {
        return Ordering::Equal;
    }
    let a_time = a.time_minutes.unwrap_or(MISSING_TIME_MINUTES);
    let b_time = b.time_minutes.unwrap_or(MISSING_TIME_MINUTES);
    a_time.cmp(&b_time)
}

/// The composed comparator: first non-equal rule result, else `Equal`.
#[must_use]
pub fn compare(ctx: &RankContext, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    RULES
        .iter()
        .map(|rule| rule(ctx, a, b))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Sort best-first. The sort is stable, so full ties keep input order.
#[must_use]
pub fn rank_candidates<'a>(
    mut candidates: Vec<Candidate<'a>>,
    ctx: &RankContext,
) -> Vec<Candidate<'a>> {
    candidates.sort_by(|a, b| compare(ctx, a, b));
    candidates
}
