use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use nextdish_core::error::SuggestionError;
use nextdish_core::models::{
    Meal, MealRange, NewRecipe, Preferences, Recipe, RecipeFilter, RecipeIngredient, RecipeStep,
    UpdateRecipe, validate_new_recipe, validate_preferences, validate_update_recipe,
};
use nextdish_core::service::NextDishService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<NextDishService>>,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, NextDishService> {
        self.svc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Missing fields are left alone; an explicit `null` clears nullable ones.
#[derive(Deserialize)]
#[allow(clippy::option_option)]
struct UpdateRecipeRequest {
    title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    time_minutes: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    cuisine: Option<Option<String>>,
    is_favorite: Option<bool>,
    categories: Option<Vec<String>>,
    ingredients: Option<Vec<RecipeIngredient>>,
    steps: Option<Vec<RecipeStep>>,
}

impl From<UpdateRecipeRequest> for UpdateRecipe {
    fn from(req: UpdateRecipeRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            image_url: req.image_url,
            time_minutes: req.time_minutes,
            cuisine: req.cuisine,
            is_favorite: req.is_favorite,
            categories: req.categories,
            ingredients: req.ingredients,
            steps: req.steps,
        }
    }
}

#[derive(Deserialize)]
struct CreateMealRequest {
    recipe_id: i64,
    /// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`; defaults to now.
    date: Option<String>,
    served_at: Option<String>,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct MealHistoryQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Deserialize)]
struct SuggestQuery {
    exclude: Option<i64>,
}

#[derive(Serialize)]
struct SuggestResponse {
    recipe: Option<Recipe>,
}

#[derive(Deserialize)]
struct AcceptRequest {
    recipe_id: i64,
    served_at: Option<String>,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct DeclineRequest {
    recipe_id: i64,
}

#[derive(Serialize)]
struct SuggestionActionResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    meal: Option<Meal>,
    next_suggestion_id: Option<i64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct SuggestionFailure {
    success: bool,
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err}"))
}

/// Accept/decline failures keep the `{success, error}` shape clients expect.
struct SuggestionApiError(SuggestionError);

impl IntoResponse for SuggestionApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            SuggestionError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            SuggestionError::Validation(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            SuggestionError::StoreUnavailable(err) => {
                error!("Suggestion store unavailable: {err:#}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Suggestion service unavailable, try again later".to_string(),
                )
            }
        };
        (
            status,
            Json(SuggestionFailure {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<SuggestionError> for SuggestionApiError {
    fn from(err: SuggestionError) -> Self {
        Self(err)
    }
}

fn parse_day(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{value}'. Use YYYY-MM-DD")))
}

fn parse_meal_date(value: &str) -> Result<NaiveDateTime, ApiError> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| {
            ApiError::BadRequest(format!(
                "Invalid date '{value}'. Use YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS"
            ))
        })
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Recipe handlers ---

async fn list_recipes(
    State(state): State<AppState>,
    Query(filter): Query<RecipeFilter>,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    let svc = state.lock();
    let recipes = svc.list_recipes(&filter).context("database error")?;
    Ok(Json(recipes))
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(req): Json<NewRecipe>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let recipe = validate_new_recipe(&req).map_err(|e| bad_request(&e))?;
    let svc = state.lock();
    let recipe = svc
        .create_recipe(&recipe)
        .context("failed to create recipe")?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Recipe>, ApiError> {
    let svc = state.lock();
    svc.get_recipe(id)
        .context("database error")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecipeRequest>,
) -> Result<Json<Recipe>, ApiError> {
    let update = UpdateRecipe::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }
    let update = validate_update_recipe(&update).map_err(|e| bad_request(&e))?;

    let svc = state.lock();
    svc.update_recipe(id, &update)
        .context("failed to update recipe")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let svc = state.lock();
    if svc.delete_recipe(id).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Recipe {id} not found")))
    }
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Recipe>, ApiError> {
    let svc = state.lock();
    svc.toggle_favorite(id)
        .context("database error")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

// --- Meal handlers ---

async fn list_meals(
    State(state): State<AppState>,
    Query(params): Query<MealHistoryQuery>,
) -> Result<Json<Vec<Meal>>, ApiError> {
    let start = params.start.as_deref().map(parse_day).transpose()?;
    let end = params.end.as_deref().map(parse_day).transpose()?;
    let svc = state.lock();
    let meals = svc
        .list_meals(&MealRange::days(start, end))
        .context("database error")?;
    Ok(Json(meals))
}

async fn create_meal(
    State(state): State<AppState>,
    Json(req): Json<CreateMealRequest>,
) -> Result<(StatusCode, Json<Meal>), ApiError> {
    let date = match req.date.as_deref() {
        Some(value) => parse_meal_date(value)?,
        None => chrono::Local::now().naive_local(),
    };

    let svc = state.lock();
    if svc.get_recipe(req.recipe_id).context("database error")?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Recipe {} not found",
            req.recipe_id
        )));
    }
    let meal = svc
        .log_meal(req.recipe_id, date, req.served_at, req.notes)
        .context("failed to insert meal")?;
    Ok((StatusCode::CREATED, Json(meal)))
}

async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let svc = state.lock();
    if svc.delete_meal(id).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Meal {id} not found")))
    }
}

// --- Preference handlers ---

async fn get_preferences(State(state): State<AppState>) -> Result<Json<Preferences>, ApiError> {
    let svc = state.lock();
    let prefs = svc.effective_preferences().context("database error")?;
    Ok(Json(prefs))
}

async fn put_preferences(
    State(state): State<AppState>,
    Json(req): Json<Preferences>,
) -> Result<Json<Preferences>, ApiError> {
    let prefs = validate_preferences(&req).map_err(|e| bad_request(&e))?;
    let svc = state.lock();
    let saved = svc
        .update_preferences(&prefs)
        .context("failed to save preferences")?;
    Ok(Json(saved))
}

// --- Suggestion handlers ---

async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestQuery>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let svc = state.lock();
    let recipe = svc
        .suggest_recipe(params.exclude)
        .context("database error")?;
    Ok(Json(SuggestResponse { recipe }))
}

async fn accept_suggestion(
    State(state): State<AppState>,
    Json(req): Json<AcceptRequest>,
) -> Result<Json<SuggestionActionResponse>, SuggestionApiError> {
    let svc = state.lock();
    let outcome =
        svc.accept_suggestion(req.recipe_id, req.served_at.as_deref(), req.notes.as_deref())?;
    Ok(Json(SuggestionActionResponse {
        success: true,
        meal: Some(outcome.meal),
        next_suggestion_id: outcome.next_suggestion_id,
    }))
}

async fn decline_suggestion(
    State(state): State<AppState>,
    Json(req): Json<DeclineRequest>,
) -> Result<Json<SuggestionActionResponse>, SuggestionApiError> {
    let svc = state.lock();
    let next = svc.decline_and_suggest(req.recipe_id)?;
    Ok(Json(SuggestionActionResponse {
        success: true,
        meal: None,
        next_suggestion_id: next.recipe_id(),
    }))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/api/recipes/{id}",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/api/recipes/{id}/favorite", post(toggle_favorite))
        .route("/api/meals", get(list_meals).post(create_meal))
        .route("/api/meals/{id}", delete(delete_meal))
        .route(
            "/api/preferences",
            get(get_preferences).put(put_preferences),
        )
        .route("/api/suggest", get(suggest))
        .route("/api/suggest/accept", post(accept_suggestion))
        .route("/api/suggest/decline", post(decline_suggestion))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(svc: NextDishService, port: u16, bind: &str) -> anyhow::Result<()> {
    let prefs = svc.ensure_preferences()?;
    info!(
        targets = prefs.targets.len(),
        cooldown_days = prefs.cooldown_days,
        "preferences loaded"
    );

    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
    };
    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        warn!(
            "Listening on {bind} without authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
