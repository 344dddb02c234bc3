use axum::extract::{rejection::JsonRejection, Path, RawQuery, State};
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::tour::{Tour, TourInput, TOUR_SCHEMA};
use crate::filter::ApiFeatures;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TourService;

use super::utils::{parse_id, preset_query, query_pairs};

/// Query presets behind `/top-5-tours`
pub const TOP_TOURS_PRESET: &[(&str, &str)] = &[("limit", "5"), ("sort", "-ratingsAverage,price")];

/// GET /api/v1/tours
pub async fn list(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    list_tours(&state, query_pairs(query.as_deref())).await
}

/// GET /api/v1/tours/top-5-tours
pub async fn top_five(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    let pairs = preset_query(query_pairs(query.as_deref()), TOP_TOURS_PRESET);
    list_tours(&state, pairs).await
}

async fn list_tours(state: &AppState, pairs: Vec<(String, String)>) -> ApiResult<Value> {
    let features = ApiFeatures::new().apply(&pairs)?;
    let tours = TourService::new(state.pool.clone()).list(&features).await?;

    let docs = tours.iter().map(Tour::to_document).collect::<Result<Vec<_>, _>>()?;
    let docs = features.projection.apply_all(&TOUR_SCHEMA, docs);
    let results = docs.len();

    Ok(ApiResponse::success(json!({ "tours": docs })).results(results))
}

/// GET /api/v1/tours/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let tour = TourService::new(state.pool.clone()).get(id).await?;
    Ok(ApiResponse::success(json!({ "tour": visible(&tour)? })))
}

/// POST /api/v1/tours
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<TourInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;
    let tour = TourService::new(state.pool.clone()).create(input).await?;
    Ok(ApiResponse::created(json!({ "tour": visible(&tour)? })))
}

/// PATCH /api/v1/tours/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TourInput>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let Json(patch) = payload?;
    let tour = TourService::new(state.pool.clone()).update(id, patch).await?;
    Ok(ApiResponse::success(json!({ "tour": visible(&tour)? })))
}

/// DELETE /api/v1/tours/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_id(&id)?;
    TourService::new(state.pool.clone()).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/v1/tours/tour-stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Value> {
    let stats = TourService::new(state.pool.clone()).stats().await?;
    let results = stats.len();
    Ok(ApiResponse::success(json!({ "stats": stats })).results(results))
}

/// GET /api/v1/tours/monthly-plan/:year
pub async fn monthly_plan(State(state): State<AppState>, Path(year): Path<String>) -> ApiResult<Value> {
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| crate::error::ApiError::bad_request(format!("Invalid year: {}", year)))?;
    let plan = TourService::new(state.pool.clone()).monthly_plan(year).await?;
    let results = plan.len();
    Ok(ApiResponse::success(json!({ "plan": plan })).results(results))
}

/// Single-document form: default projection applied
fn visible(tour: &Tour) -> Result<Value, serde_json::Error> {
    let mut doc = tour.to_document()?;
    if let Value::Object(map) = &mut doc {
        crate::filter::Projection::default().apply(&TOUR_SCHEMA, map);
    }
    Ok(doc)
}
