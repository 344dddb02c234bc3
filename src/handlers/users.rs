use axum::extract::{rejection::JsonRejection, Path, RawQuery, State};
use axum::{Extension, Json};
use serde_json::{json, Map, Value};

use crate::app::AppState;
use crate::database::models::user::{ProfileUpdate, User, USER_SCHEMA};
use crate::error::ApiError;
use crate::filter::{ApiFeatures, Projection};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::UserService;

use super::utils::{parse_id, query_pairs};

pub const DEFAULT_USER_SORT: &str = "name";

/// GET /api/v1/users
pub async fn list(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    let pairs = query_pairs(query.as_deref());
    let features = ApiFeatures::new().with_default_sort(DEFAULT_USER_SORT).apply(&pairs)?;
    let users = UserService::new(state.pool.clone()).list(&features).await?;

    let docs = users.iter().map(User::to_document).collect::<Result<Vec<_>, _>>()?;
    let docs = features.projection.apply_all(&USER_SCHEMA, docs);
    let results = docs.len();

    Ok(ApiResponse::success(json!({ "users": docs })).results(results))
}

/// POST /api/v1/users
pub async fn create() -> ApiResult<()> {
    Err(ApiError::bad_request("This route is not defined. Please use /signup instead."))
}

/// GET /api/v1/users/me
pub async fn me(Extension(CurrentUser(current)): Extension<CurrentUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({ "user": visible(&current)? })))
}

/// GET /api/v1/users/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let user = UserService::new(state.pool.clone()).find_by_id(id).await?;
    Ok(ApiResponse::success(json!({ "user": visible(&user)? })))
}

/// PATCH /api/v1/users/me - name and email only
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    if body.contains_key("password") || body.contains_key("passwordConfirmed") {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /update-password.",
        ));
    }

    let update: ProfileUpdate = serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::invalid_json(e.to_string()))?;
    let user = UserService::new(state.pool.clone()).update_profile(current.id, update).await?;
    Ok(ApiResponse::success(json!({ "user": visible(&user)? })))
}

/// DELETE /api/v1/users/me - deactivates the account
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
) -> ApiResult<()> {
    UserService::new(state.pool.clone()).deactivate(current.id).await?;
    Ok(ApiResponse::no_content())
}

/// DELETE /api/v1/users/:id - admin only, deactivates the target account
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_id(&id)?;
    UserService::new(state.pool.clone()).deactivate(id).await?;
    Ok(ApiResponse::no_content())
}

pub(super) fn visible(user: &User) -> Result<Value, serde_json::Error> {
    let mut doc = user.to_document()?;
    if let Value::Object(map) = &mut doc {
        Projection::default().apply(&USER_SCHEMA, map);
    }
    Ok(doc)
}
