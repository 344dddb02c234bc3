use axum::extract::{rejection::JsonRejection, Path, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth;
use crate::config::config;
use crate::database::models::user::{normalize_email, validate_new_password, SignupInput, User};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::{mail, UserService};

use super::utils::{parse_id, request_origin};

pub const INCORRECT_CREDENTIALS: &str = "Incorrect email or password";

#[derive(Debug, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    pub password: Option<String>,
    pub password_confirmed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordInput {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub new_password_confirmed: Option<String>,
}

/// Token plus the user document, the response to every credential change
fn token_response(user: &User, status: axum::http::StatusCode) -> ApiResult<Value> {
    let token = auth::sign_token(user.id)?;
    Ok(ApiResponse::success(json!({ "user": super::users::visible(user)? }))
        .token(token)
        .status(status))
}

/// POST /api/v1/users/signup
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;
    let new_user = input.validate()?;
    let user = UserService::new(state.pool.clone()).create(new_user).await?;
    token_response(&user, axum::http::StatusCode::CREATED)
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;
    let (Some(email), Some(password)) = (
        input.email.filter(|e| !e.trim().is_empty()),
        input.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Please provide email and password!"));
    };

    let user = UserService::new(state.pool.clone())
        .find_by_email(&normalize_email(&email))
        .await?;

    match user {
        Some(user) if auth::verify_password(&password, &user.password_hash) => {
            token_response(&user, axum::http::StatusCode::OK)
        }
        _ => Err(ApiError::unauthorized(INCORRECT_CREDENTIALS)),
    }
}

/// POST /api/v1/users/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ForgotPasswordInput>, JsonRejection>,
) -> ApiResult<()> {
    let Json(input) = payload?;
    let email = input
        .email
        .map(|e| normalize_email(&e))
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::bad_request("Please provide your email"))?;

    let users = UserService::new(state.pool.clone());
    let user = users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("There is no user with that email address."))?;

    let security = &config().security;
    let reset_token = auth::generate_reset_token();
    users
        .set_reset_token(user.id, &auth::hash_reset_token(&reset_token), security.password_reset_ttl_minutes)
        .await?;

    let reset_url = format!(
        "{}/api/v1/users/reset-password/{}",
        request_origin(&headers, security.require_https),
        reset_token
    );
    let email = mail::password_reset_email(
        &config().mail.from,
        &user.email,
        &reset_url,
        security.password_reset_ttl_minutes,
    );

    if let Err(e) = state.mailer.send(email).await {
        users.clear_reset_token(user.id).await?;
        return Err(e.into());
    }

    Ok(ApiResponse::message("Token sent to email!"))
}

/// PATCH /api/v1/users/reset-password/:token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    payload: Result<Json<ResetPasswordInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;
    let users = UserService::new(state.pool.clone());

    let user = users
        .find_by_reset_token(&auth::hash_reset_token(&token))
        .await?
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    validate_new_password(input.password.as_deref(), input.password_confirmed.as_deref())?;
    let password = input.password.unwrap_or_default();

    let user = users.set_password(user.id, &password).await?;
    token_response(&user, axum::http::StatusCode::OK)
}

/// PATCH /api/v1/users/update-password/:id
pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePasswordInput>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    if id != current.id {
        return Err(ApiError::forbidden("You can only change your own password"));
    }
    let Json(input) = payload?;

    let current_password = input.current_password.unwrap_or_default();
    if !auth::verify_password(&current_password, &current.password_hash) {
        return Err(ApiError::unauthorized("Your current password is wrong."));
    }

    validate_new_password(input.new_password.as_deref(), input.new_password_confirmed.as_deref())?;
    let password = input.new_password.unwrap_or_default();

    let user = UserService::new(state.pool.clone()).set_password(current.id, &password).await?;
    token_response(&user, axum::http::StatusCode::OK)
}
