use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth;
use crate::database::manager::DatabaseError;
use crate::database::models::{Role, User};
use crate::error::ApiError;
use crate::services::{UserError, UserService};

pub const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";
pub const USER_NO_LONGER_EXISTS: &str = "The user belonging to this token no longer exists.";
pub const PASSWORD_CHANGED: &str = "User recently changed password! Please log in again.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action";

/// Authenticated user attached to the request by [`protect`]
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Require a valid bearer token whose user still exists, is active and has
/// not changed password since the token was issued.
pub async fn protect(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))?;
    let claims = auth::validate_jwt(&token)?;

    let user = match UserService::new(state.pool.clone()).find_by_id(claims.id).await {
        Ok(user) => user,
        Err(UserError::Database(DatabaseError::NotFound(_))) => {
            return Err(ApiError::unauthorized(USER_NO_LONGER_EXISTS));
        }
        Err(e) => return Err(e.into()),
    };

    if user.changed_password_after(claims.iat) {
        return Err(ApiError::unauthorized(PASSWORD_CHANGED));
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Allow only the given roles. Must run after [`protect`].
pub async fn restrict_to(
    State(roles): State<&'static [Role]>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))?;

    if !roles.contains(&current.0.role) {
        tracing::debug!(user = %current.0.id, role = %current.0.role, "Role not permitted");
        return Err(ApiError::forbidden(PERMISSION_DENIED));
    }

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}
