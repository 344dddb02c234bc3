// HTTP API Error Types
use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::JwtError;
use crate::database::manager::DatabaseError;
use crate::database::models::ValidationError;
use crate::filter::FilterError;
use crate::services::{MailError, TourError, UserError};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        errors: Vec<String>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError {
        message: String,
        detail: Option<String>,
    },

    // 503 Service Unavailable
    ServiceUnavailable {
        message: String,
        detail: Option<String>,
    },
}

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError { .. } => 500,
            ApiError::ServiceUnavailable { .. } => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError { message, .. } => message,
            ApiError::ServiceUnavailable { message, .. } => message,
        }
    }

    /// `"fail"` for client errors, `"error"` for server errors
    pub fn status(&self) -> &'static str {
        if self.status_code() >= 500 {
            "error"
        } else {
            "fail"
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError { .. } => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            ApiError::InternalServerError { detail, .. } | ApiError::ServiceUnavailable { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }

    /// Convert to JSON response body. Server-side detail is only exposed
    /// when `include_detail` is set.
    pub fn to_json_with(&self, include_detail: bool) -> Value {
        let mut body = json!({
            "status": self.status(),
            "message": self.message(),
            "code": self.error_code(),
        });

        if let ApiError::ValidationError { errors, .. } = self {
            body["errors"] = json!(errors);
        }
        if include_detail {
            if let Some(detail) = self.detail() {
                body["detail"] = json!(detail);
            }
        }
        body
    }

    pub fn to_json(&self) -> Value {
        self.to_json_with(crate::is_development!())
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(errors: Vec<String>) -> Self {
        let message = ValidationError { messages: errors.clone() }.to_string();
        ApiError::ValidationError { message, errors }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// Log the underlying error and hide it behind the generic message
    pub fn internal(err: impl std::fmt::Debug) -> Self {
        let detail = format!("{:?}", err);
        tracing::error!("Internal error: {}", detail);
        ApiError::InternalServerError {
            message: GENERIC_ERROR_MESSAGE.to_string(),
            detail: Some(detail),
        }
    }

    pub fn route_not_found(path: &str) -> Self {
        ApiError::not_found(format!("Can't find {} on this server.", path))
    }

    pub fn invalid_id(value: &str) -> Self {
        ApiError::bad_request(format!("Invalid id: {}", value))
    }
}

/// `tours_name_key` → `name`
fn constraint_field(constraint: &str) -> &str {
    let base = constraint.strip_suffix("_key").unwrap_or(constraint);
    base.split_once('_').map(|(_, field)| field).unwrap_or(base)
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("No document found with that ID"),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => {
                    let field = db_err.constraint().map(constraint_field).unwrap_or("value");
                    ApiError::bad_request(format!("Duplicate field value: {}. Please use another value.", field))
                }
                Some("22P02") | Some("22007") => ApiError::bad_request(db_err.message().to_string()),
                _ => ApiError::internal(&err),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                let detail = err.to_string();
                tracing::error!("Database unavailable: {}", detail);
                ApiError::ServiceUnavailable {
                    message: "Database temporarily unavailable".to_string(),
                    detail: Some(detail),
                }
            }
            _ => ApiError::internal(&err),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Filter(e) => e.into(),
            DatabaseError::Sqlx(e) => e.into(),
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database configuration error: {}", err);
                ApiError::ServiceUnavailable {
                    message: "Database temporarily unavailable".to_string(),
                    detail: Some(err.to_string()),
                }
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::InvalidTableName(_) | FilterError::InvalidColumn(_) => ApiError::internal(err),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::ValidationError { message: err.to_string(), errors: err.messages }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::unauthorized("Token has expired. Please login again."),
            JwtError::Invalid(_) => ApiError::unauthorized("Invalid token. Please login again."),
            JwtError::InvalidSecret | JwtError::TokenGeneration(_) => ApiError::internal(err),
        }
    }
}

impl From<TourError> for ApiError {
    fn from(err: TourError) -> Self {
        match err {
            TourError::Database(e) => e.into(),
            TourError::Validation(e) => e.into(),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Database(e) => e.into(),
            UserError::Validation(e) => e.into(),
            UserError::Hash(_) => ApiError::internal(err),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        tracing::error!("Mail delivery failed: {}", err);
        ApiError::InternalServerError {
            message: "There was an error sending the email. Try again later!".to_string(),
            detail: Some(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {}", err);
        ApiError::InternalServerError {
            message: "Failed to format response".to_string(),
            detail: Some(err.to_string()),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_fail_and_server_errors_error() {
        let fail = ApiError::bad_request("nope").to_json_with(false);
        assert_eq!(fail, json!({ "status": "fail", "message": "nope", "code": "BAD_REQUEST" }));

        let error = ApiError::internal("boom").to_json_with(false);
        assert_eq!(error["status"], "error");
        assert_eq!(error["message"], GENERIC_ERROR_MESSAGE);
        assert!(error.get("detail").is_none());
    }

    #[test]
    fn detail_only_when_requested() {
        let err = ApiError::internal("pool exploded");
        assert_eq!(err.to_json_with(true)["detail"], json!("\"pool exploded\""));
        assert!(ApiError::not_found("x").to_json_with(true).get("detail").is_none());
    }

    #[test]
    fn validation_errors_are_joined() {
        let err: ApiError = ValidationError {
            messages: vec!["Please provide your name".into(), "Please provide a valid email".into()],
        }
        .into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.message(),
            "Invalid input data. Please provide your name. Please provide a valid email"
        );
        assert_eq!(err.to_json_with(false)["errors"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn jwt_errors_map_to_401_messages() {
        let expired: ApiError = JwtError::Expired.into();
        assert_eq!(expired.status_code(), 401);
        assert_eq!(expired.message(), "Token has expired. Please login again.");

        let invalid: ApiError = JwtError::Invalid("bad sig".into()).into();
        assert_eq!(invalid.message(), "Invalid token. Please login again.");

        let secret: ApiError = JwtError::InvalidSecret.into();
        assert_eq!(secret.status_code(), 500);
    }

    #[test]
    fn filter_and_database_errors() {
        let cast: ApiError = FilterError::InvalidValue { field: "price".into(), value: "cheap".into() }.into();
        assert_eq!((cast.status_code(), cast.message()), (400, "Invalid price: cheap"));

        let op: ApiError = FilterError::UnsupportedOperator("$regex".into()).into();
        assert_eq!(op.status_code(), 400);

        let missing: ApiError = DatabaseError::NotFound("No document found with ID x".into()).into();
        assert_eq!(missing.status_code(), 404);

        let timeout: ApiError = DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert_eq!(timeout.status_code(), 503);
    }

    #[test]
    fn duplicate_key_field_comes_from_constraint_name() {
        assert_eq!(constraint_field("tours_name_key"), "name");
        assert_eq!(constraint_field("users_email_key"), "email");
        assert_eq!(constraint_field("tours_image_cover_key"), "image_cover");
    }

    #[test]
    fn route_not_found_message() {
        let err = ApiError::route_not_found("/api/v1/nothing");
        assert_eq!(err.message(), "Can't find /api/v1/nothing on this server.");
        assert_eq!(err.status_code(), 404);
    }
}
