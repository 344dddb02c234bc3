use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use super::ValidationError;
use crate::filter::{FieldKind, FieldSpec, Schema};

pub const PASSWORD_MIN_LEN: usize = 8;

static USER_FIELDS: [FieldSpec; 9] = [
    FieldSpec::new("id", "id", FieldKind::Uuid),
    FieldSpec::new("name", "name", FieldKind::Text),
    FieldSpec::new("email", "email", FieldKind::Text),
    FieldSpec::new("photo", "photo", FieldKind::Text),
    FieldSpec::new("role", "role", FieldKind::Text),
    FieldSpec::new("passwordChangedAt", "password_changed_at", FieldKind::Timestamp).hidden(),
    FieldSpec::new("active", "active", FieldKind::Boolean).hidden(),
    FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp).hidden(),
    FieldSpec::new("__v", "version", FieldKind::Integer),
];

pub static USER_SCHEMA: Schema = Schema {
    table: "users",
    primary_key: "id",
    fields: &USER_FIELDS,
};

/// Deactivated accounts are invisible to every read
pub fn user_scope() -> Value {
    json!({ "active": { "$ne": false } })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
    Guide,
    LeadGuide,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Guide => "GUIDE",
            Role::LeadGuide => "LEAD_GUIDE",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            "GUIDE" => Ok(Role::Guide),
            "LEAD_GUIDE" => Ok(Role::LeadGuide),
            _ => Err(ValidationError::single("Role can be either ADMIN, USER, GUIDE or LEAD_GUIDE")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "__v")]
    pub version: i32,
}

impl User {
    /// True when the password changed after a token issued at `iat` (seconds)
    pub fn changed_password_after(&self, iat: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => changed_at.timestamp() > iat,
            None => false,
        }
    }

    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmed: Option<String>,
}

/// A validated signup, password still in clear text
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupInput {
    pub fn validate(self) -> Result<NewUser, ValidationError> {
        let mut errors = Vec::new();

        let name = self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if name.is_none() {
            errors.push("Please provide your name".to_string());
        }

        let email = self.email.map(|e| normalize_email(&e)).filter(|e| !e.is_empty());
        match &email {
            None => errors.push("Please provide your email".to_string()),
            Some(e) if validate_email_format(e).is_err() => errors.push("Please provide a valid email".to_string()),
            Some(_) => {}
        }

        if let Err(e) = validate_new_password(self.password.as_deref(), self.password_confirmed.as_deref()) {
            errors.extend(e.messages);
        }

        ValidationError::check(errors)?;

        let (Some(name), Some(email), Some(password)) = (name, email, self.password) else {
            return Err(ValidationError::single("Please provide your name, email and password"));
        };
        Ok(NewUser { name, email, password })
    }
}

/// Fields a user may change about themselves through `PATCH /me`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(self) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();

        let name = self.name.map(|n| n.trim().to_string());
        if matches!(&name, Some(n) if n.is_empty()) {
            errors.push("Please provide your name".to_string());
        }

        let email = self.email.map(|e| normalize_email(&e));
        if let Some(e) = &email {
            if validate_email_format(e).is_err() {
                errors.push("Please provide a valid email".to_string());
            }
        }

        ValidationError::check(errors)?;
        Ok(Self { name, email })
    }
}

/// Check a new password and its confirmation
pub fn validate_new_password(password: Option<&str>, confirmed: Option<&str>) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    match password {
        None | Some("") => errors.push("Please provide a password".to_string()),
        Some(p) if p.chars().count() < PASSWORD_MIN_LEN => {
            errors.push(format!("Password must have more or equal than {} characters", PASSWORD_MIN_LEN))
        }
        Some(_) => {}
    }
    match confirmed {
        None | Some("") => errors.push("Please confirm your password".to_string()),
        Some(c) if Some(c) != password => errors.push("Confirmed password must be same as your password".to_string()),
        Some(_) => {}
    }
    ValidationError::check(errors)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email shape check: one `@`, non-empty local part, dotted domain
pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }
    if email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err("Invalid email format".to_string());
    }

    let domain = parts[1];
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}
