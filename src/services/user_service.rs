use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth;
use crate::database::manager::DatabaseError;
use crate::database::models::user::{user_scope, NewUser, ProfileUpdate, User, USER_SCHEMA};
use crate::database::models::ValidationError;
use crate::database::Repository;
use crate::filter::{FilterData, QueryFeatures};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        UserError::Database(DatabaseError::Sqlx(err))
    }
}

fn not_found(id: Uuid) -> UserError {
    UserError::Database(DatabaseError::NotFound(format!("No user found with ID {}", id)))
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<User> {
        Repository::new(&USER_SCHEMA, self.pool.clone()).scoped(user_scope())
    }

    pub async fn list(&self, features: &QueryFeatures) -> Result<Vec<User>, UserError> {
        Ok(self.repository().select_any(features.to_filter_data()).await?)
    }

    /// Active user by id
    pub async fn find_by_id(&self, id: Uuid) -> Result<User, UserError> {
        Ok(self.repository().select_404(id).await?)
    }

    /// Active user by (normalized) email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let filter = FilterData {
            where_clause: Some(json!({ "email": email })),
            ..Default::default()
        };
        Ok(self.repository().select_one(filter).await?)
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User, UserError> {
        let password_hash = auth::hash_password(&new_user.password)?;
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO "users" ("id", "name", "email", "password_hash")
            VALUES ($1, $2, $3, $4)
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(id = %user.id, "Created user");
        Ok(user)
    }

    pub async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User, UserError> {
        let update = update.validate()?;
        sqlx::query_as::<_, User>(
            r#"UPDATE "users"
            SET "name" = COALESCE($2, "name"), "email" = COALESCE($3, "email"), "version" = "version" + 1
            WHERE "id" = $1 AND "active" IS DISTINCT FROM FALSE
            RETURNING *"#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }

    /// Soft delete; the account disappears from every scoped read
    pub async fn deactivate(&self, id: Uuid) -> Result<(), UserError> {
        let result = sqlx::query(
            r#"UPDATE "users" SET "active" = FALSE, "version" = "version" + 1
            WHERE "id" = $1 AND "active" IS DISTINCT FROM FALSE"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Store a hashed reset token. Returns the expiry that was set.
    pub async fn set_reset_token(
        &self,
        id: Uuid,
        hashed_token: &str,
        ttl_minutes: i64,
    ) -> Result<DateTime<Utc>, UserError> {
        let expires = Utc::now() + Duration::minutes(ttl_minutes);
        sqlx::query(r#"UPDATE "users" SET "password_reset_token" = $2, "password_reset_expires" = $3 WHERE "id" = $1"#)
            .bind(id)
            .bind(hashed_token)
            .bind(expires)
            .execute(&self.pool)
            .await?;
        Ok(expires)
    }

    pub async fn clear_reset_token(&self, id: Uuid) -> Result<(), UserError> {
        sqlx::query(r#"UPDATE "users" SET "password_reset_token" = NULL, "password_reset_expires" = NULL WHERE "id" = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Active user holding this hashed token, provided it has not expired
    pub async fn find_by_reset_token(&self, hashed_token: &str) -> Result<Option<User>, UserError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT * FROM "users"
            WHERE "password_reset_token" = $1
              AND "password_reset_expires" > $2
              AND "active" IS DISTINCT FROM FALSE"#,
        )
        .bind(hashed_token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Replace the password and clear any reset token. `password_changed_at`
    /// is backdated one second so a token signed right after still verifies.
    pub async fn set_password(&self, id: Uuid, password: &str) -> Result<User, UserError> {
        let password_hash = auth::hash_password(password)?;
        let changed_at = Utc::now() - Duration::seconds(1);
        sqlx::query_as::<_, User>(
            r#"UPDATE "users"
            SET "password_hash" = $2, "password_changed_at" = $3,
                "password_reset_token" = NULL, "password_reset_expires" = NULL,
                "version" = "version" + 1
            WHERE "id" = $1
            RETURNING *"#,
        )
        .bind(id)
        .bind(&password_hash)
        .bind(changed_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }
}
