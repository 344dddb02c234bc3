use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{postgres::PgArguments, FromRow, PgPool, Postgres};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::tour::{tour_scope, Tour, TourInput, TourRecord, TOUR_SCHEMA};
use crate::database::models::ValidationError;
use crate::database::query_builder::bind_param_query_as;
use crate::database::Repository;
use crate::filter::{Filter, QueryFeatures, SqlParam, SqlResult};

/// Only tours rated at least this well count toward the statistics
pub const STATS_MIN_RATING: f64 = 4.5;

const INSERT_TOUR: &str = r#"INSERT INTO "tours" (
    "name", "slug", "duration", "max_group_size", "difficulty",
    "ratings_average", "ratings_quantity", "price", "price_discount", "summary",
    "description", "image_cover", "images", "start_dates", "secret_tour", "id"
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
RETURNING *"#;

const UPDATE_TOUR: &str = r#"UPDATE "tours" SET
    "name" = $1, "slug" = $2, "duration" = $3, "max_group_size" = $4, "difficulty" = $5,
    "ratings_average" = $6, "ratings_quantity" = $7, "price" = $8, "price_discount" = $9, "summary" = $10,
    "description" = $11, "image_cover" = $12, "images" = $13, "start_dates" = $14, "secret_tour" = $15,
    "version" = "version" + 1
WHERE "id" = $16
RETURNING *"#;

#[derive(Debug, thiserror::Error)]
pub enum TourError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<sqlx::Error> for TourError {
    fn from(err: sqlx::Error) -> Self {
        TourError::Database(DatabaseError::Sqlx(err))
    }
}

impl From<crate::filter::FilterError> for TourError {
    fn from(err: crate::filter::FilterError) -> Self {
        TourError::Database(DatabaseError::Filter(err))
    }
}

/// Per-difficulty aggregate over well-rated tours
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TourStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts within one month of a year
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

pub struct TourService {
    pool: PgPool,
}

impl TourService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<Tour> {
        Repository::new(&TOUR_SCHEMA, self.pool.clone()).scoped(tour_scope())
    }

    pub async fn list(&self, features: &QueryFeatures) -> Result<Vec<Tour>, TourError> {
        Ok(self.repository().select_any(features.to_filter_data()).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Tour, TourError> {
        Ok(self.repository().select_404(id).await?)
    }

    pub async fn create(&self, input: TourInput) -> Result<Tour, TourError> {
        let record = input.validate()?;
        self.insert(&record).await
    }

    pub async fn insert(&self, record: &TourRecord) -> Result<Tour, TourError> {
        let query = bind_record(sqlx::query_as::<_, Tour>(INSERT_TOUR), record).bind(Uuid::new_v4());
        let tour = query.fetch_one(&self.pool).await?;
        tracing::info!(id = %tour.id, name = %tour.name, "Created tour");
        Ok(tour)
    }

    /// Apply a partial update; the merged document is validated as a whole
    pub async fn update(&self, id: Uuid, patch: TourInput) -> Result<Tour, TourError> {
        let current = self.get(id).await?;
        let record = current.merge(patch).validate()?;

        let query = bind_record(sqlx::query_as::<_, Tour>(UPDATE_TOUR), &record).bind(id);
        query
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| TourError::Database(DatabaseError::NotFound(format!("No document found with ID {}", id))))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), TourError> {
        let result = sqlx::query(r#"DELETE FROM "tours" WHERE "id" = $1 AND "secret_tour" IS DISTINCT FROM TRUE"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("No document found with ID {}", id)).into());
        }
        Ok(())
    }

    /// Remove every tour, secret ones included
    pub async fn delete_all(&self) -> Result<u64, TourError> {
        let result = sqlx::query(r#"DELETE FROM "tours""#).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn stats(&self) -> Result<Vec<TourStats>, TourError> {
        let sql = stats_query()?;
        let mut query = sqlx::query_as::<_, TourStats>(&sql.query);
        for p in sql.params.iter() {
            query = bind_param_query_as(query, p);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Start dates within `year`, grouped by month, busiest month first
    pub async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlan>, TourError> {
        let sql = monthly_plan_query(year)?;
        let mut query = sqlx::query_as::<_, MonthlyPlan>(&sql.query);
        for p in sql.params.iter() {
            query = bind_param_query_as(query, p);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

/// Per-difficulty aggregate over visible tours rated at least [`STATS_MIN_RATING`]
pub fn stats_query() -> Result<SqlResult, TourError> {
    let mut filter = Filter::new(&TOUR_SCHEMA)?;
    filter.scope(tour_scope())?;
    filter.where_clause(json!({ "ratingsAverage": { "$gte": STATS_MIN_RATING } }))?;
    let where_sql = filter.to_where_sql()?;

    let query = format!(
        r#"SELECT UPPER("difficulty") AS "difficulty",
            COUNT(*) AS "num_tours",
            COALESCE(SUM("ratings_quantity"), 0)::BIGINT AS "num_ratings",
            AVG("ratings_average") AS "avg_rating",
            AVG("price") AS "avg_price",
            MIN("price") AS "min_price",
            MAX("price") AS "max_price"
        FROM "tours"
        WHERE {}
        GROUP BY UPPER("difficulty")
        ORDER BY "avg_price" ASC"#,
        where_sql.query
    );
    Ok(SqlResult { query, params: where_sql.params })
}

/// One row per month of `year` with at least one visible tour start.
/// The year bounds are the last two parameters.
pub fn monthly_plan_query(year: i32) -> Result<SqlResult, TourError> {
    let invalid_year = || ValidationError::single(format!("Invalid year: {}", year));
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single().ok_or_else(invalid_year)?;
    let end = year
        .checked_add(1)
        .and_then(|next| Utc.with_ymd_and_hms(next, 1, 1, 0, 0, 0).single())
        .ok_or_else(invalid_year)?;

    let mut filter = Filter::new(&TOUR_SCHEMA)?;
    filter.scope(tour_scope())?;
    let where_sql = filter.to_where_sql()?;
    let next = where_sql.params.len() + 1;

    let query = format!(
        r#"SELECT EXTRACT(MONTH FROM "start_date")::INT AS "month",
            COUNT(*) AS "num_tour_starts",
            ARRAY_AGG("name" ORDER BY "name") AS "tours"
        FROM "tours", UNNEST("start_dates") AS "start_date"
        WHERE {} AND "start_date" >= ${} AND "start_date" < ${}
        GROUP BY 1
        ORDER BY "num_tour_starts" DESC, "month" ASC
        LIMIT 12"#,
        where_sql.query,
        next,
        next + 1
    );

    let mut params = where_sql.params;
    params.push(SqlParam::Timestamp(start));
    params.push(SqlParam::Timestamp(end));
    Ok(SqlResult { query, params })
}

fn bind_record<'q>(
    query: sqlx::query::QueryAs<'q, Postgres, Tour, PgArguments>,
    record: &'q TourRecord,
) -> sqlx::query::QueryAs<'q, Postgres, Tour, PgArguments> {
    query
        .bind(&record.name)
        .bind(&record.slug)
        .bind(record.duration)
        .bind(record.max_group_size)
        .bind(&record.difficulty)
        .bind(record.ratings_average)
        .bind(record.ratings_quantity)
        .bind(record.price)
        .bind(record.price_discount)
        .bind(&record.summary)
        .bind(&record.description)
        .bind(&record.image_cover)
        .bind(&record.images)
        .bind(&record.start_dates)
        .bind(record.secret_tour)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_only_count_visible_well_rated_tours() {
        let sql = stats_query().unwrap();
        assert!(sql.query.contains(r#"WHERE "secret_tour" IS DISTINCT FROM $1 AND "ratings_average" >= $2"#));
        assert!(sql.query.contains(r#"GROUP BY UPPER("difficulty")"#));
        assert!(sql.query.contains(r#"ORDER BY "avg_price" ASC"#));
        assert_eq!(sql.params, vec![SqlParam::Bool(true), SqlParam::Float(STATS_MIN_RATING)]);
    }

    #[test]
    fn monthly_plan_bounds_follow_the_scope_parameters() {
        let sql = monthly_plan_query(2021).unwrap();
        assert!(sql.query.contains(r#"WHERE "secret_tour" IS DISTINCT FROM $1 AND "start_date" >= $2 AND "start_date" < $3"#));
        assert!(sql.query.contains(r#"ORDER BY "num_tour_starts" DESC, "month" ASC"#));
        assert!(sql.query.trim_end().ends_with("LIMIT 12"));
        assert_eq!(
            sql.params,
            vec![
                SqlParam::Bool(true),
                SqlParam::Timestamp(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
                SqlParam::Timestamp(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()),
            ]
        );
    }

    #[test]
    fn monthly_plan_rejects_years_chrono_cannot_represent() {
        match monthly_plan_query(i32::MAX) {
            Err(TourError::Validation(e)) => assert_eq!(e.messages, vec![format!("Invalid year: {}", i32::MAX)]),
            other => panic!("expected a validation error, got {:?}", other.map(|sql| sql.query)),
        }
    }
}
