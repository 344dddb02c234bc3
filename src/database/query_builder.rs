use std::time::Instant;

use sqlx::{self, postgres::PgArguments, FromRow, PgPool};

use crate::config::CONFIG;
use crate::database::manager::DatabaseError;
use crate::filter::types::{SqlParam, SqlResult};
use crate::filter::{Filter, FilterData, Schema};

pub struct QueryBuilder<T> {
    filter: Filter,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    pub fn new(schema: &'static Schema) -> Result<Self, DatabaseError> {
        Ok(Self {
            filter: Filter::new(schema)?,
            _phantom: std::marker::PhantomData,
        })
    }

    /// Always-on condition, ANDed ahead of the caller's filter
    pub fn scope(mut self, scope: Option<&serde_json::Value>) -> Result<Self, DatabaseError> {
        if let Some(scope) = scope {
            self.filter.scope(scope.clone())?;
        }
        Ok(self)
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        self.filter.assign(filter_data)?;
        Ok(self)
    }

    pub async fn select_all(self, pool: &PgPool) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.filter.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        let started = Instant::now();
        let rows = q.fetch_all(pool).await?;
        log_query(&sql_result, started);
        Ok(rows)
    }

    pub async fn select_optional(self, pool: &PgPool) -> Result<Option<T>, DatabaseError> {
        let sql_result = self.filter.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        let started = Instant::now();
        let row = q.fetch_optional(pool).await?;
        log_query(&sql_result, started);
        Ok(row)
    }
}

fn log_query(sql_result: &SqlResult, started: Instant) {
    let database = &CONFIG.database;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if database.enable_query_logging {
        tracing::debug!(
            query = %sql_result.query,
            params = sql_result.params.len(),
            elapsed_ms,
            "Executed query"
        );
    }
    if database.enable_slow_query_warning && elapsed_ms >= database.slow_query_threshold_ms {
        tracing::warn!(query = %sql_result.query, elapsed_ms, "Slow query");
    }
}

pub(crate) fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    p: &'q SqlParam,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match p {
        SqlParam::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Int(i) => q.bind(*i),
        SqlParam::Float(f) => q.bind(*f),
        SqlParam::Text(s) => q.bind(s.as_str()),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Uuid(u) => q.bind(*u),
    }
}
