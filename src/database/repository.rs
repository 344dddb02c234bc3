use serde_json::{Map, Value};
use sqlx::{self, postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::{FilterData, Schema};

/// Read access to one resource table. Every query is constrained by the
/// repository scope, so records outside it behave as if they did not exist.
pub struct Repository<T> {
    schema: &'static Schema,
    scope: Option<Value>,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(schema: &'static Schema, pool: PgPool) -> Self {
        Self {
            schema,
            scope: None,
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn scoped(mut self, scope: Value) -> Self {
        self.scope = Some(scope);
        self
    }

    fn builder(&self) -> Result<QueryBuilder<T>, DatabaseError> {
        QueryBuilder::<T>::new(self.schema)?.scope(self.scope.as_ref())
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        self.builder()?
            .filter(filter_data)?
            .select_all(&self.pool)
            .await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        self.builder()?
            .filter(FilterData { limit: Some(1), offset: None, ..filter_data })?
            .select_optional(&self.pool)
            .await
    }

    /// Fetch by primary key, mapping absence to [`DatabaseError::NotFound`]
    pub async fn select_404(&self, id: Uuid) -> Result<T, DatabaseError> {
        let filter = FilterData {
            where_clause: Some(Value::Object(Map::from_iter([(
                self.schema.primary_key.to_string(),
                Value::String(id.to_string()),
            )]))),
            ..Default::default()
        };
        self.select_one(filter)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("No document found with ID {}", id)))
    }
}
