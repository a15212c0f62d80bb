//! PostgreSQL storage implementation with connection pooling

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::DomainError;
use crate::domain::storage::{
    FilterOperator, FilterValue, SortDirection, SortKind, Storage, StorageEntity, StorageKey,
    StorageQuery,
};

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/teamup".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// PostgreSQL storage implementation with connection pooling
///
/// Stores entities as JSONB in a table with (key, data) columns. Query
/// conditions are translated to expressions over `data->>'field'`.
pub struct PostgresStorage<E>
where
    E: StorageEntity,
{
    pool: PgPool,
    table_name: String,
    _phantom: PhantomData<E>,
}

impl<E> Debug for PostgresStorage<E>
where
    E: StorageEntity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl<E> PostgresStorage<E>
where
    E: StorageEntity,
{
    /// Creates a new PostgreSQL storage with the given pool and table name
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Self {
        Self {
            pool,
            table_name: table_name.into(),
            _phantom: PhantomData,
        }
    }

    /// Creates a new PostgreSQL storage with connection pooling
    pub async fn connect(
        config: &PostgresConfig,
        table_name: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let table_name = table_name.into();
        validate_identifier(&table_name)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error(e, "Failed to connect to PostgreSQL"))?;

        Ok(Self::new(pool, table_name))
    }

    /// Ensures the storage table exists
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                key VARCHAR(255) PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "Failed to create table"))?;

        Ok(())
    }
}

#[async_trait]
impl<E> Storage<E> for PostgresStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn insert(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let data = serde_json::to_value(&entity)
            .map_err(|e| DomainError::storage(format!("Failed to serialize entity: {}", e)))?;

        let query = format!(
            "INSERT INTO {} (key, data) VALUES ($1, $2)",
            self.table_name
        );

        sqlx::query(&query)
            .bind(&key)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| match map_sqlx_error(e, "Failed to insert entity") {
                DomainError::Conflict { .. } => {
                    DomainError::conflict(format!("Entity with key '{}' already exists", key))
                }
                other => other,
            })?;

        Ok(entity)
    }

    async fn select(&self, query: &StorageQuery) -> Result<Vec<E>, DomainError> {
        let (sql, params) = build_select_sql(&self.table_name, query)?;

        let mut statement = sqlx::query(&sql);
        for param in params {
            statement = match param {
                FilterValue::String(s) => statement.bind(s),
                FilterValue::Integer(n) => statement.bind(n),
                FilterValue::Float(n) => statement.bind(n),
                FilterValue::Boolean(b) => statement.bind(b),
                FilterValue::Timestamp(ts) => statement.bind(ts),
                FilterValue::Null => statement,
            };
        }

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "Failed to select entities"))?;

        rows.iter().map(decode_row).collect()
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let query = format!("SELECT COUNT(*) as count FROM {}", self.table_name);

        let row = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "Failed to count entities"))?;

        let count: i64 = row.get("count");
        Ok(count as usize)
    }
}

fn decode_row<E: StorageEntity>(row: &sqlx::postgres::PgRow) -> Result<E, DomainError> {
    let data: serde_json::Value = row
        .try_get("data")
        .map_err(|e| DomainError::storage(format!("Failed to read data column: {}", e)))?;

    serde_json::from_value(data)
        .map_err(|e| DomainError::storage(format!("Failed to deserialize entity: {}", e)))
}

fn validate_identifier(name: &str) -> Result<(), DomainError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "Invalid identifier '{}': only [a-z0-9_] allowed",
            name
        )))
    }
}

fn field_expr(field: &str, cast: Option<&str>) -> String {
    match cast {
        Some(cast) => format!("(data->>'{}')::{}", field, cast),
        None => format!("data->>'{}'", field),
    }
}

/// Translate a query into SQL plus the ordered bind parameters
fn build_select_sql(
    table_name: &str,
    query: &StorageQuery,
) -> Result<(String, Vec<FilterValue>), DomainError> {
    let mut clauses = Vec::with_capacity(query.conditions.len());
    let mut params = Vec::new();

    for condition in &query.conditions {
        validate_identifier(&condition.field)?;

        if condition.value == FilterValue::Null {
            let expr = field_expr(&condition.field, None);
            let clause = match condition.operator {
                FilterOperator::Eq => format!("{} IS NULL", expr),
                FilterOperator::Ne => format!("{} IS NOT NULL", expr),
                other => {
                    return Err(DomainError::validation(format!(
                        "Operator '{}' cannot compare against null",
                        other
                    )));
                }
            };
            clauses.push(clause);
            continue;
        }

        let cast = match condition.value {
            FilterValue::String(_) => None,
            FilterValue::Integer(_) => Some("bigint"),
            FilterValue::Float(_) => Some("double precision"),
            FilterValue::Boolean(_) => Some("boolean"),
            FilterValue::Timestamp(_) => Some("timestamptz"),
            FilterValue::Null => None,
        };

        params.push(condition.value.clone());
        let placeholder = format!("${}", params.len());
        let expr = field_expr(&condition.field, cast);

        let clause = match condition.operator {
            FilterOperator::Ne => format!("{} IS DISTINCT FROM {}", expr, placeholder),
            op => format!("{} {} {}", expr, op.as_sql(), placeholder),
        };
        clauses.push(clause);
    }

    let mut sql = format!("SELECT data FROM {}", table_name);

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    if let Some(ref order) = query.order_by {
        validate_identifier(&order.field)?;

        let cast = match order.kind {
            SortKind::Text => None,
            SortKind::Number => Some("double precision"),
            SortKind::Timestamp => Some("timestamptz"),
        };
        let direction = match order.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        sql.push_str(&format!(
            " ORDER BY {} {} NULLS LAST",
            field_expr(&order.field, cast),
            direction
        ));
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    Ok((sql, params))
}

/// Classify driver failures so callers can tell transient faults apart
fn map_sqlx_error(error: sqlx::Error, context: &str) -> DomainError {
    let message = format!("{}: {}", context, error);

    match &error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => DomainError::unavailable(message),
        sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::conflict(message),
        sqlx::Error::Database(db) => match db.code() {
            // connection_exception, operator_intervention, too_many_connections, serialization_failure
            Some(code)
                if code.starts_with("08")
                    || code.starts_with("57P")
                    || code == "53300"
                    || code == "40001" =>
            {
                DomainError::unavailable(message)
            }
            _ => DomainError::storage(message),
        },
        _ => DomainError::storage(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.idle_timeout_secs, 600);
    }

    #[test]
    fn test_postgres_config_builder() {
        let config = PostgresConfig::new("postgres://localhost/test")
            .with_max_connections(20)
            .with_connect_timeout(60);

        assert_eq!(config.url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.connect_timeout_secs, 60);
    }

    #[test]
    fn test_build_select_sql_full_query() {
        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let query = StorageQuery::new()
            .eq("category", "chat")
            .gte("created_at", since)
            .order_by("created_at", SortKind::Timestamp, SortDirection::Desc)
            .limit(100);

        let (sql, params) = build_select_sql("ai_exchanges", &query).unwrap();

        assert_eq!(
            sql,
            "SELECT data FROM ai_exchanges WHERE data->>'category' = $1 \
             AND (data->>'created_at')::timestamptz >= $2 \
             ORDER BY (data->>'created_at')::timestamptz DESC NULLS LAST LIMIT 100"
        );
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], FilterValue::String("chat".to_string()));
        assert_eq!(params[1], FilterValue::Timestamp(since));
    }

    #[test]
    fn test_build_select_sql_null_and_ne() {
        let query = StorageQuery::new()
            .eq("user_id", FilterValue::Null)
            .filter("category", FilterOperator::Ne, "summary");

        let (sql, params) = build_select_sql("t", &query).unwrap();

        assert_eq!(
            sql,
            "SELECT data FROM t WHERE data->>'user_id' IS NULL \
             AND data->>'category' IS DISTINCT FROM $1"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_build_select_sql_no_conditions() {
        let (sql, params) = build_select_sql("t", &StorageQuery::new()).unwrap();
        assert_eq!(sql, "SELECT data FROM t");
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_select_sql_rejects_unsafe_field() {
        let query = StorageQuery::new().eq("category'; DROP TABLE t; --", "x");
        let result = build_select_sql("t", &query);
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_build_select_sql_rejects_null_ordering() {
        let query = StorageQuery::new().gte("user_id", FilterValue::Null);
        assert!(build_select_sql("t", &query).is_err());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let error = map_sqlx_error(sqlx::Error::PoolTimedOut, "Failed to insert entity");
        assert!(error.is_transient());

        let error = map_sqlx_error(sqlx::Error::RowNotFound, "Failed to get entity");
        assert!(!error.is_transient());
    }
}
