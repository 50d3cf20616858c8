//! PostgreSQL storage: one JSONB document per entity

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::filter::Filter;
use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    /// Idle connections are closed after this long; `None` keeps them
    pub idle_timeout: Option<Duration>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/data_factory".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
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

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Opens a pool with these settings
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage(format!("PostgreSQL connection failed: {}", e)))
    }
}

/// Statements for one table, rendered once
#[derive(Debug, Clone)]
struct TableSql {
    create: String,
    select_one: String,
    select_all: String,
    select_matching: String,
    upsert: String,
    delete: String,
    exists: String,
    count: String,
}

impl TableSql {
    fn for_table(table: &str) -> Result<Self, DomainError> {
        let valid = !table.is_empty()
            && !table.starts_with(|c: char| c.is_ascii_digit())
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid {
            return Err(DomainError::configuration(format!(
                "Invalid table name '{}': use letters, digits and underscores",
                table
            )));
        }

        Ok(Self {
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 key TEXT PRIMARY KEY, \
                 data JSONB NOT NULL, \
                 created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
                 updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW())"
            ),
            select_one: format!("SELECT data FROM {table} WHERE key = $1"),
            select_all: format!("SELECT data FROM {table} ORDER BY created_at, key"),
            select_matching: format!(
                "SELECT data FROM {table} WHERE data @> $1 ORDER BY created_at, key"
            ),
            upsert: format!(
                "INSERT INTO {table} (key, data) VALUES ($1, $2) \
                 ON CONFLICT (key) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()"
            ),
            delete: format!("DELETE FROM {table} WHERE key = $1"),
            exists: format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE key = $1) AS found"),
            count: format!("SELECT COUNT(*) AS total FROM {table}"),
        })
    }
}

/// `Storage` over a PostgreSQL table of JSONB documents
///
/// Rows are keyed by `StorageKey::storage_key`. `find_matching` is a JSONB
/// containment query, the same rule `Filter::matches` applies in memory.
pub struct PostgresStorage<E> {
    pool: PgPool,
    table: String,
    sql: TableSql,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Debug for PostgresStorage<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table", &self.table)
            .field("entity", &std::any::type_name::<E>())
            .finish()
    }
}

impl<E: StorageEntity> PostgresStorage<E> {
    /// Wraps an existing pool; fails on a table name that is not a plain identifier
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, DomainError> {
        let table = table.into();
        let sql = TableSql::for_table(&table)?;

        Ok(Self {
            pool,
            table,
            sql,
            _entity: PhantomData,
        })
    }

    pub async fn connect(config: &PostgresConfig, table: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(config.connect().await?, table)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(&self.sql.create)
            .execute(&self.pool)
            .await
            .map_err(|e| self.failed("create table", e))?;
        Ok(())
    }

    fn failed(&self, action: &str, e: sqlx::Error) -> DomainError {
        DomainError::storage(format!("{} on '{}' failed: {}", action, self.table, e))
    }

    fn entity_from(row: &PgRow) -> Result<E, DomainError> {
        let data: serde_json::Value = row
            .try_get("data")
            .map_err(|e| DomainError::storage(format!("Unreadable data column: {}", e)))?;

        serde_json::from_value(data)
            .map_err(|e| DomainError::storage(format!("Stored document does not decode: {}", e)))
    }

    async fn fetch_documents(&self, sql: &str, filter: Option<serde_json::Value>) -> Result<Vec<E>, DomainError> {
        let mut query = sqlx::query(sql);
        if let Some(document) = filter {
            query = query.bind(document);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.failed("select", e))?;

        rows.iter().map(Self::entity_from).collect()
    }
}

#[async_trait]
impl<E: StorageEntity> Storage<E> for PostgresStorage<E> {
    async fn find_by_id(&self, id: &E::Key) -> Result<Option<E>, DomainError> {
        let row = sqlx::query(&self.sql.select_one)
            .bind(id.storage_key())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.failed("select by key", e))?;

        row.as_ref().map(Self::entity_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<E>, DomainError> {
        self.fetch_documents(&self.sql.select_all, None).await
    }

    async fn find_matching(&self, filter: &Filter) -> Result<Vec<E>, DomainError> {
        if filter.is_empty() {
            return self.find_all().await;
        }

        let document = serde_json::to_value(filter)?;
        self.fetch_documents(&self.sql.select_matching, Some(document))
            .await
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().storage_key();
        let document = serde_json::to_value(&entity)
            .map_err(|e| DomainError::storage(format!("Entity '{}' does not encode: {}", key, e)))?;

        sqlx::query(&self.sql.upsert)
            .bind(&key)
            .bind(document)
            .execute(&self.pool)
            .await
            .map_err(|e| self.failed("upsert", e))?;

        Ok(entity)
    }

    async fn delete(&self, entity: &E) -> Result<bool, DomainError> {
        let result = sqlx::query(&self.sql.delete)
            .bind(entity.key().storage_key())
            .execute(&self.pool)
            .await
            .map_err(|e| self.failed("delete", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists_by_id(&self, id: &E::Key) -> Result<bool, DomainError> {
        let row = sqlx::query(&self.sql.exists)
            .bind(id.storage_key())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.failed("exists", e))?;

        row.try_get::<bool, _>("found")
            .map_err(|e| self.failed("read exists flag", e))
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let row = sqlx::query(&self.sql.count)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.failed("count", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| self.failed("read count", e))?;

        Ok(u64::try_from(total).unwrap_or(0))
    }
}
