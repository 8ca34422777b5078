use crate::config::DatabaseConfig;
use crate::models::CacheRecord;
use crate::storage::{CacheStore, StorageResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
    table: String,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32, table_name: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
            table: table_name.to_string(),
        })
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .context("DATABASE_URL must be set for the SQLite backend")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool.max_open_conns)
            .max_lifetime(config.pool.max_lifetime)
            .idle_timeout(config.pool.max_idle_time)
            .connect(url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
            table: config.table_name.clone(),
        })
    }
}

#[async_trait]
impl CacheStore for SqliteStorage {
    async fn init(&self) -> Result<()> {
        let table = &self.table;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                country TEXT NOT NULL
            )
            "#
        ))
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_ip_key ON {table}(ip)"
        ))
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn lookup(&self, ip: &str) -> StorageResult<Option<CacheRecord>> {
        let record = sqlx::query_as::<_, CacheRecord>(&format!(
            "SELECT id, ip, country FROM {} WHERE ip = ? ORDER BY id DESC LIMIT 1",
            self.table
        ))
        .bind(ip)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn insert(&self, ip: &str, country: &str) -> StorageResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (ip, country)
            VALUES (?, ?)
            ON CONFLICT(ip) DO UPDATE SET country = excluded.country
            "#,
            self.table
        ))
        .bind(ip)
        .bind(country)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
