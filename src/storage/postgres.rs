use crate::config::DatabaseConfig;
use crate::models::CacheRecord;
use crate::storage::{CacheStore, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
    queries: Queries,
}

/// Statements for one table. The table name is a validated identifier; every
/// value goes through a bind parameter.
struct Queries {
    create_table: String,
    create_index: String,
    select: String,
    upsert: String,
}

impl Queries {
    fn for_table(table: &str) -> Self {
        Self {
            create_table: format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id BIGSERIAL PRIMARY KEY,
                    ip TEXT NOT NULL,
                    country TEXT NOT NULL
                )
                "#
            ),
            create_index: format!("CREATE UNIQUE INDEX IF NOT EXISTS {table}_ip_key ON {table} (ip)"),
            // Older tables were created with SERIAL ids.
            select: format!(
                r#"
                SELECT CAST(id AS BIGINT) AS id, ip, country
                FROM {table}
                WHERE ip = $1
                ORDER BY id DESC
                LIMIT 1
                "#
            ),
            upsert: format!(
                r#"
                INSERT INTO {table} (ip, country)
                VALUES ($1, $2)
                ON CONFLICT (ip) DO UPDATE SET country = EXCLUDED.country
                "#
            ),
        }
    }
}

impl PostgresStorage {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = match &config.url {
            Some(url) => PgConnectOptions::from_str(url)?,
            None => PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .password(&config.password)
                .database(&config.name),
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.pool.max_open_conns)
            .max_lifetime(config.pool.max_lifetime)
            .idle_timeout(config.pool.max_idle_time)
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool, &config.table_name))
    }

    pub fn from_pool(pool: PgPool, table_name: &str) -> Self {
        Self {
            pool: Arc::new(pool),
            queries: Queries::for_table(table_name),
        }
    }
}

#[async_trait]
impl CacheStore for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(&self.queries.create_table)
            .execute(self.pool.as_ref())
            .await?;

        // Fails if a legacy table already holds duplicate rows for an ip.
        sqlx::query(&self.queries.create_index)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn lookup(&self, ip: &str) -> StorageResult<Option<CacheRecord>> {
        let record = sqlx::query_as::<_, CacheRecord>(&self.queries.select)
            .bind(ip)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(record)
    }

    async fn insert(&self, ip: &str, country: &str) -> StorageResult<()> {
        sqlx::query(&self.queries.upsert)
            .bind(ip)
            .bind(country)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}
