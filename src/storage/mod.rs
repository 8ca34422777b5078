pub mod postgres;
pub mod sqlite;
pub mod trait_def;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseBackend, DatabaseConfig};

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{CacheStore, StorageError, StorageResult};

/// Open the configured backend. Fails if the database is unreachable.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn CacheStore>> {
    let storage: Arc<dyn CacheStore> = match config.backend {
        DatabaseBackend::Sqlite => {
            info!(table = %config.table_name, "Using SQLite storage");
            Arc::new(SqliteStorage::connect(config).await?)
        }
        DatabaseBackend::Postgres => {
            info!(
                host = %config.host,
                port = config.port,
                database = %config.name,
                table = %config.table_name,
                "Using PostgreSQL storage"
            );
            Arc::new(PostgresStorage::connect(config).await?)
        }
    };
    Ok(storage)
}
