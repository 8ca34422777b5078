use crate::models::CacheRecord;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent IP to country table backing the cache-aside lookup.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the cache table and its unique index on `ip` if they are missing
    async fn init(&self) -> Result<()>;

    /// Point lookup by IP. `Ok(None)` is an ordinary cache miss.
    async fn lookup(&self, ip: &str) -> StorageResult<Option<CacheRecord>>;

    /// Store the country for an IP, replacing any previous value
    async fn insert(&self, ip: &str, country: &str) -> StorageResult<()>;
}
