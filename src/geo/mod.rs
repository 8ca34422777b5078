//! Country lookups against a remote geolocation service.

pub mod ip_api;

use async_trait::async_trait;
use thiserror::Error;

pub use ip_api::IpApiClient;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("geolocation request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("geolocation service responded with status {0}")]
    Status(u16),
    #[error("failed to read geolocation response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("malformed geolocation response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("geolocation response has no country field")]
    MissingCountry,
    #[error("geolocation service rejected the address: {0}")]
    Rejected(String),
}

/// Resolves an IP address to a country name.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// One attempt, no retry. `ip` is already validated.
    async fn resolve(&self, ip: &str) -> Result<String, LookupError>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}
