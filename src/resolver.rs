//! Cache-aside country resolution
//!
//! `validate -> cache lookup -> (miss) geolocation lookup -> cache write`.
//! Only a bad address or a failed geolocation lookup reach the caller; store
//! failures are logged and counted, then absorbed.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::geo::{GeoLookup, LookupError};
use crate::metrics::{ErrorKind, MetricsRecorder};
use crate::models::ClientIp;
use crate::storage::CacheStore;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("bad ip address")]
    BadAddress,
    #[error("internal error")]
    Lookup(#[source] LookupError),
}

pub struct CountryResolver {
    store: Arc<dyn CacheStore>,
    geo: Arc<dyn GeoLookup>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl CountryResolver {
    pub fn new(
        store: Arc<dyn CacheStore>,
        geo: Arc<dyn GeoLookup>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            store,
            geo,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsRecorder> {
        &self.metrics
    }

    /// Resolve the country for a raw, untrusted address taken from the request.
    ///
    /// `route` labels the error counters.
    pub async fn resolve(&self, route: &str, candidate: Option<&str>) -> Result<String, ResolveError> {
        let Some(ip) = candidate.and_then(ClientIp::parse) else {
            warn!(candidate = ?candidate, "Bad IP address given, returning error");
            self.metrics.inc_error(route, ErrorKind::BadIp);
            return Err(ResolveError::BadAddress);
        };

        match self.store.lookup(ip.as_str()).await {
            Ok(Some(record)) => {
                info!(ip = %ip, id = record.id, "IP found in cache");
                return Ok(record.country);
            }
            Ok(None) => debug!(ip = %ip, "IP not in cache"),
            Err(err) => {
                // Unknown is treated like absent; the external lookup still answers.
                warn!(ip = %ip, error = %err, "Cache lookup failed, falling back to geolocation service");
                self.metrics.inc_error(route, ErrorKind::DbRead);
            }
        }

        info!(ip = %ip, provider = self.geo.name(), "Fetching country from geolocation service");
        let country = match self.geo.resolve(ip.as_str()).await {
            Ok(country) => country,
            Err(err) => {
                error!(ip = %ip, error = %err, "Cannot get the country from geolocation service");
                self.metrics.inc_error(route, ErrorKind::WebFetch);
                return Err(ResolveError::Lookup(err));
            }
        };

        if let Err(err) = self.store.insert(ip.as_str(), &country).await {
            error!(ip = %ip, error = %err, "Cannot write the country to cache");
            self.metrics.inc_error(route, ErrorKind::DbWrite);
        }

        Ok(country)
    }
}
