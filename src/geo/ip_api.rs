use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{GeoLookup, LookupError};
use crate::config::GeoApiConfig;

/// Response shape of `GET /json/{ip}` on ip-api.com.
///
/// Failures come back as HTTP 200 with `status: "fail"`, a `message` and no `country`.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    query: String,
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for ip-api.com compatible services.
#[derive(Clone)]
pub struct IpApiClient {
    base_url: String,
    client: Client,
}

impl IpApiClient {
    pub fn new(config: &GeoApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ipcountry/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client for geolocation lookups")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, ip: &str) -> String {
        format!("{}/json/{}", self.base_url, ip)
    }
}

#[async_trait]
impl GeoLookup for IpApiClient {
    async fn resolve(&self, ip: &str) -> Result<String, LookupError> {
        let url = self.url_for(ip);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "geolocation request failed");
            LookupError::Transport(e)
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(url = %url, status = status.as_u16(), "geolocation service returned unexpected status");
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(LookupError::Body)?;
        let data: IpApiResponse = serde_json::from_slice(&body)?;

        if data.status.eq_ignore_ascii_case("fail") {
            return Err(LookupError::Rejected(
                data.message.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        let country = data.country.ok_or(LookupError::MissingCountry)?;
        debug!(query = %data.query, country = %country, "geolocation lookup succeeded");

        Ok(country)
    }

    fn name(&self) -> &'static str {
        "ip-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout: Duration) -> IpApiClient {
        IpApiClient::new(&GeoApiConfig {
            base_url: server.uri(),
            timeout,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/8.8.8.8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "8.8.8.8",
                "status": "success",
                "country": "United States",
                "countryCode": "US",
                "city": "Ashburn"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, Duration::from_secs(5));
        let country = client.resolve("8.8.8.8").await.unwrap();
        assert_eq!(country, "United States");
    }

    #[tokio::test]
    async fn test_resolve_ipv6_path() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/2001:4860:4860::8888"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "2001:4860:4860::8888",
                "status": "success",
                "country": "United States"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, Duration::from_secs(5));
        let country = client.resolve("2001:4860:4860::8888").await.unwrap();
        assert_eq!(country, "United States");
    }

    #[tokio::test]
    async fn test_resolve_non_ok_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/1.1.1.1"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, Duration::from_secs(5));
        let err = client.resolve("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, LookupError::Status(429)));
    }

    #[tokio::test]
    async fn test_resolve_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/1.1.1.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, Duration::from_secs(5));
        let err = client.resolve("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, LookupError::Decode(_)));
    }

    #[tokio::test]
    async fn test_resolve_fail_status_in_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "10.0.0.1",
                "status": "fail",
                "message": "private range"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, Duration::from_secs(5));
        let err = client.resolve("10.0.0.1").await.unwrap_err();
        assert!(matches!(err, LookupError::Rejected(ref m) if m == "private range"));
    }

    #[tokio::test]
    async fn test_resolve_missing_country() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/1.1.1.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "1.1.1.1",
                "status": "success"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, Duration::from_secs(5));
        let err = client.resolve("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, LookupError::MissingCountry));
    }

    #[tokio::test]
    async fn test_resolve_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/1.1.1.1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "query": "1.1.1.1",
                        "status": "success",
                        "country": "Australia"
                    }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, Duration::from_millis(50));
        let err = client.resolve("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport(_)));
    }

    #[tokio::test]
    async fn test_resolve_connection_refused() {
        // Nothing listens on port 9 on loopback in CI.
        let client = IpApiClient::new(&GeoApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = client.resolve("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport(_)));
    }
}
