use axum::http::HeaderName;
use config::Environment;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Longest identifier PostgreSQL accepts without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("unknown DATABASE_BACKEND '{0}', supported values: postgres, sqlite")]
    UnknownBackend(String),
    #[error("DATABASE_URL must be set when DATABASE_BACKEND=sqlite")]
    MissingDatabaseUrl,
    #[error("DB_TABLE_NAME '{0}' is not a plain SQL identifier")]
    InvalidTableName(String),
    #[error("DB_MAX_OPEN_CONNS must be at least 1")]
    NoConnections,
    #[error("DB_MAX_IDLE_CONNS ({idle}) exceeds DB_MAX_OPEN_CONNS ({open})")]
    IdleExceedsOpen { idle: u32, open: u32 },
    #[error("CLIENT_IP_HEADER '{0}' is not a valid header name")]
    InvalidHeader(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub geo_api: GeoApiConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// Full connection URL. Takes precedence over the individual parts below.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub table_name: String,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_open_conns: u32,
    /// sqlx has no cap on idle connections; idle ones are reaped by `max_idle_time` instead.
    pub max_idle_conns: u32,
    pub max_lifetime: Duration,
    pub max_idle_time: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Lowercase name of the header the upstream proxy sets to the client address.
    pub client_ip_header: String,
}

#[derive(Debug, Clone)]
pub struct GeoApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// Flat view of the environment, one field per variable.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    database_backend: String,
    #[serde(default)]
    database_url: Option<String>,
    db_host: String,
    db_port: u16,
    db_user: String,
    db_password: String,
    db_name: String,
    db_table_name: String,
    db_max_open_conns: u32,
    db_max_idle_conns: u32,
    db_max_lifetime_secs: u64,
    db_max_idletime_secs: u64,
    server_host: String,
    server_port: u16,
    client_ip_header: String,
    geo_api_base_url: String,
    geo_api_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_environment(Environment::default())
    }

    /// Builds the configuration from an explicit environment source, falling back to defaults
    /// for every variable it does not set.
    pub fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .set_default("database_backend", "postgres")?
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "postgres")?
            .set_default("db_password", "postgres")?
            .set_default("db_name", "db")?
            .set_default("db_table_name", "ip_cache")?
            .set_default("db_max_open_conns", 1024)?
            .set_default("db_max_idle_conns", 512)?
            .set_default("db_max_lifetime_secs", 20)?
            .set_default("db_max_idletime_secs", 10)?
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 3333)?
            .set_default("client_ip_header", "x-real-ip")?
            .set_default("geo_api_base_url", "http://ip-api.com")?
            .set_default("geo_api_timeout_secs", 10)?
            .add_source(environment)
            .build()?;

        settings.try_deserialize::<EnvSettings>()?.validate()
    }
}

impl EnvSettings {
    fn validate(self) -> Result<Config, ConfigError> {
        let backend = match self.database_backend.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let url = self.database_url.filter(|url| !url.trim().is_empty());
        if backend == DatabaseBackend::Sqlite && url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if !is_plain_identifier(&self.db_table_name) {
            return Err(ConfigError::InvalidTableName(self.db_table_name));
        }

        if self.db_max_open_conns == 0 {
            return Err(ConfigError::NoConnections);
        }
        if self.db_max_idle_conns > self.db_max_open_conns {
            return Err(ConfigError::IdleExceedsOpen {
                idle: self.db_max_idle_conns,
                open: self.db_max_open_conns,
            });
        }

        let client_ip_header = self.client_ip_header.trim().to_lowercase();
        if HeaderName::from_bytes(client_ip_header.as_bytes()).is_err() {
            return Err(ConfigError::InvalidHeader(self.client_ip_header));
        }

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url,
                host: self.db_host,
                port: self.db_port,
                user: self.db_user,
                password: self.db_password,
                name: self.db_name,
                table_name: self.db_table_name,
                pool: PoolConfig {
                    max_open_conns: self.db_max_open_conns,
                    max_idle_conns: self.db_max_idle_conns,
                    max_lifetime: Duration::from_secs(self.db_max_lifetime_secs),
                    max_idle_time: Duration::from_secs(self.db_max_idletime_secs),
                },
            },
            server: ServerConfig {
                host: self.server_host,
                port: self.server_port,
                client_ip_header,
            },
            geo_api: GeoApiConfig {
                base_url: self.geo_api_base_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(self.geo_api_timeout_secs),
            },
        })
    }
}

/// Table names are spliced into SQL text, so only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let source: Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_environment(Environment::default().source(Some(source)))
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
        assert_eq!(config.database.url, None);
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.user, "postgres");
        assert_eq!(config.database.name, "db");
        assert_eq!(config.database.table_name, "ip_cache");
        assert_eq!(config.database.pool.max_open_conns, 1024);
        assert_eq!(config.database.pool.max_idle_conns, 512);
        assert_eq!(config.database.pool.max_lifetime, Duration::from_secs(20));
        assert_eq!(config.database.pool.max_idle_time, Duration::from_secs(10));
        assert_eq!(config.server.port, 3333);
        assert_eq!(config.server.client_ip_header, "x-real-ip");
        assert_eq!(config.geo_api.base_url, "http://ip-api.com");
        assert_eq!(config.geo_api.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let config = load(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_TABLE_NAME", "geo_cache"),
            ("SERVER_PORT", "8080"),
            ("CLIENT_IP_HEADER", "X-Forwarded-Client"),
            ("GEO_API_BASE_URL", "http://localhost:9000/"),
        ])
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.table_name, "geo_cache");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.client_ip_header, "x-forwarded-client");
        assert_eq!(config.geo_api.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_sqlite_requires_url() {
        let err = load(&[("DATABASE_BACKEND", "sqlite")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));

        let config = load(&[
            ("DATABASE_BACKEND", "sqlite"),
            ("DATABASE_URL", "sqlite::memory:"),
        ])
        .unwrap();
        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = load(&[("DATABASE_BACKEND", "mysql")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(ref b) if b == "mysql"));
    }

    #[test]
    fn test_table_name_must_be_identifier() {
        let err = load(&[("DB_TABLE_NAME", "ip_cache; DROP TABLE users")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTableName(_)));
    }

    #[test]
    fn test_pool_bounds_are_checked() {
        let err = load(&[("DB_MAX_OPEN_CONNS", "4"), ("DB_MAX_IDLE_CONNS", "8")]).unwrap_err();
        assert!(matches!(err, ConfigError::IdleExceedsOpen { idle: 8, open: 4 }));

        let err = load(&[("DB_MAX_OPEN_CONNS", "0"), ("DB_MAX_IDLE_CONNS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::NoConnections));
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        let err = load(&[("SERVER_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Source(_)));
    }

    #[test]
    fn test_is_plain_identifier() {
        assert!(is_plain_identifier("ip_cache"));
        assert!(is_plain_identifier("_cache2"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2cache"));
        assert!(!is_plain_identifier("ip-cache"));
        assert!(!is_plain_identifier("ip_cache\"--"));
        assert!(!is_plain_identifier(&"a".repeat(64)));
    }
}
