//! For reading application configuration.

use humantime_serde::re::humantime::format_duration;
use serde::Deserialize;
use std::time::Duration;

/// How long the server waits for in-flight requests after a termination signal.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Server address.
    pub http_address: String,
    /// Server http port.
    pub http_port: u16,
    /// Upper bound for reading a request body.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Upper bound for producing a response.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// How long to drain in-flight requests before forcing connections closed.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// The `host:port` pair to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.http_address, self.http_port)
    }
}

/// Database configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    /// The database username.
    pub username: String,
    /// The database password.
    pub password: String,
    /// The database port.
    pub port: u16,
    /// The database name.
    pub database_name: String,
    /// The database host.
    pub host: String,
    /// One of `disable`, `allow`, `prefer`, `require`, `verify-ca`, `verify-full`.
    pub ssl_mode: String,
    /// Session time zone.
    pub timezone: String,
    /// Pool size.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

/// Retrieve [`Config`] from built-in defaults, an optional `config` file and `APP__*` variables.
#[tracing::instrument]
pub fn load_config() -> Result<Config, config::ConfigError> {
    load_config_from(config::File::with_name("config").required(false))
}

fn load_config_from<S>(file: S) -> Result<Config, config::ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    config::Config::builder()
        .set_default("server.http_address", "localhost")?
        .set_default("server.http_port", 8000)?
        .set_default("server.read_timeout", "5s")?
        .set_default("server.write_timeout", "5s")?
        .set_default(
            "server.shutdown_timeout",
            format_duration(DEFAULT_SHUTDOWN_TIMEOUT).to_string(),
        )?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "postgres")?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.database_name", "postgres")?
        .set_default("database.ssl_mode", "disable")?
        .set_default("database.timezone", "utc")?
        .set_default("database.max_connections", 100)?
        .set_default("database.acquire_timeout", "5s")?
        .add_source(file)
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn defaults_match_the_local_development_setup() {
        let config = load_config_from(config::File::from_str("", FileFormat::Toml)).unwrap();
        assert_eq!("localhost:8000", config.server.bind_address());
        assert_eq!(DEFAULT_SHUTDOWN_TIMEOUT, config.server.shutdown_timeout);
        assert_eq!(Duration::from_secs(5), config.server.read_timeout);
        assert_eq!("disable", config.database.ssl_mode);
        assert_eq!("utc", config.database.timezone);
    }

    #[test]
    fn file_overrides_defaults() {
        let file = config::File::from_str(
            r#"
            [server]
            http_port = 9000
            shutdown_timeout = "250ms"

            [database]
            host = "db.internal"
            ssl_mode = "require"
            "#,
            FileFormat::Toml,
        );
        let config = load_config_from(file).unwrap();
        assert_eq!(9000, config.server.http_port);
        assert_eq!(Duration::from_millis(250), config.server.shutdown_timeout);
        assert_eq!("db.internal", config.database.host);
        assert_eq!("require", config.database.ssl_mode);
        assert_eq!("postgres", config.database.database_name);
    }

    #[test]
    fn malformed_duration_is_rejected() {
        let file = config::File::from_str(
            r#"
            [server]
            write_timeout = "soon"
            "#,
            FileFormat::Toml,
        );
        assert!(load_config_from(file).is_err());
    }
}
