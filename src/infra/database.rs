//! For interacting with the database.

use super::config::DatabaseConfig;
use sqlx::{
    pool::PoolOptions,
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions, PgPool,
};
use tracing::log::LevelFilter;

/// A common database pool type.
pub type DbPool = PgPool;

/// Builds connection options from configuration.
///
/// Fails if the SSL mode is not one PostgreSQL understands.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, sqlx::Error> {
    let ssl_mode: PgSslMode = config.ssl_mode.parse()?;
    let db_options = PgConnectOptions::new()
        .username(&config.username)
        .password(&config.password)
        .host(&config.host)
        .port(config.port)
        .database(&config.database_name)
        .ssl_mode(ssl_mode)
        .options([("timezone", config.timezone.as_str())])
        .log_statements(LevelFilter::Debug);
    Ok(db_options)
}

/// Connects to the database based on some configuration.
///
/// Connections are opened lazily, so an unreachable database shows up as a
/// failed query rather than a startup error.
pub fn init_db(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let db_options = connect_options(config)?;
    let db: PgPool = PoolOptions::default()
        .acquire_timeout(config.acquire_timeout)
        .max_connections(config.max_connections)
        .connect_lazy_with(db_options);
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn database_config() -> DatabaseConfig {
        DatabaseConfig {
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            port: 5433,
            database_name: "sales".to_string(),
            host: "db.internal".to_string(),
            ssl_mode: "disable".to_string(),
            timezone: "utc".to_string(),
            max_connections: 4,
            acquire_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn options_follow_configuration() {
        let options = connect_options(&database_config()).unwrap();
        assert_eq!("db.internal", options.get_host());
        assert_eq!(5433, options.get_port());
        assert_eq!(Some("sales"), options.get_database());
        assert_eq!("postgres", options.get_username());
    }

    #[test]
    fn unknown_ssl_mode_is_rejected() {
        let config = DatabaseConfig {
            ssl_mode: "sometimes".to_string(),
            ..database_config()
        };
        assert!(connect_options(&config).is_err());
    }

    #[tokio::test]
    async fn pool_is_created_without_connecting() {
        let db = init_db(&database_config()).unwrap();
        assert_eq!(0, db.size());
        db.close().await;
    }
}
