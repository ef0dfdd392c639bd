//! PostgreSQL connection handling
//!
//! The pipeline opens short-lived single connections: one for the readiness
//! probe (against the maintenance database) and one for the export query
//! (against the freshly restored target). No pool is kept across stages.

use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, Result};
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection};

/// Connection options for `database` on the configured server
pub fn connect_options(config: &DatabaseConfig, database: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(database)
        .application_name("pricelist-sync")
}

/// Open a connection to the target database
pub async fn connect(config: &DatabaseConfig) -> Result<PgConnection> {
    PgConnection::connect_with(&connect_options(config, &config.name))
        .await
        .map_err(|e| {
            DatabaseError::ConnectionFailed(format!(
                "{} on {}:{}: {}",
                config.name, config.host, config.port, e
            ))
            .into()
        })
}

/// Probe the server through the maintenance database
///
/// Never fails: any connection error or timeout is reported as `false`.
pub async fn probe(config: &DatabaseConfig) -> bool {
    let options = connect_options(config, &config.maintenance_db);
    match tokio::time::timeout(config.connect_timeout, PgConnection::connect_with(&options)).await
    {
        Ok(Ok(conn)) => {
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "error closing probe connection");
            }
            tracing::info!(host = %config.host, port = config.port, "database connection successful");
            true
        }
        Ok(Err(e)) => {
            tracing::error!(host = %config.host, port = config.port, error = %e, "database connection failed");
            false
        }
        Err(_) => {
            tracing::error!(
                host = %config.host,
                port = config.port,
                timeout = ?config.connect_timeout,
                "database connection timed out"
            );
            false
        }
    }
}
