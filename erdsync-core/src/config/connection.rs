//! Database connection settings.

use crate::error::ErdSyncError;
use crate::security::Credentials;
use std::time::Duration;

/// Default MySQL/MariaDB port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Maximum identifier length accepted by MySQL for schema names.
const MAX_SCHEMA_NAME_LEN: usize = 64;

/// Where and how to connect for comment metadata.
///
/// # Example
/// ```rust
/// use erdsync_core::config::ConnectionSettings;
/// use erdsync_core::security::Credentials;
///
/// let settings = ConnectionSettings::new("localhost".to_string(), "shop".to_string())
///     .with_port(3307)
///     .with_credentials(Credentials::new("erd".to_string(), Some("pw".to_string())));
///
/// assert!(settings.validate().is_ok());
/// assert_eq!(settings.to_string(), "mysql://localhost:3307/shop");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Database host address
    pub host: String,
    /// Database port
    pub port: u16,
    /// Schema whose comments are synchronized
    pub schema: String,
    /// Username and password (zeroed on drop, never displayed)
    pub credentials: Credentials,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Per-query timeout duration
    pub query_timeout: Duration,
    /// Whether to put the session in read-only mode
    pub read_only: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MYSQL_PORT,
            schema: String::new(),
            credentials: Credentials::default(),
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
            read_only: true,
        }
    }
}

impl std::fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials are deliberately left out
        write!(f, "mysql://{}:{}/{}", self.host, self.port, self.schema)
    }
}

impl ConnectionSettings {
    /// Creates settings for `schema` on `host` with safe defaults.
    pub fn new(host: String, schema: String) -> Self {
        Self {
            host,
            schema,
            ..Default::default()
        }
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Builder method to set both timeouts.
    pub fn with_timeouts(mut self, connect: Duration, query: Duration) -> Self {
        self.connect_timeout = connect;
        self.query_timeout = query;
        self
    }

    /// Validates connection parameters before any connection is attempted.
    ///
    /// # Errors
    /// Returns a configuration error for an empty host, a zero port, zero
    /// timeouts, or a schema name MySQL would not accept.
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err(ErdSyncError::configuration("host cannot be empty"));
        }

        if self.port == 0 {
            return Err(ErdSyncError::configuration("port must be greater than 0"));
        }

        validate_schema_name(&self.schema)?;

        if self.connect_timeout.is_zero() {
            return Err(ErdSyncError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(ErdSyncError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn validate_schema_name(schema: &str) -> crate::Result<()> {
    if schema.is_empty() {
        return Err(ErdSyncError::configuration("schema name cannot be empty"));
    }

    if schema.chars().count() > MAX_SCHEMA_NAME_LEN {
        return Err(ErdSyncError::configuration(format!(
            "schema name too long: maximum {} characters",
            MAX_SCHEMA_NAME_LEN
        )));
    }

    if schema.ends_with(' ') || schema.chars().any(|c| c.is_control()) {
        return Err(ErdSyncError::configuration(
            "schema name contains invalid characters",
        ));
    }

    Ok(())
}
