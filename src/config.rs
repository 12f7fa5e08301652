//! Connection parameters and the virtualization policy flags.
//!
//! Both are usually deserialized from a TOML file:
//!
//! ```toml
//! allow_query_master_postgres = false
//! model_schema_as_database = true
//!
//! [connection]
//! host = "db.internal"
//! database = "app"
//! username = "app"
//! password = "secret"
//! timezone = "UTC"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;
/// Schema used when none is configured.
pub const DEFAULT_SCHEMA: &str = "public";
/// Database that always exists and holds the cluster catalog.
pub const MASTER_DATABASE: &str = "postgres";

/// Parameters for one physical connection. Immutable once connected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectionParameters {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub schema: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timezone: Option<String>,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: DEFAULT_PORT,
            database: None,
            schema: String::from(DEFAULT_SCHEMA),
            username: None,
            password: None,
            timezone: None,
        }
    }
}

impl ConnectionParameters {
    /// Same parameters pointed at another database.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..self.clone()
        }
    }

    /// Database name, or `None` when unset or blank.
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_deref().filter(|d| !d.is_empty())
    }

    /// Display form without the password, for logs.
    pub fn display_string(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username.as_deref().unwrap_or(""),
            self.host,
            self.port,
            self.database_name().unwrap_or(MASTER_DATABASE)
        )
    }
}

/// How logical databases map onto the backend. Fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualizationPolicy {
    /// Real databases, created through the master catalog when missing.
    FullAccess,
    /// Logical databases are schemas inside one physical database.
    SchemaAsDatabase { query_master: bool },
    /// Database and schema must already exist; no switching.
    Fixed,
}

impl VirtualizationPolicy {
    pub fn from_flags(allow_query_master_postgres: bool, model_schema_as_database: bool) -> Self {
        match (allow_query_master_postgres, model_schema_as_database) {
            (query_master, true) => VirtualizationPolicy::SchemaAsDatabase { query_master },
            (true, false) => VirtualizationPolicy::FullAccess,
            (false, false) => VirtualizationPolicy::Fixed,
        }
    }

    /// Whether connect may use the master database to check and create the
    /// target database.
    pub fn queries_master(self) -> bool {
        match self {
            VirtualizationPolicy::FullAccess => true,
            VirtualizationPolicy::SchemaAsDatabase { query_master } => query_master,
            VirtualizationPolicy::Fixed => false,
        }
    }

    /// Whether a missing schema may be created at connect time.
    pub fn creates_schemas(self) -> bool {
        !matches!(self, VirtualizationPolicy::Fixed)
    }
}

/// Full configuration for a virtualized database.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub connection: ConnectionParameters,
    pub allow_query_master_postgres: bool,
    pub model_schema_as_database: bool,
}

impl DatabaseConfig {
    pub fn new(connection: ConnectionParameters) -> Self {
        Self {
            connection,
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn policy(&self) -> VirtualizationPolicy {
        VirtualizationPolicy::from_flags(
            self.allow_query_master_postgres,
            self.model_schema_as_database,
        )
    }
}
