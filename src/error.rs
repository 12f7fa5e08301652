use thiserror::Error;

/// Error type for pgconnector operations
#[derive(Debug, Error)]
pub enum PgConnectorError {
    #[error("Couldn't connect to PostgreSQL database: {0}")]
    Connection(String),

    #[error("Couldn't run query: {sql} | {message}")]
    Query { sql: String, message: String },

    #[error("{message} (name: {name})")]
    Configuration { name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Expected {expected} row(s), got {actual}")]
    UnexpectedRowCount { expected: usize, actual: usize },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl PgConnectorError {
    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            sql: sql.into(),
            message: message.into(),
        }
    }

    pub fn configuration(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for pgconnector operations
pub type Result<T> = std::result::Result<T, PgConnectorError>;
