use async_trait::async_trait;

use crate::error::Result;
use crate::types::{RawQueryResult, SqlValue};

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Holding one live session with the backend
/// - Converting SqlValue parameters to native types
/// - Executing queries and converting results to RawQueryResult
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Execute a SQL query with the given parameters.
    /// Parameters use PostgreSQL-style placeholders ($1, $2, etc.); with no
    /// parameters the SQL is sent as-is and may hold several statements.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<RawQueryResult>;

    /// Whether the driver ships libpq-compatible escaping.
    fn supports_native_escaping(&self) -> bool {
        false
    }
}
