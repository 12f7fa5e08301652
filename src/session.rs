use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ConnectionParameters, MASTER_DATABASE};
use crate::error::{PgConnectorError, Result};
use crate::sql::{self, EscapeStrategy};
use crate::traits::{Connector, DatabaseDriver};
use crate::types::{QueryParam, QueryResult};

/// What to do when the backend rejects a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnFailure {
    /// Return the failure as `PgConnectorError::Query`.
    #[default]
    Raise,
    /// Log it, remember the error text, and return no result.
    Suppress,
}

/// One physical connection and the logical database selected on it.
///
/// The connector knows nothing about schemas; masking several databases as
/// schemas is handled by [`crate::PostgresDatabase`].
///
/// A session is single-writer: every call that talks to the backend takes
/// `&mut self`. Callers needing parallelism open one session per worker.
pub struct Session {
    driver: Option<Arc<dyn DatabaseDriver>>,
    escape: EscapeStrategy,
    database_name: Option<String>,
    /// Rows affected by the most recent statement. Session-scoped and only
    /// written by `prepared_query`.
    last_affected: Option<u64>,
    last_error: Option<String>,
}

impl Session {
    /// Open a physical connection through `connector`.
    ///
    /// The selected database is `params.database`, or the master database
    /// when none is given.
    pub async fn connect(connector: &dyn Connector, params: &ConnectionParameters) -> Result<Self> {
        if params.port == 0 {
            return Err(PgConnectorError::InvalidArgument(
                "port must be a positive integer".to_string(),
            ));
        }
        let driver = connector.open(params).await?;
        let database = params.database_name().unwrap_or(MASTER_DATABASE);
        Ok(Self::with_driver(driver, database))
    }

    /// Wrap an already-open driver.
    /// Useful for testing or using alternative database drivers.
    pub fn with_driver(driver: Arc<dyn DatabaseDriver>, database: impl Into<String>) -> Self {
        let escape = EscapeStrategy::for_capability(driver.supports_native_escaping());
        Self {
            driver: Some(driver),
            escape,
            database_name: Some(database.into()),
            last_affected: None,
            last_error: None,
        }
    }

    fn driver(&self) -> Result<Arc<dyn DatabaseDriver>> {
        self.driver
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| PgConnectorError::Connection("session is disconnected".to_string()))
    }

    /// Run a statement, translating `?` markers when parameters are given.
    /// Any backend failure is returned as `PgConnectorError::Query`.
    pub async fn prepared_query(&mut self, sql: &str, params: Vec<QueryParam>) -> Result<QueryResult> {
        let driver = self.driver()?;
        let (sql, values) = if params.is_empty() {
            (sql.to_string(), Vec::new())
        } else {
            sql::translate(sql, params)
        };

        debug!(sql = %sql, params = values.len(), "Executing query");
        match driver.execute(&sql, &values).await {
            Ok(raw) => {
                self.last_affected = Some(raw.rows_affected);
                Ok(QueryResult::from_raw(raw))
            }
            Err(e) => {
                let message = match e {
                    PgConnectorError::Query { message, .. } => message,
                    other => other.to_string(),
                };
                self.last_error = Some(message.clone());
                Err(PgConnectorError::query(sql, message))
            }
        }
    }

    /// Run a statement with caller-chosen failure handling.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: Vec<QueryParam>,
        on_failure: OnFailure,
    ) -> Result<Option<QueryResult>> {
        match self.prepared_query(sql, params).await {
            Ok(result) => Ok(Some(result)),
            Err(PgConnectorError::Query { sql, message }) if on_failure == OnFailure::Suppress => {
                warn!(sql = %sql, error = %message, "Query failed, error suppressed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Run a statement without parameters.
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.prepared_query(sql, Vec::new()).await
    }

    /// Rows affected by the most recently executed statement, or `None`
    /// before the first one.
    pub fn affected_rows(&self) -> Option<u64> {
        self.last_affected
    }

    /// The backend error text of the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn selected_database(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    /// True iff a database is selected and the connection is open.
    pub fn is_active(&self) -> bool {
        self.database_name.is_some() && self.driver.is_some()
    }

    /// A session can't change databases; only re-selecting the current one
    /// succeeds.
    pub fn select_database(&self, name: &str) -> Result<bool> {
        if self.database_name.as_deref() != Some(name) {
            return Err(PgConnectorError::UnsupportedOperation(format!(
                "can't change to database '{}' on an open connection; create a new connection instead",
                name
            )));
        }
        Ok(true)
    }

    pub fn unload_database(&mut self) {
        self.database_name = None;
    }

    /// Drop the physical connection.
    pub fn disconnect(&mut self) {
        self.driver = None;
        self.database_name = None;
    }

    /// The server's version string, if the backend reports one.
    pub async fn server_version(&mut self) -> Result<Option<String>> {
        let result = self
            .execute("SHOW server_version", Vec::new(), OnFailure::Suppress)
            .await?;
        Ok(result.and_then(|r| r.value().map(str::to_string)))
    }

    /// Last value handed out by the `"<table>_ID_seq"` sequence.
    pub async fn generated_id(&mut self, table: &str) -> Result<Option<i64>> {
        let sequence = self.quote_identifier(&format!("{}_ID_seq", table), "");
        let result = self
            .query(&format!("SELECT last_value FROM {}", sequence))
            .await?;
        Ok(result.value().and_then(|v| v.parse().ok()))
    }

    pub fn escape_strategy(&self) -> EscapeStrategy {
        self.escape
    }

    pub fn quote_literal(&self, value: &str) -> String {
        self.escape.quote_literal(value)
    }

    pub fn quote_identifier(&self, value: &str, separator: &str) -> String {
        self.escape.quote_identifier(value, separator)
    }

    pub fn escape_string(&self, value: &str) -> String {
        sql::escape_string(value)
    }
}
