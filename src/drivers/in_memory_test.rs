use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::ConnectionParameters;
use crate::error::{PgConnectorError, Result};
use crate::traits::{Connector, DatabaseDriver};
use crate::types::{RawQueryResult, SqlValue};

/// A recorded query execution for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

type Handler = Box<dyn Fn(&str, &[SqlValue]) -> Option<Result<RawQueryResult>> + Send + Sync>;

/// An in-memory database driver for testing.
///
/// Allows configuring expected responses and verifying executed queries.
/// Each query is answered by the first handler that claims it, then by the
/// response queue, then by the default response.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use pgconnector::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
/// use pgconnector::traits::DatabaseDriver;
///
/// let driver = Arc::new(
///     InMemoryTestDriver::new()
///         .with_rule(
///             "pg_namespace",
///             InMemoryTestResponseBuilder::new()
///                 .columns(&["nspname"])
///                 .row(&["public"])
///                 .build(),
///         )
///         .with_failure("DROP", "permission denied"),
/// );
/// ```
pub struct InMemoryTestDriver {
    handlers: Vec<Handler>,
    responses: Mutex<VecDeque<RawQueryResult>>,
    recorded_queries: Mutex<Vec<RecordedQuery>>,
    default_response: RawQueryResult,
    native_escaping: bool,
}

impl InMemoryTestDriver {
    /// Create a new in-memory test driver with no pre-configured responses.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            responses: Mutex::new(VecDeque::new()),
            recorded_queries: Mutex::new(Vec::new()),
            default_response: RawQueryResult::empty(),
            native_escaping: false,
        }
    }

    /// Add a response to be returned by the next unclaimed query.
    /// Responses are returned in FIFO order.
    pub fn with_response(self, response: RawQueryResult) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Add multiple responses to be returned by subsequent queries.
    pub fn with_responses(self, responses: impl IntoIterator<Item = RawQueryResult>) -> Self {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(response);
        }
        drop(queue);
        self
    }

    /// Set a default response to use when no queued responses remain.
    pub fn with_default_response(mut self, response: RawQueryResult) -> Self {
        self.default_response = response;
        self
    }

    /// Answer every query whose SQL contains `pattern` with `response`.
    pub fn with_rule(self, pattern: &str, response: RawQueryResult) -> Self {
        let pattern = pattern.to_string();
        self.with_handler(move |sql, _| sql.contains(&pattern).then(|| Ok(response.clone())))
    }

    /// Fail every query whose SQL contains `pattern` with a backend error.
    pub fn with_failure(self, pattern: &str, message: &str) -> Self {
        let pattern = pattern.to_string();
        let message = message.to_string();
        self.with_handler(move |sql, _| {
            sql.contains(&pattern)
                .then(|| Err(PgConnectorError::query(sql, message.clone())))
        })
    }

    /// Add a custom handler. Returning `None` passes the query on.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &[SqlValue]) -> Option<Result<RawQueryResult>> + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Report libpq-compatible escaping as available.
    pub fn with_native_escaping(mut self, available: bool) -> Self {
        self.native_escaping = available;
        self
    }

    /// Get all recorded queries that have been executed.
    pub fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.recorded_queries.lock().unwrap().clone()
    }

    /// Get the SQL of every recorded query, in order.
    pub fn recorded_sql(&self) -> Vec<String> {
        self.recorded_queries
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.sql.clone())
            .collect()
    }

    /// Get the last recorded query, if any.
    pub fn last_query(&self) -> Option<RecordedQuery> {
        self.recorded_queries.lock().unwrap().last().cloned()
    }

    /// Clear all recorded queries.
    pub fn clear_recorded_queries(&self) {
        self.recorded_queries.lock().unwrap().clear();
    }

    /// Assert that the last query matches the expected SQL and parameters.
    pub fn assert_last_query(&self, expected_sql: &str, expected_params: &[SqlValue]) {
        let last = self.last_query().expect("No queries were recorded");
        assert_eq!(
            last.sql, expected_sql,
            "SQL mismatch.\nExpected: {}\nActual: {}",
            expected_sql, last.sql
        );
        assert_eq!(
            last.params, expected_params,
            "Parameters mismatch.\nExpected: {:?}\nActual: {:?}",
            expected_params, last.params
        );
    }

    /// Assert that exactly n queries were executed.
    pub fn assert_query_count(&self, expected: usize) {
        let actual = self.recorded_queries.lock().unwrap().len();
        assert_eq!(
            actual, expected,
            "Query count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }
}

impl Default for InMemoryTestDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for InMemoryTestDriver {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<RawQueryResult> {
        // Record the query
        self.recorded_queries.lock().unwrap().push(RecordedQuery {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if let Some(answer) = self.handlers.iter().find_map(|h| h(sql, params)) {
            return answer;
        }

        // Return next queued response or default
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone());

        Ok(response)
    }

    fn supports_native_escaping(&self) -> bool {
        self.native_escaping
    }
}

/// A connector that hands out one shared in-memory driver and counts opens.
pub struct InMemoryTestConnector {
    driver: Arc<InMemoryTestDriver>,
    opened: Mutex<Vec<ConnectionParameters>>,
    open_count: AtomicUsize,
    refuse: Option<String>,
}

impl InMemoryTestConnector {
    pub fn new(driver: Arc<InMemoryTestDriver>) -> Self {
        Self {
            driver,
            opened: Mutex::new(Vec::new()),
            open_count: AtomicUsize::new(0),
            refuse: None,
        }
    }

    /// Make every open fail as if the server were unreachable.
    pub fn refusing(mut self, message: &str) -> Self {
        self.refuse = Some(message.to_string());
        self
    }

    /// The shared driver every open returns.
    pub fn driver(&self) -> Arc<InMemoryTestDriver> {
        Arc::clone(&self.driver)
    }

    /// Number of physical connections opened so far.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Database names of each open, in order. `None` means the default.
    pub fn opened_databases(&self) -> Vec<Option<String>> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.database.clone())
            .collect()
    }
}

#[async_trait]
impl Connector for InMemoryTestConnector {
    async fn open(&self, params: &ConnectionParameters) -> Result<Arc<dyn DatabaseDriver>> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.opened.lock().unwrap().push(params.clone());
        if let Some(ref message) = self.refuse {
            return Err(PgConnectorError::Connection(message.clone()));
        }
        Ok(Arc::clone(&self.driver) as Arc<dyn DatabaseDriver>)
    }
}

/// Builder for creating test responses easily.
pub struct InMemoryTestResponseBuilder {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    rows_affected: Option<u64>,
}

impl InMemoryTestResponseBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: None,
        }
    }

    /// Set the column names for the response.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a row of string values.
    pub fn row(mut self, values: &[&str]) -> Self {
        self.rows
            .push(values.iter().map(|s| Some(s.to_string())).collect());
        self
    }

    /// Add a row that may contain NULLs.
    pub fn nullable_row(mut self, values: &[Option<&str>]) -> Self {
        self.rows
            .push(values.iter().map(|v| v.map(str::to_string)).collect());
        self
    }

    /// Override the affected-row count (defaults to the number of rows).
    pub fn rows_affected(mut self, count: u64) -> Self {
        self.rows_affected = Some(count);
        self
    }

    /// Build the RawQueryResult.
    pub fn build(self) -> RawQueryResult {
        let mut result = RawQueryResult::new(self.columns, self.rows);
        if let Some(count) = self.rows_affected {
            result.rows_affected = count;
        }
        result
    }
}

impl Default for InMemoryTestResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
