use crate::error::{PgConnectorError, Result};

/// Driver-agnostic raw result from a database query.
/// All values are converted to text by the driver; `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryResult {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of values in column order
    pub rows: Vec<Vec<Option<String>>>,
    /// Rows inserted, updated or deleted (or returned, for SELECT)
    pub rows_affected: u64,
}

impl RawQueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            columns,
            rows,
            rows_affected,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A row-less result for a statement that touched `count` rows.
    pub fn affected(count: u64) -> Self {
        Self {
            rows_affected: count,
            ..Self::default()
        }
    }
}

/// A single row result from a query.
/// Values are stored as text in column order; a result may repeat a column
/// name, so lookups by name return the first match.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Creates a new Row from column names and values.
    pub(crate) fn new(columns: &[String], values: Vec<Option<String>>) -> Self {
        Self {
            columns: columns.to_vec(),
            values,
        }
    }

    /// Gets a value by column name. NULL is returned as `None`.
    pub fn get(&self, column: &str) -> Result<Option<&str>> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .map(|v| v.as_deref())
            .ok_or_else(|| PgConnectorError::ColumnNotFound(column.to_string()))
    }

    /// Gets a value by position. `None` past the end or for NULL.
    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Value of the first column, if any.
    pub fn first_value(&self) -> Option<&str> {
        self.get_index(0)
    }

    /// Returns all column names in this row, in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of a query execution, containing zero or more rows.
///
/// Unlike a bare row set, it also remembers how many rows the statement
/// affected, so callers can read that without going back to the session.
#[derive(Debug)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Row>,
    rows_affected: u64,
}

impl QueryResult {
    /// Creates a QueryResult from a RawQueryResult.
    pub fn from_raw(raw: RawQueryResult) -> Self {
        let rows = raw
            .rows
            .into_iter()
            .map(|values| Row::new(&raw.columns, values))
            .collect();
        Self {
            columns: raw.columns,
            rows,
            rows_affected: raw.rows_affected,
        }
    }

    /// Extracts a single row from the result.
    /// Returns an error if the result contains zero or more than one row.
    pub fn single_row(self) -> Result<Row> {
        let actual = self.rows.len();
        match <[Row; 1]>::try_from(self.rows) {
            Ok([row]) => Ok(row),
            Err(_) => Err(PgConnectorError::UnexpectedRowCount {
                expected: 1,
                actual,
            }),
        }
    }

    /// The first row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// The first column of the first row. `None` for no rows or NULL.
    pub fn value(&self) -> Option<&str> {
        self.first().and_then(Row::first_value)
    }

    /// Returns all rows from the result.
    pub fn rows(self) -> Vec<Row> {
        self.rows
    }

    /// Returns a reference to the rows without consuming the result.
    pub fn rows_ref(&self) -> &[Row] {
        &self.rows
    }

    /// Iterates over the rows without consuming the result.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Returns the column names from this result.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of rows in this result.
    pub fn num_records(&self) -> usize {
        self.rows.len()
    }

    /// Rows affected by the statement that produced this result.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Returns true if this result contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
