/// How a session escapes literals and identifiers.
///
/// Chosen once when the session is built, from the driver's capability, and
/// never re-probed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeStrategy {
    /// libpq-compatible escaping from `postgres-protocol`.
    Native,
    /// Hand-written fallback producing the same output for ASCII quotes and
    /// backslashes.
    Manual,
}

impl EscapeStrategy {
    pub fn for_capability(native_available: bool) -> Self {
        if native_available {
            EscapeStrategy::Native
        } else {
            EscapeStrategy::Manual
        }
    }

    /// Quotes `value` as a string literal, e.g. `'O''Brien'`.
    ///
    /// Values containing a backslash use the `E'...'` form with the backslash
    /// doubled, so the result is independent of `standard_conforming_strings`.
    pub fn quote_literal(self, value: &str) -> String {
        let quoted = match self {
            EscapeStrategy::Native => postgres_protocol::escape::escape_literal(value),
            EscapeStrategy::Manual => manual_quote_literal(value),
        };
        quoted.trim_start().to_string()
    }

    /// Quotes a single identifier, e.g. `"Site""Tree"`.
    pub fn quote_identifier_part(self, value: &str) -> String {
        match self {
            EscapeStrategy::Native => postgres_protocol::escape::escape_identifier(value),
            EscapeStrategy::Manual => format!("\"{}\"", value.replace('"', "\"\"")),
        }
    }

    /// Quotes an identifier, treating `separator` as a qualifier boundary.
    ///
    /// `"schema.table"` with separator `.` becomes `"schema"."table"`. An
    /// empty separator quotes the whole value as one identifier.
    pub fn quote_identifier(self, value: &str, separator: &str) -> String {
        if separator.is_empty() {
            return self.quote_identifier_part(value);
        }
        value
            .split(separator)
            .map(|part| self.quote_identifier_part(part))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

fn manual_quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 3);
    let has_backslash = value.contains('\\');
    if has_backslash {
        quoted.push('E');
    }
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push(c);
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// Escapes the body of a string literal without adding quotes.
pub fn escape_string(value: &str) -> String {
    value.replace('\'', "''")
}
