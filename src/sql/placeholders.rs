use crate::sql::literal::toggles_literal;
use crate::types::{QueryParam, SqlValue};

/// The portable marker used by ORM-generated templates.
pub const POSITIONAL_MARKER: char = '?';

/// Rewrites `?` markers as PostgreSQL numbered placeholders.
///
/// "Title = ? AND Name = ?" becomes "Title = $1 AND Name = $2". Markers that
/// fall inside a single-quoted literal are left as `?` and are not counted,
/// so numbering only advances over markers that will be bound.
pub fn replace_placeholders(sql: &str) -> String {
    let mut segments = sql.split(POSITIONAL_MARKER).peekable();
    let mut joined = String::with_capacity(sql.len() + 8);
    let mut in_string = false;
    let mut next_index = 1usize;

    while let Some(segment) = segments.next() {
        joined.push_str(segment);

        // No marker after the last segment
        if segments.peek().is_none() {
            break;
        }

        if toggles_literal(segment) {
            in_string = !in_string;
        }

        if in_string {
            joined.push(POSITIONAL_MARKER);
        } else {
            joined.push('$');
            joined.push_str(&next_index.to_string());
            next_index += 1;
        }
    }
    joined
}

/// Prepares ORM parameters for binding: type hints are dropped, order kept.
pub fn prepare_parameters(params: impl IntoIterator<Item = QueryParam>) -> Vec<SqlValue> {
    params.into_iter().map(QueryParam::into_value).collect()
}

/// Translates a `?` template and its parameters into backend form.
///
/// A template with no markers comes back unchanged with no parameters. The
/// number of numbered markers is expected to match the parameter count; a
/// mismatch is the caller's error and is not checked here.
pub fn translate(sql: &str, params: Vec<QueryParam>) -> (String, Vec<SqlValue>) {
    if !sql.contains(POSITIONAL_MARKER) {
        return (sql.to_string(), Vec::new());
    }
    (replace_placeholders(sql), prepare_parameters(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_markers_in_order() {
        let (sql, params) = translate(
            "Title = ? AND Name = ?",
            vec![QueryParam::from("a"), QueryParam::from(2)],
        );
        assert_eq!(sql, "Title = $1 AND Name = $2");
        assert_eq!(
            params,
            vec![SqlValue::Text("a".to_string()), SqlValue::Int32(2)]
        );
    }

    #[test]
    fn test_marker_inside_literal_is_untouched() {
        let (sql, params) = translate(
            "Title = 'value with ? inside' AND Name = ?",
            vec![QueryParam::from("x")],
        );
        assert_eq!(sql, "Title = 'value with ? inside' AND Name = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_multiple_markers_inside_one_literal() {
        let sql = replace_placeholders("a = ? AND b = '?x?' AND c = ?");
        assert_eq!(sql, "a = $1 AND b = '?x?' AND c = $2");
    }

    #[test]
    fn test_escaped_quote_keeps_literal_open() {
        let sql = replace_placeholders("a = 'it\\'s ?' AND b = ?");
        assert_eq!(sql, "a = 'it\\'s ?' AND b = $1");
    }

    #[test]
    fn test_marker_at_both_ends() {
        assert_eq!(replace_placeholders("?"), "$1");
        assert_eq!(replace_placeholders("? = ?"), "$1 = $2");
        assert_eq!(replace_placeholders("??"), "$1$2");
    }

    #[test]
    fn test_no_markers_returns_input_and_no_params() {
        let (sql, params) = translate("SELECT 1", vec![]);
        assert_eq!(sql, "SELECT 1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_type_hints_are_dropped() {
        let params = prepare_parameters(vec![
            QueryParam::typed("2024-01-01", "Date"),
            QueryParam::from(true),
        ]);
        assert_eq!(
            params,
            vec![
                SqlValue::Text("2024-01-01".to_string()),
                SqlValue::Bool(true)
            ]
        );
    }
}
