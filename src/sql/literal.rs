/// Determines if a SQL fragment breaks into or out of a single-quoted string
/// literal, by counting quotes.
///
/// Escaped backslashes (`\\`) are removed first so that a trailing pair can't
/// be mistaken for the escape of a following quote. Every remaining `'`
/// counts as a boundary except those written as `\'`.
///
/// Doubled quotes (`''`) inside a literal are NOT treated specially: they add
/// two to the count and so leave the parity unchanged, which is correct for
/// whole literals but can misjudge a fragment split inside one. Callers rely
/// on this behaviour, so keep it unless every caller is updated.
///
/// See <https://www.postgresql.org/docs/current/sql-syntax-lexical.html#SQL-SYNTAX-STRINGS>
pub fn toggles_literal(fragment: &str) -> bool {
    let stripped = fragment.replace("\\\\", "");
    let total_quotes = stripped.matches('\'').count();
    let escaped_quotes = stripped.matches("\\'").count();
    (total_quotes - escaped_quotes) % 2 != 0
}
