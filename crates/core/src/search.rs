//! Free-text search helpers.

/// A `LIKE`/`ILIKE` pattern matching `query` anywhere in a column.
///
/// `%`, `_` and `\` in the query are escaped so they match literally.
#[must_use]
pub fn contains_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
