//! Statement classification for read/write routing.

/// Leading keywords of statements a read replica may serve.
const READ_KEYWORDS: [&str; 2] = ["SELECT", "WITH"];

/// Whether `sql` may run on a reader.
///
/// Only the leading keyword is inspected, ignoring leading whitespace and
/// case. Anything that is not a `SELECT` or `WITH` is treated as a write.
pub fn is_read_statement(sql: &str) -> bool {
    let sql = sql.trim_start();
    let keyword_len = sql
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(sql.len());
    let keyword = &sql[..keyword_len];
    READ_KEYWORDS
        .iter()
        .any(|read| keyword.eq_ignore_ascii_case(read))
}
