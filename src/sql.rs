//! Statement source collaborator (spec.md §1: "SQL parsing, dialect rewriting,
//! statement splitting" is out of scope — only the interface is specified).
//!
//! A minimal splitter is included so `RESTORE_DATA` and DDL jobs have real
//! statements to execute end-to-end in tests (`SPEC_FULL.md` §2 item 16). It
//! does not parse SQL; it only finds statement boundaries, respecting quoted
//! strings and comments well enough for dump-generated files.

/// Split a buffer of SQL text into individual statements on unquoted `;`.
/// Trailing/leading whitespace-only statements are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;
    let mut in_backtick = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(c) = chars.next() {
        if in_line_comment {
            current.push(c);
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if in_block_comment {
            current.push(c);
            if c == '*' && chars.peek() == Some(&'/') {
                current.push(chars.next().unwrap());
                in_block_comment = false;
            }
            continue;
        }
        match c {
            '\'' if !in_double && !in_backtick => {
                in_single = !in_single || peek_is_escaped_quote(&mut chars, &mut current, '\'');
                current.push(c);
            }
            '"' if !in_single && !in_backtick => {
                in_double = !in_double || peek_is_escaped_quote(&mut chars, &mut current, '"');
                current.push(c);
            }
            '`' if !in_single && !in_double => {
                in_backtick = !in_backtick;
                current.push(c);
            }
            '-' if !in_single && !in_double && !in_backtick && chars.peek() == Some(&'-') => {
                in_line_comment = true;
                current.push(c);
            }
            '/' if !in_single && !in_double && !in_backtick && chars.peek() == Some(&'*') => {
                in_block_comment = true;
                current.push(c);
            }
            ';' if !in_single && !in_double && !in_backtick => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    statements.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    statements
}

/// Handles the `''`/`""` doubled-quote escape inside a quoted literal: if the
/// next character repeats the quote, consume it and stay "inside" the literal.
fn peek_is_escaped_quote(chars: &mut std::iter::Peekable<std::str::Chars>, current: &mut String, q: char) -> bool {
    if chars.peek() == Some(&q) {
        current.push(chars.next().unwrap());
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_statements() {
        let sql = "CREATE TABLE t(id int);\nINSERT INTO t VALUES (1);";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("CREATE TABLE"));
        assert!(stmts[1].starts_with("INSERT INTO"));
    }

    #[test]
    fn ignores_semicolons_in_strings() {
        let sql = "INSERT INTO t VALUES ('a;b'), (\"c;d\");";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn ignores_semicolons_in_line_comments() {
        let sql = "-- comment; with semicolon\nSELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].trim_start().starts_with("-- comment"));
    }
}
