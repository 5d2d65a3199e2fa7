//! Header and footer rows authored as plain text.
//!
//! Each line is one row; commas separate columns. Double quotes protect
//! commas, and a backslash inside quotes takes the next character literally.
//! Whitespace inside a column is kept, surrounding whitespace is dropped,
//! and empty columns are skipped.

use crate::errors::RowParseError;

/// Split one line into its non-empty columns. `line_no` is 1-based and only
/// used for error reporting.
pub fn parse_line(line: &str, line_no: usize) -> Result<Vec<String>, RowParseError> {
    let mut columns = Vec::new();
    let mut token = String::new();
    let mut pending_ws = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                flush_whitespace(&mut token, &mut pending_ws);
                let mut closed = false;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(escaped) => token.push(escaped),
                            None => return Err(RowParseError::UnterminatedQuote { line: line_no }),
                        },
                        other => token.push(other),
                    }
                }
                if !closed {
                    return Err(RowParseError::UnterminatedQuote { line: line_no });
                }
            }
            ',' => {
                if !token.is_empty() {
                    columns.push(std::mem::take(&mut token));
                }
            }
            c if c.is_whitespace() => pending_ws.push(c),
            other => {
                flush_whitespace(&mut token, &mut pending_ws);
                token.push(other);
            }
        }
    }

    if !token.is_empty() {
        columns.push(token);
    }
    Ok(columns)
}

/// Whitespace between words belongs to the column; leading whitespace does not.
fn flush_whitespace(token: &mut String, pending_ws: &mut String) {
    if !token.is_empty() {
        token.push_str(pending_ws);
    }
    pending_ws.clear();
}

/// Parse multi-line text (CR, LF or CRLF separated) into rows, dropping
/// lines that contain no column.
pub fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, RowParseError> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut rows = Vec::new();
    for (index, line) in normalized.split('\n').enumerate() {
        let columns = parse_line(line, index + 1)?;
        if !columns.is_empty() {
            rows.push(columns);
        }
    }
    Ok(rows)
}

/// Rectangularize rows: pad each with `None` up to the widest row.
pub fn pad_rows(rows: &[Vec<String>]) -> Vec<Vec<Option<String>>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    rows.iter()
        .map(|row| {
            let mut padded: Vec<Option<String>> = row.iter().cloned().map(Some).collect();
            padded.resize(width, None);
            padded
        })
        .collect()
}
