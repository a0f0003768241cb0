//! Minimal CSV reader/writer for the ledger and library files.
//!
//! Handles quoted fields with embedded commas, quotes ("" escapes), and
//! newlines. The first row is always the header row.

use std::sync::Arc;

use crate::error::IngestError;

/// One data row, addressable by header name.
#[derive(Debug, Clone)]
pub struct Record {
    headers: Arc<Vec<String>>,
    values: Vec<String>,
}

impl Record {
    /// Value of the named column, if present.
    pub fn field(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|i| self.values.get(i).cloned())
    }
}

/// Parse CSV text into records keyed by the header row.
pub fn parse_csv(text: &str) -> Result<Vec<Record>, IngestError> {
    let rows = parse_rows(text)?;
    let mut iter = rows.into_iter();

    let Some(header_row) = iter.next() else {
        return Ok(Vec::new());
    };
    let headers = Arc::new(header_row);

    let mut records = Vec::new();
    for (i, values) in iter.enumerate() {
        if values.len() != headers.len() {
            return Err(IngestError::Malformed {
                line: i + 2,
                message: format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    values.len()
                ),
            });
        }
        records.push(Record {
            headers: Arc::clone(&headers),
            values,
        });
    }
    Ok(records)
}

/// Serialize a header row plus data rows to CSV text.
pub fn write_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(
        &headers
            .iter()
            .map(|h| quote_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in rows {
        out.push_str(
            &row.iter()
                .map(|f| quote_field(f))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

fn quote_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, IngestError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => {
                row.push(std::mem::take(&mut field));
            }
            '\r' => {} // swallowed; \n closes the row
            '\n' => {
                line += 1;
                row.push(std::mem::take(&mut field));
                // Skip rows that are entirely empty (trailing newline).
                if row.len() > 1 || !row[0].is_empty() {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(IngestError::Malformed {
            line,
            message: "unterminated quoted field".to_string(),
        });
    }

    // Final row without a trailing newline.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_parse() {
        let records = parse_csv("a,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("a").as_deref(), Some("1"));
        assert_eq!(records[1].field("c").as_deref(), Some("6"));
    }

    #[test]
    fn quoted_comma_and_escaped_quote() {
        let records = parse_csv("name,address\nJo,\"12 Dock Rd, Pier 4\"\n\"Bo \"\"The Ox\"\"\",Plain\n")
            .unwrap();
        assert_eq!(records[0].field("address").as_deref(), Some("12 Dock Rd, Pier 4"));
        assert_eq!(records[1].field("name").as_deref(), Some("Bo \"The Ox\""));
    }

    #[test]
    fn newline_inside_quotes_stays_in_field() {
        let records = parse_csv("a,b\n\"line1\nline2\",x\n").unwrap();
        assert_eq!(records[0].field("a").as_deref(), Some("line1\nline2"));
    }

    #[test]
    fn missing_trailing_newline_is_fine() {
        let records = parse_csv("a,b\n1,2").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("b").as_deref(), Some("2"));
    }

    #[test]
    fn ragged_row_is_malformed() {
        let err = parse_csv("a,b\n1,2,3\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        assert!(parse_csv("a,b\n\"open,2\n").is_err());
    }

    #[test]
    fn write_then_parse_round_trips() {
        let rows = vec![vec!["V1".to_string(), "12 Dock Rd, Pier 4".to_string()]];
        let text = write_csv(&["vendor_id", "address"], &rows);
        let records = parse_csv(&text).unwrap();
        assert_eq!(records[0].field("address").as_deref(), Some("12 Dock Rd, Pier 4"));
    }

    #[test]
    fn empty_input_yields_no_records() {
        assert!(parse_csv("").unwrap().is_empty());
    }
}
