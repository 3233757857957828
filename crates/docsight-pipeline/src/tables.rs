//! Flattening table documents into records, and rendering records back to text.

use serde_json::Value;

use docsight_types::{ContentType, Document, Record};

/// Rows shown by [`table_to_text`].
pub const TABLE_TEXT_ROWS: usize = 10;

/// Records from every table document, in document order.
///
/// Structured rows in metadata are preferred; a table without them is parsed
/// from its text with [`parse_table_content`]. Non-table documents are skipped.
pub fn extract_table_records(documents: &[Document]) -> Vec<Record> {
    let mut records = Vec::new();
    for doc in documents {
        if doc.content_type != ContentType::Table {
            continue;
        }
        match doc.structured_records() {
            Some(rows) => records.extend(rows),
            None => records.extend(parse_table_content(&doc.content)),
        }
    }
    records
}

/// Parse `key: value | key: value` lines into records.
///
/// Lines without `|` are ignored, as are segments without `:`. Lines that
/// yield no pairs produce no record.
pub fn parse_table_content(text: &str) -> Vec<Record> {
    text.lines()
        .filter(|line| line.contains('|'))
        .filter_map(|line| {
            let mut record = Record::new();
            for segment in line.split('|') {
                if let Some((key, value)) = segment.split_once(':') {
                    let key = key.trim();
                    if key.is_empty() {
                        continue;
                    }
                    record.insert(key.to_string(), coerce_value(value));
                }
            }
            (!record.is_empty()).then_some(record)
        })
        .collect()
}

/// Numeric when the text parses after removing `,` and `$`; otherwise the
/// trimmed text.
pub fn coerce_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    let cleaned: String = trimmed.chars().filter(|c| *c != ',' && *c != '$').collect();
    if let Ok(i) = cleaned.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = cleaned.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(trimmed.to_string())
}

/// Display form of a cell: strings without quotes, null as empty.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Column names in first-seen order across all records.
pub fn column_names(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Plain-text rendering used as the content of synthetic table documents.
pub fn table_to_text(records: &[Record]) -> String {
    if records.is_empty() {
        return "Empty table".to_string();
    }
    let mut out = format!("Table with columns: {}", column_names(records).join(", "));
    for record in records.iter().take(TABLE_TEXT_ROWS) {
        let row = record
            .iter()
            .map(|(k, v)| format!("{k}: {}", value_text(v)))
            .collect::<Vec<_>>()
            .join(" | ");
        out.push('\n');
        out.push_str(&row);
    }
    if records.len() > TABLE_TEXT_ROWS {
        out.push_str(&format!(
            "\n... ({} more rows)",
            records.len() - TABLE_TEXT_ROWS
        ));
    }
    out
}

/// A table document wrapping `records` as structured rows.
pub fn synthetic_table_document(records: Vec<Record>) -> Document {
    Document::table(table_to_text(&records))
        .with_page(1)
        .with_records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn coerce_strips_currency_and_thousands() {
        assert_eq!(coerce_value(" $1,200 "), json!(1200));
        assert_eq!(coerce_value("3.5"), json!(3.5));
        assert_eq!(coerce_value(" North "), json!("North"));
        assert_eq!(coerce_value("12%"), json!("12%"));
    }

    #[test]
    fn parse_table_content_reads_pipe_lines() {
        let text = "Quarterly revenue\nquarter: Q1 | revenue: $1,000\nquarter: Q2 | revenue: 1,500 | note\nno pipes: here";
        let rows = parse_table_content(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["quarter"], json!("Q1"));
        assert_eq!(rows[0]["revenue"], json!(1000));
        assert_eq!(rows[1]["revenue"], json!(1500));
        assert!(!rows[1].contains_key("note"));
    }

    #[test]
    fn parse_table_content_skips_lines_without_pairs() {
        assert!(parse_table_content("a | b | c").is_empty());
    }

    #[test]
    fn extract_prefers_structured_rows() {
        let structured = Document::table("ignored | text: here").with_records(vec![record(&[
            ("region", json!("East")),
            ("sales", json!(10)),
        ])]);
        let parsed = Document::table("region: West | sales: 20");
        let text = Document::text("region: North | sales: 30");

        let rows = extract_table_records(&[structured, parsed, text]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["region"], json!("East"));
        assert_eq!(rows[1]["sales"], json!(20));
    }

    #[test]
    fn table_to_text_lists_columns_and_rows() {
        let rows = vec![
            record(&[("quarter", json!("Q1")), ("revenue", json!(100))]),
            record(&[("quarter", json!("Q2")), ("revenue", json!(150))]),
        ];
        let text = table_to_text(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Table with columns: quarter, revenue");
        assert_eq!(lines[1], "quarter: Q1 | revenue: 100");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn table_to_text_truncates_after_ten_rows() {
        let rows: Vec<Record> = (0..12).map(|i| record(&[("n", json!(i))])).collect();
        let text = table_to_text(&rows);
        assert_eq!(text.lines().count(), 12);
        assert!(text.ends_with("(2 more rows)"));
    }

    #[test]
    fn synthetic_document_round_trips_records() {
        let rows = vec![record(&[("a", json!(1))])];
        let doc = synthetic_table_document(rows.clone());
        assert_eq!(doc.content_type, ContentType::Table);
        assert_eq!(doc.page_number, Some(1));
        assert_eq!(doc.structured_records(), Some(rows));
    }
}
