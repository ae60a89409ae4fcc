//! Tolerant CSV parsing into pretty-printed JSON row objects.
//!
//! The first record supplies the column names. Rows may be shorter or longer than the header:
//! short rows only carry the columns they have, and surplus fields are keyed `field_<n>`
//! (1-based position). Rows that fail to decode are skipped. A hard reader error stops the
//! parse and whatever was collected up to that point is returned as a successful payload, so
//! callers cannot tell a partial parse from a complete one.

use serde_json::{Map, Value};

use super::types::Payload;

/// Parse CSV bytes. Total: every input yields a payload.
pub(crate) fn extract_csv(bytes: &[u8]) -> Payload {
    Payload::Text(render_rows(&parse_rows(bytes)))
}

fn parse_rows(bytes: &[u8]) -> Vec<Map<String, Value>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = match reader.byte_headers() {
        Ok(headers) => headers
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect(),
        Err(error) => {
            tracing::warn!(error = %error, "CSV header row unreadable; returning no rows");
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => rows.push(row_object(&headers, record.iter())),
            Err(error) if is_fatal(&error) => {
                tracing::warn!(
                    error = %error,
                    rows = rows.len(),
                    "CSV parsing stopped early; continuing with partial data"
                );
                break;
            }
            Err(error) => {
                skipped += 1;
                tracing::debug!(row = index + 2, error = %error, "Skipping malformed CSV row");
            }
        }
    }

    if skipped > 0 {
        tracing::info!(rows = rows.len(), skipped, "CSV parsed with skipped rows");
    }
    rows
}

fn is_fatal(error: &csv::Error) -> bool {
    matches!(error.kind(), csv::ErrorKind::Io(_))
}

fn row_object<'a>(
    headers: &[String],
    fields: impl Iterator<Item = &'a str>,
) -> Map<String, Value> {
    let mut row = Map::new();
    for (position, field) in fields.enumerate() {
        let key = headers
            .get(position)
            .cloned()
            .unwrap_or_else(|| format!("field_{}", position + 1));
        row.insert(key, Value::String(field.to_string()));
    }
    row
}

fn render_rows(rows: &[Map<String, Value>]) -> String {
    // Serializing string maps cannot fail.
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(payload: Payload) -> String {
        payload.as_text().expect("csv payload is text").to_string()
    }

    #[test]
    fn rows_become_objects_in_header_order() {
        let output = text(extract_csv(b"name,age\nada,36\ngrace,45\n"));
        let parsed: Vec<Map<String, Value>> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["name"], "ada");
        assert_eq!(parsed[1]["age"], "45");
        let keys: Vec<&String> = parsed[0].keys().collect();
        assert_eq!(keys, ["name", "age"]);
    }

    #[test]
    fn output_is_pretty_printed_with_two_spaces() {
        let output = text(extract_csv(b"a\n1\n"));
        assert_eq!(output, "[\n  {\n    \"a\": \"1\"\n  }\n]");
    }

    #[test]
    fn mismatched_rows_are_kept() {
        let output = text(extract_csv(b"a,b,c\n1,2\n1,2,3,4\n"));
        let parsed: Vec<Map<String, Value>> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].len(), 2);
        assert!(parsed[0].get("c").is_none());
        assert_eq!(parsed[1]["field_4"], "4");
    }

    #[test]
    fn invalid_utf8_row_is_skipped() {
        let output = text(extract_csv(b"a,b\n1,2\n\xff\xfe,3\n4,5\n"));
        let parsed: Vec<Map<String, Value>> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1]["a"], "4");
    }

    #[test]
    fn empty_and_garbage_inputs_still_resolve() {
        assert_eq!(text(extract_csv(b"")), "[]");
        let output = text(extract_csv(b"col\n\"unterminated,quote\nmore"));
        assert!(serde_json::from_str::<Vec<Map<String, Value>>>(&output).is_ok());
    }
}
