//! CSV export of report rows.

use serde_json::{Map, Value};

use super::value_to_cell;

/// Renders objects as CSV. The header comes from the first row's keys;
/// later rows are projected onto those columns.
pub fn to_csv(rows: &[&Map<String, Value>]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let records: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).map(value_to_cell).unwrap_or_default())
                .collect()
        })
        .collect();
    records_to_csv(&headers, &records)
}

/// Renders a header line followed by positional records.
pub fn records_to_csv(headers: &[String], records: &[Vec<String>]) -> String {
    let mut out = String::new();
    push_record(&mut out, headers);
    for record in records {
        push_record(&mut out, record);
    }
    out
}

fn push_record(out: &mut String, fields: &[String]) {
    let record: Vec<String> = fields.iter().map(|f| escape(f)).collect();
    out.push_str(&record.join(","));
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn objects(value: &Value) -> Vec<&Map<String, Value>> {
        value.as_array().unwrap().iter().filter_map(Value::as_object).collect()
    }

    #[test]
    fn test_header_and_rows() {
        let data = json!([
            {"account": "Cash", "balance": 100.5},
            {"account": "Bank", "balance": null}
        ]);
        assert_eq!(
            to_csv(&objects(&data)),
            "account,balance\r\nCash,100.5\r\nBank,\r\n"
        );
    }

    #[test]
    fn test_later_rows_projected_on_first_keys() {
        let data = json!([{"a": 1, "b": 2}, {"b": 3, "c": 4}]);
        assert_eq!(to_csv(&objects(&data)), "a,b\r\n1,2\r\n,3\r\n");
    }

    #[test]
    fn test_quoting() {
        let data = json!([{"note": "a, \"b\"\nc"}]);
        assert_eq!(to_csv(&objects(&data)), "note\r\n\"a, \"\"b\"\"\nc\"\r\n");
    }

    #[test]
    fn test_records() {
        let headers = vec!["Account".to_string(), "Debit".to_string()];
        let records = vec![vec!["Cash".to_string(), "10".to_string()]];
        assert_eq!(records_to_csv(&headers, &records), "Account,Debit\r\nCash,10\r\n");
    }

    #[test]
    fn test_empty() {
        assert_eq!(to_csv(&[]), "");
    }
}
