//! Rendering of payloads for the terminal: pretty JSON or plain tables.

mod csv;
mod table;

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use crate::runtime::Runtime;

pub use csv::{records_to_csv, to_csv};
pub use table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json { OutputFormat::Json } else { OutputFormat::Table }
    }
}

pub fn to_pretty_json(value: &Value) -> String {
    // Serializing a Value cannot fail
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn print_json(value: &Value) {
    println!("{}", to_pretty_json(value));
}

/// Cell text for a JSON value: strings unquoted, null empty.
pub fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses inline JSON, or JSON read from a file when the argument is
/// `@path/to/file.json`.
pub fn load_data<R: Runtime>(runtime: &R, arg: &str) -> Result<Value> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let contents = runtime.read_to_string(Path::new(path))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid JSON in file {}", path))
        }
        None => serde_json::from_str(arg).context("Invalid JSON data"),
    }
}

/// Rows of a JSON array whose elements are objects; anything else yields
/// no rows.
pub fn object_rows(value: &Value) -> Vec<&serde_json::Map<String, Value>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}
