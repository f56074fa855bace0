//! Report and server method commands.

use anyhow::{Context, Result};
use log::debug;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::time::Instant;

use super::{method_path, resource_path};
use crate::http::{ApiClient, QueryParams, Transport};
use crate::output::{
    OutputFormat, Table, load_data, object_rows, print_json, records_to_csv, to_csv, to_pretty_json,
    value_to_cell,
};
use crate::runtime::Runtime;

/// Rows shown by the table view of a report; the rest needs `--json` or `-o`.
const PREVIEW_ROWS: usize = 20;

/// A report column as (fieldname, label).
fn column(value: &Value) -> (String, String) {
    match value {
        Value::Object(map) => {
            let label = map.get("label").map(value_to_cell).unwrap_or_default();
            let fieldname = map
                .get("fieldname")
                .map(value_to_cell)
                .unwrap_or_else(|| scrub(&label));
            let label = if label.is_empty() { fieldname.clone() } else { label };
            (fieldname, label)
        }
        // Legacy "Label:Fieldtype/Options:Width" columns
        Value::String(spec) => {
            let label = spec.split(':').next().unwrap_or_default().to_string();
            (scrub(&label), label)
        }
        other => {
            let label = value_to_cell(other);
            (scrub(&label), label)
        }
    }
}

fn scrub(label: &str) -> String {
    label.trim().to_lowercase().replace([' ', '-'], "_")
}

fn report_columns(result: &Value) -> Vec<(String, String)> {
    result
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().map(column).collect())
        .unwrap_or_default()
}

fn report_rows(result: &Value) -> &[Value] {
    result
        .get("result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// CSV of a report result. Object rows keep their own keys; positional rows
/// are labelled from the report columns.
pub fn report_csv(result: &Value) -> String {
    let rows = report_rows(result);
    if rows.iter().any(Value::is_object) {
        let objects: Vec<&Map<String, Value>> = rows.iter().filter_map(Value::as_object).collect();
        return to_csv(&objects);
    }

    let headers: Vec<String> = report_columns(result).into_iter().map(|(_, label)| label).collect();
    let records: Vec<Vec<String>> = rows
        .iter()
        .filter_map(Value::as_array)
        .map(|cells| cells.iter().map(value_to_cell).collect())
        .collect();
    if headers.is_empty() && records.is_empty() {
        return String::new();
    }
    records_to_csv(&headers, &records)
}

fn render_report(name: &str, result: &Value) -> String {
    let rows = report_rows(result);
    let columns = report_columns(result);
    let shown = &rows[..rows.len().min(PREVIEW_ROWS)];

    let table = if shown.iter().any(Value::is_object) {
        let objects: Vec<&Map<String, Value>> = shown.iter().filter_map(Value::as_object).collect();
        let pairs: Vec<(&str, &str)> = if columns.is_empty() {
            objects
                .first()
                .map(|first| first.keys().map(|k| (k.as_str(), k.as_str())).collect())
                .unwrap_or_default()
        } else {
            columns.iter().map(|(f, l)| (f.as_str(), l.as_str())).collect()
        };
        Table::from_objects(name, &objects, &pairs, None)
    } else {
        let mut table = Table::new(name);
        table.set_headers(columns.iter().map(|(_, label)| label.clone()));
        for cells in shown.iter().filter_map(Value::as_array) {
            table.add_row(cells.iter().map(value_to_cell));
        }
        table
    };

    let mut out = table.render();
    if rows.len() > shown.len() {
        out.push_str(&format!("... {} more rows\n", rows.len() - shown.len()));
    }
    out
}

/// Lists reports, optionally restricted to a module.
#[tracing::instrument(skip(client))]
pub async fn reports_list<T: Transport>(
    client: &ApiClient<T>,
    format: OutputFormat,
    module: Option<&str>,
) -> Result<()> {
    let mut params = QueryParams::new().with("fields", json!(["name", "module", "report_type"]));
    if let Some(module) = module {
        params.insert("filters", json!({"module": module}));
    }
    params.insert("limit_page_length", 0);

    let reports = client
        .get(&resource_path("Report", None), Some(&params))
        .await
        .context("Failed to list reports")?;

    match format {
        OutputFormat::Json => print_json(&reports),
        OutputFormat::Table => {
            let rows = object_rows(&reports);
            if rows.is_empty() {
                println!("No reports found");
                return Ok(());
            }
            let columns = [("name", "Name"), ("module", "Module"), ("report_type", "Type")];
            Table::from_objects("Reports", &rows, &columns, None).print();
            println!("\nTotal: {} reports", rows.len());
        }
    }
    Ok(())
}

/// Runs a query report. With `output`, the result is saved as CSV when the
/// path ends in `.csv`, as JSON otherwise.
#[tracing::instrument(skip(client, runtime))]
pub async fn report<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    format: OutputFormat,
    name: &str,
    filters: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let filters = match filters {
        Some(arg) => load_data(runtime, arg)?,
        None => json!({}),
    };

    let body = json!({"report_name": name, "filters": filters});
    let started = Instant::now();
    let result = client
        .post(&method_path("frappe.desk.query_report.run"), Some(&body))
        .await
        .with_context(|| format!("Failed to run report '{}'", name))?;
    let elapsed = started.elapsed();
    let row_count = report_rows(&result).len();
    debug!("Report {} returned {} rows in {:?}", name, row_count, elapsed);

    if let Some(path) = output {
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let contents = if is_csv {
            report_csv(&result)
        } else {
            to_pretty_json(&result)
        };
        runtime.write(path, contents.as_bytes())?;
        println!("✓ Report saved to {}", path.display());
    } else if format == OutputFormat::Json {
        print_json(&result);
        return Ok(());
    } else {
        print!("{}", render_report(name, &result));
    }

    println!("Rows: {}", row_count);
    println!("Execution time: {:.2}s", elapsed.as_secs_f64());
    Ok(())
}

/// Text shown for a method result in table mode.
fn render_call_result(result: &Value) -> String {
    match result {
        Value::Null => "No return value".to_string(),
        Value::Object(_) | Value::Array(_) => to_pretty_json(result),
        scalar => value_to_cell(scalar),
    }
}

/// Calls a whitelisted server method with JSON arguments.
#[tracing::instrument(skip(client, runtime))]
pub async fn call<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    format: OutputFormat,
    method: &str,
    args: Option<&str>,
) -> Result<()> {
    let args = match args {
        Some(arg) => load_data(runtime, arg)?,
        None => json!({}),
    };

    let result = client
        .post(&method_path(method), Some(&args))
        .await
        .with_context(|| format!("Failed to call {}", method))?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => println!("{}", render_call_result(&result)),
    }
    Ok(())
}
