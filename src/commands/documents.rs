//! Document CRUD commands.

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::fmt::Write;

use super::{is_truthy, resource_path};
use crate::http::{ApiClient, QueryParams, Transport};
use crate::output::{
    OutputFormat, Table, load_data, object_rows, print_json, to_pretty_json, value_to_cell,
};
use crate::runtime::Runtime;

/// Columns shown by the table view of `list`.
const LIST_COLUMNS: usize = 5;

/// Options of the `list` command.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    pub filters: Option<Value>,
    pub fields: Option<String>,
    pub limit: u32,
    pub offset: u32,
    pub order_by: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            filters: None,
            fields: None,
            limit: 20,
            offset: 0,
            order_by: None,
        }
    }
}

/// Pagination, filter and field parameters for a collection listing.
pub fn list_params(options: &ListOptions) -> QueryParams {
    let mut params = QueryParams::new();
    params
        .insert("limit_page_length", options.limit)
        .insert("limit_start", options.offset);

    if let Some(filters) = &options.filters {
        params.insert("filters", filters.clone());
    }

    if let Some(fields) = &options.fields {
        let fields: Vec<Value> = fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| Value::String(f.to_string()))
            .collect();
        params.insert("fields", Value::Array(fields));
    }

    if let Some(order_by) = &options.order_by {
        params.insert("order_by", order_by.as_str());
    }

    params
}

fn render_list(doctype: &str, result: &Value) -> String {
    let rows = object_rows(result);
    let Some(first) = rows.first() else {
        return "No documents found\n".to_string();
    };

    let columns: Vec<(&str, &str)> = first.keys().map(|k| (k.as_str(), k.as_str())).collect();
    let title = format!("{} Documents", doctype);
    let table = Table::from_objects(title, &rows, &columns, Some(LIST_COLUMNS));

    format!("{}\nTotal: {} documents\n", table.render(), rows.len())
}

fn render_document(doctype: &str, doc: &Value) -> String {
    let Some(map) = doc.as_object() else {
        return format!("{}\n", value_to_cell(doc));
    };

    let name = map.get("name").map(value_to_cell).unwrap_or_default();
    let mut out = format!("\n{}: {}\n\n", doctype, name);
    for (key, value) in map {
        if !key.starts_with('_') && is_truthy(value) {
            let _ = writeln!(out, "{}: {}", key, value_to_cell(value));
        }
    }
    out
}

/// Lists documents of a doctype.
#[tracing::instrument(skip(client))]
pub async fn list<T: Transport>(
    client: &ApiClient<T>,
    format: OutputFormat,
    doctype: &str,
    options: &ListOptions,
) -> Result<()> {
    let params = list_params(options);
    debug!("Listing {} with {} parameter(s)", doctype, params.len());

    let result = client
        .get(&resource_path(doctype, None), Some(&params))
        .await
        .with_context(|| format!("Failed to list {} documents", doctype))?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => print!("{}", render_list(doctype, &result)),
    }
    Ok(())
}

/// Shows a single document.
#[tracing::instrument(skip(client))]
pub async fn get<T: Transport>(
    client: &ApiClient<T>,
    format: OutputFormat,
    doctype: &str,
    name: &str,
) -> Result<()> {
    let result = client
        .get(&resource_path(doctype, Some(name)), None)
        .await
        .with_context(|| format!("Failed to get {} '{}'", doctype, name))?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => print!("{}", render_document(doctype, &result)),
    }
    Ok(())
}

/// Creates a document from inline JSON or `@file.json`.
#[tracing::instrument(skip(client, runtime, data))]
pub async fn create<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    format: OutputFormat,
    doctype: &str,
    data: &str,
    dry_run: bool,
) -> Result<()> {
    let doc = load_data(runtime, data)?;

    if dry_run {
        println!("DRY RUN - Would create:");
        println!("{}", to_pretty_json(&doc));
        return Ok(());
    }

    let result = client
        .post(&resource_path(doctype, None), Some(&doc))
        .await
        .with_context(|| format!("Failed to create {}", doctype))?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            let name = result.get("name").map(value_to_cell).unwrap_or_default();
            println!("✓ Created {}: {}", doctype, name);
        }
    }
    Ok(())
}

/// Updates an existing document.
#[tracing::instrument(skip(client, runtime, data))]
pub async fn update<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    format: OutputFormat,
    doctype: &str,
    name: &str,
    data: &str,
    dry_run: bool,
) -> Result<()> {
    let changes = load_data(runtime, data)?;

    if dry_run {
        println!("DRY RUN - Would update {} {}:", doctype, name);
        println!("{}", to_pretty_json(&changes));
        return Ok(());
    }

    let result = client
        .put(&resource_path(doctype, Some(name)), Some(&changes))
        .await
        .with_context(|| format!("Failed to update {} '{}'", doctype, name))?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => println!("✓ Updated {}: {}", doctype, name),
    }
    Ok(())
}

/// Deletes a document, asking first unless `yes` is set.
#[tracing::instrument(skip(client, runtime))]
pub async fn delete<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    doctype: &str,
    name: &str,
    yes: bool,
) -> Result<()> {
    if !yes && !runtime.confirm(&format!("Delete {} '{}'?", doctype, name))? {
        println!("Cancelled");
        return Ok(());
    }

    client
        .delete(&resource_path(doctype, Some(name)))
        .await
        .with_context(|| format!("Failed to delete {} '{}'", doctype, name))?;

    println!("✓ Deleted {}: {}", doctype, name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{client, ok};
    use crate::http::{MockTransport, RequestBody};
    use crate::runtime::MockRuntime;
    use reqwest::Method;
    use serde_json::json;

    #[test]
    fn test_list_params_defaults() {
        let pairs = list_params(&ListOptions::default()).encoded_pairs();
        assert_eq!(
            pairs,
            vec![
                ("limit_page_length".to_string(), "20".to_string()),
                ("limit_start".to_string(), "0".to_string()),
            ]
        );
    }

    #[test]
    fn test_list_params_full() {
        let options = ListOptions {
            filters: Some(json!({"status": "Open"})),
            fields: Some("name, subject,,status".to_string()),
            limit: 50,
            offset: 100,
            order_by: Some("modified desc".to_string()),
        };
        let pairs = list_params(&options).encoded_pairs();
        assert_eq!(pairs[2], ("filters".to_string(), r#"{"status":"Open"}"#.to_string()));
        assert_eq!(pairs[3], ("fields".to_string(), r#"["name","subject","status"]"#.to_string()));
        assert_eq!(pairs[4], ("order_by".to_string(), "modified desc".to_string()));
    }

    #[test]
    fn test_render_list() {
        let result = json!([
            {"name": "TD-1", "status": "Open", "a": 1, "b": 2, "c": 3, "d": 4},
            {"name": "TD-2", "status": "Closed", "a": 1, "b": 2, "c": 3, "d": 4}
        ]);
        let out = render_list("ToDo", &result);
        assert!(out.starts_with("ToDo Documents\n"));
        assert!(out.contains("TD-2"));
        // Only the first five fields
        assert!(!out.lines().nth(1).unwrap().contains('d'));
        assert!(out.ends_with("Total: 2 documents\n"));
    }

    #[test]
    fn test_render_list_empty() {
        assert_eq!(render_list("ToDo", &json!([])), "No documents found\n");
    }

    #[test]
    fn test_render_document_skips_private_and_empty() {
        let doc = json!({
            "name": "TD-1",
            "_liked_by": "[]",
            "description": "",
            "status": "Open",
            "docstatus": 0
        });
        let out = render_document("ToDo", &doc);
        assert!(out.contains("ToDo: TD-1"));
        assert!(out.contains("status: Open"));
        assert!(!out.contains("_liked_by"));
        assert!(!out.contains("description"));
        assert!(!out.contains("docstatus"));
    }

    #[tokio::test]
    async fn test_list_requests_collection() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::GET
                    && req.url.path() == "/api/resource/ToDo"
                    && req.url.query() == Some("limit_page_length=20&limit_start=0")
            })
            .times(1)
            .returning(|_| ok(r#"{"data": []}"#));

        list(&client(transport), OutputFormat::Json, "ToDo", &ListOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_posts_loaded_data() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::POST
                    && req.url.path() == "/api/resource/ToDo"
                    && req.body == RequestBody::Json(json!({"description": "Call back"}))
            })
            .times(1)
            .returning(|_| ok(r#"{"data": {"name": "TD-9"}}"#));

        let runtime = MockRuntime::new();
        create(
            &client(transport),
            &runtime,
            OutputFormat::Table,
            "ToDo",
            r#"{"description": "Call back"}"#,
            false,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_dry_run_sends_nothing() {
        // No expectations: any request would panic
        let transport = MockTransport::new();
        let runtime = MockRuntime::new();
        create(&client(transport), &runtime, OutputFormat::Table, "ToDo", "{}", true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_puts_document() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::PUT && req.url.path() == "/api/resource/User/a%40b.com"
            })
            .times(1)
            .returning(|_| ok(r#"{"data": {"name": "a@b.com"}}"#));

        let runtime = MockRuntime::new();
        update(
            &client(transport),
            &runtime,
            OutputFormat::Table,
            "User",
            "a@b.com",
            r#"{"enabled": 0}"#,
            false,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_delete_cancelled() {
        let transport = MockTransport::new();
        let mut runtime = MockRuntime::new();
        runtime
            .expect_confirm()
            .withf(|prompt| prompt == "Delete ToDo 'TD-1'?")
            .returning(|_| Ok(false));

        delete(&client(transport), &runtime, "ToDo", "TD-1", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_with_yes_skips_prompt() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::DELETE && req.url.path() == "/api/resource/ToDo/TD-1"
            })
            .times(1)
            .returning(|_| Ok(crate::http::RawResponse::new(202, r#"{"message": "ok"}"#)));

        // Strict mock: confirm must not be called
        let runtime = MockRuntime::new();
        delete(&client(transport), &runtime, "ToDo", "TD-1", true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_failure_has_context() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(crate::http::RawResponse::new(404, r#"{"message": "Not found"}"#)));

        let err = get(&client(transport), OutputFormat::Json, "ToDo", "nope")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to get ToDo 'nope'");
        let chain = format!("{:#}", err);
        assert!(chain.contains("API request failed with status 404: Not found"));
    }
}
