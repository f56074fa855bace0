//! Site level commands: doctypes, reachability and configured sites.

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use super::{is_truthy, method_path};
use crate::config::Config;
use crate::http::{ApiClient, Transport};
use crate::output::{OutputFormat, Table, object_rows, print_json, value_to_cell};

/// Filters for the doctype listing. `custom` wins over `standard`.
pub fn doctype_filters(module: Option<&str>, custom: bool, standard: bool) -> Value {
    let mut filters = Map::new();
    if let Some(module) = module {
        filters.insert("module".to_string(), json!(module));
    }
    if custom {
        filters.insert("custom".to_string(), json!(1));
    } else if standard {
        filters.insert("custom".to_string(), json!(0));
    }
    Value::Object(filters)
}

fn yes_no(value: Option<&Value>, yes: &'static str, no: &'static str) -> &'static str {
    if value.is_some_and(is_truthy) { yes } else { no }
}

fn render_doctypes(doctypes: &Value) -> String {
    let rows = object_rows(doctypes);
    if rows.is_empty() {
        return "No doctypes found\n".to_string();
    }

    let mut table = Table::new("DocTypes");
    table.set_headers(["Name", "Module", "Type", "Single"]);
    for row in &rows {
        table.add_row([
            row.get("name").map(value_to_cell).unwrap_or_default(),
            row.get("module").map(value_to_cell).unwrap_or_default(),
            yes_no(row.get("custom"), "Custom", "Standard").to_string(),
            yes_no(row.get("issingle"), "Yes", "No").to_string(),
        ]);
    }
    format!("{}\nTotal: {} doctypes\n", table.render(), rows.len())
}

/// Lists document types.
#[tracing::instrument(skip(client))]
pub async fn doctypes<T: Transport>(
    client: &ApiClient<T>,
    format: OutputFormat,
    module: Option<&str>,
    custom: bool,
    standard: bool,
) -> Result<()> {
    let body = json!({
        "doctype": "DocType",
        "fields": ["name", "module", "custom", "issingle"],
        "filters": doctype_filters(module, custom, standard),
        "order_by": "name asc",
        "limit_page_length": 0,
    });

    let result = client
        .post(&method_path("frappe.client.get_list"), Some(&body))
        .await
        .context("Failed to list doctypes")?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => print!("{}", render_doctypes(&result)),
    }
    Ok(())
}

/// Version text out of the version endpoint payload, which is either a
/// bare string or a map of app versions.
fn version_text(version: &Value) -> String {
    match version {
        Value::Object(map) => map
            .get("frappe")
            .or_else(|| map.get("frappe_version"))
            .map(value_to_cell)
            .unwrap_or_else(|| version.to_string()),
        other => value_to_cell(other),
    }
}

/// Installed apps reported by the version endpoint: an `apps` list, or one
/// `name version` entry per app in a version map.
fn installed_apps(version: &Value) -> Vec<String> {
    let Some(map) = version.as_object() else {
        return Vec::new();
    };

    if let Some(apps) = map.get("apps").and_then(Value::as_array) {
        return apps.iter().map(value_to_cell).collect();
    }

    map.iter()
        .filter(|(name, v)| name.as_str() != "frappe_version" && !v.is_object() && !v.is_array())
        .map(|(name, v)| format!("{} {}", name, value_to_cell(v)))
        .collect()
}

/// Checks that the site answers and reports its version. `detailed` also
/// lists the installed apps.
#[tracing::instrument(skip(client))]
pub async fn status<T: Transport>(
    client: &ApiClient<T>,
    format: OutputFormat,
    detailed: bool,
) -> Result<()> {
    let version = client
        .get(&method_path("version"), None)
        .await
        .context("Site is not reachable")?;
    let apps = if detailed { installed_apps(&version) } else { Vec::new() };

    match format {
        OutputFormat::Json => {
            let mut info = json!({"url": client.base_url(), "reachable": true, "version": version});
            if detailed {
                info["apps"] = json!(apps);
            }
            print_json(&info);
        }
        OutputFormat::Table => {
            println!("✓ Site is reachable at: {}", client.base_url());
            println!("Version: {}", version_text(&version));
            if detailed {
                if apps.is_empty() {
                    println!("Installed apps: not reported by this site");
                } else {
                    println!("\nInstalled apps:");
                    for app in &apps {
                        println!("  • {}", app);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Lists the configured sites, marking the default one.
pub fn sites(config: &Config, format: OutputFormat) -> Result<()> {
    let names = config.list_sites();
    let default = config.default_site_name();

    match format {
        OutputFormat::Json => print_json(&json!({"default_site": default, "sites": names})),
        OutputFormat::Table => {
            if names.is_empty() {
                println!("No sites configured in {}", config.path.display());
                return Ok(());
            }
            println!("Configured sites:");
            for name in &names {
                if Some(name.as_str()) == default {
                    println!("* {} (default)", name);
                } else {
                    println!("  {}", name);
                }
            }
        }
    }
    Ok(())
}
