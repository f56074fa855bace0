//! Command handlers.
//!
//! Each handler receives the [`ApiClient`](crate::http::ApiClient) built for
//! this invocation, plus the runtime and output format when it needs them.

mod documents;
mod files;
mod reports;
mod site;

pub use documents::{ListOptions, create, delete, get, list, list_params, update};
pub use files::{UploadOptions, bulk_upload, download, files_list, files_search, upload};
pub use reports::{call, report, report_csv, reports_list};
pub use site::{doctype_filters, doctypes, sites, status};

use serde_json::Value;
use urlencoding::encode;

/// Path of a document collection, or of one document when `name` is given.
pub fn resource_path(doctype: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("/api/resource/{}/{}", encode(doctype), encode(name)),
        None => format!("/api/resource/{}", encode(doctype)),
    }
}

/// Path of a whitelisted server method, e.g. `frappe.client.get_list`.
pub fn method_path(method: &str) -> String {
    format!("/api/method/{}", method)
}

/// Truthiness of a field value for display purposes.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
