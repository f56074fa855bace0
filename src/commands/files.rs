//! File manager commands: upload, download, listing and search.

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use super::{method_path, resource_path};
use crate::http::{ApiClient, FileUpload, QueryParams, Transport};
use crate::output::{OutputFormat, Table, object_rows, print_json, value_to_cell};
use crate::runtime::Runtime;

const FILE_COLUMNS: [(&str, &str); 4] = [
    ("file_name", "Name"),
    ("file_size", "Size"),
    ("is_private", "Private"),
    ("file_url", "URL"),
];

const FOLDER_PAGE_LENGTH: u32 = 100;

/// Where and how an uploaded file lands on the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    pub public: bool,
    pub folder: Option<String>,
    /// Document to attach to, as (doctype, name).
    pub attach: Option<(String, String)>,
    pub field: Option<String>,
    pub optimize: bool,
}

impl UploadOptions {
    fn to_upload(&self, file_name: String, bytes: Vec<u8>) -> FileUpload {
        let mut upload = FileUpload::new(file_name, bytes);
        upload.is_private = !self.public;
        if let Some(folder) = &self.folder {
            upload.folder = folder.clone();
        }
        upload.attach_to = self.attach.clone();
        upload.fieldname = self.field.clone();
        upload.optimize = self.optimize;
        upload
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file path: {}", path.display()))
}

/// Local file name for a server file URL: its last path segment.
fn download_target(file_url: &str) -> PathBuf {
    let path = file_url.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("download");
    let name = urlencoding::decode(name)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| name.to_string());
    PathBuf::from(name)
}

/// Glob pattern searched by bulk upload.
fn bulk_pattern(pattern: &str, recursive: bool) -> String {
    if recursive && !pattern.contains("**") {
        format!("**/{}", pattern)
    } else {
        pattern.to_string()
    }
}

/// The file listing out of a folder RPC payload.
fn folder_files(result: Value) -> Value {
    match result {
        Value::Object(mut map) if map.contains_key("files") => {
            map.remove("files").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn render_files(title: &str, files: &Value) -> String {
    let rows = object_rows(files);
    if rows.is_empty() {
        return "No files found\n".to_string();
    }
    let table = Table::from_objects(title, &rows, &FILE_COLUMNS, None);
    format!("{}\nTotal: {} files\n", table.render(), rows.len())
}

async fn upload_one<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    path: &Path,
    options: &UploadOptions,
) -> Result<Value> {
    let bytes = runtime.read(path)?;
    let upload = options.to_upload(file_name_of(path)?, bytes);
    debug!("Uploading {} ({} bytes)", upload.file_name, upload.bytes.len());
    Ok(client.upload_file(&upload).await?)
}

/// Uploads one local file.
#[tracing::instrument(skip(client, runtime))]
pub async fn upload<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    format: OutputFormat,
    path: &Path,
    options: &UploadOptions,
) -> Result<()> {
    let result = upload_one(client, runtime, path, options)
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            println!("✓ Uploaded: {}", path.display());
            if let Some(url) = result.get("file_url") {
                println!("URL: {}", value_to_cell(url));
            }
        }
    }
    Ok(())
}

/// Downloads a server file to `output`, or to its own name in the current
/// directory.
#[tracing::instrument(skip(client, runtime))]
pub async fn download<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    file_url: &str,
    output: Option<&Path>,
) -> Result<()> {
    let target = output.map(Path::to_path_buf).unwrap_or_else(|| download_target(file_url));

    let bytes = client
        .download(file_url)
        .await
        .with_context(|| format!("Failed to download {}", file_url))?;
    runtime.write(&target, &bytes)?;

    println!("✓ Downloaded {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

/// Lists files in a folder, or the files attached to a document.
#[tracing::instrument(skip(client))]
pub async fn files_list<T: Transport>(
    client: &ApiClient<T>,
    format: OutputFormat,
    folder: &str,
    attached_to: Option<(&str, &str)>,
) -> Result<()> {
    let (title, files) = match attached_to {
        Some((doctype, name)) => {
            let params = QueryParams::new()
                .with(
                    "filters",
                    json!({"attached_to_doctype": doctype, "attached_to_name": name}),
                )
                .with(
                    "fields",
                    json!(["name", "file_name", "file_url", "file_size", "is_private"]),
                );
            let files = client
                .get(&resource_path("File", None), Some(&params))
                .await
                .with_context(|| format!("Failed to list files of {} '{}'", doctype, name))?;
            (format!("Files attached to {} {}", doctype, name), files)
        }
        None => {
            let body = json!({"folder": folder, "start": 0, "page_length": FOLDER_PAGE_LENGTH});
            let result = client
                .post(&method_path("frappe.core.api.file.get_files_in_folder"), Some(&body))
                .await
                .with_context(|| format!("Failed to list folder '{}'", folder))?;
            (format!("Files in {}", folder), folder_files(result))
        }
    };

    match format {
        OutputFormat::Json => print_json(&files),
        OutputFormat::Table => print!("{}", render_files(&title, &files)),
    }
    Ok(())
}

/// Searches files by name.
#[tracing::instrument(skip(client))]
pub async fn files_search<T: Transport>(
    client: &ApiClient<T>,
    format: OutputFormat,
    query: &str,
) -> Result<()> {
    let body = json!({"text": query});
    let files = client
        .post(&method_path("frappe.core.api.file.get_files_by_search_text"), Some(&body))
        .await
        .with_context(|| format!("Failed to search files for '{}'", query))?;

    match format {
        OutputFormat::Json => print_json(&files),
        OutputFormat::Table => {
            let title = format!("Files matching '{}'", query);
            print!("{}", render_files(&title, &files));
        }
    }
    Ok(())
}

/// Uploads every file matching a glob pattern, one after another.
#[tracing::instrument(skip(client, runtime))]
pub async fn bulk_upload<T: Transport, R: Runtime>(
    client: &ApiClient<T>,
    runtime: &R,
    pattern: &str,
    recursive: bool,
    options: &UploadOptions,
) -> Result<()> {
    let pattern = bulk_pattern(pattern, recursive);
    let paths = runtime.glob(&pattern)?;
    if paths.is_empty() {
        println!("No files match pattern: {}", pattern);
        return Ok(());
    }

    println!("Uploading {} files...", paths.len());
    let bar = ProgressBar::new(paths.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
        bar.set_style(style);
    }

    let mut succeeded = 0;
    let mut failed = Vec::new();
    for path in &paths {
        bar.set_message(path.display().to_string());
        match upload_one(client, runtime, path, options).await {
            Ok(_) => succeeded += 1,
            Err(e) => {
                warn!("Failed to upload {}: {:#}", path.display(), e);
                failed.push((path, e));
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    for (path, e) in &failed {
        eprintln!("✗ {}: {:#}", path.display(), e);
    }
    println!("Summary: {} successful, {} failed", succeeded, failed.len());

    if !failed.is_empty() {
        bail!("{} of {} uploads failed", failed.len(), paths.len());
    }
    Ok(())
}
