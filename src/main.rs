use anyhow::{Context, Result};
use clap::Parser;
use frappe_cli::commands::{self, ListOptions, UploadOptions};
use frappe_cli::config::Config;
use frappe_cli::http::ApiClient;
use frappe_cli::output::{OutputFormat, load_data};
use frappe_cli::runtime::{RealRuntime, Runtime};
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

/// frappe-cli - command line client for Frappe / ERPNext sites
///
/// Sites and their API credentials are read from
/// ~/.config/frappecli/config.yaml (or --config / FRAPPE_CLI_CONFIG).
/// Values may reference environment variables as ${VAR}.
///
/// Examples:
///   frappe-cli list ToDo --limit 5
///   frappe-cli --site prod get User Administrator --json
///   frappe-cli call frappe.auth.get_logged_user
#[derive(Parser, Debug)]
#[command(author, version = env!("FRAPPE_CLI_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Site to use (defaults to the configured default_site)
    #[arg(long, short = 's', env = "FRAPPE_SITE", global = true)]
    site: Option<String>,

    /// Configuration file (also via FRAPPE_CLI_CONFIG)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 30, global = true)]
    timeout: u64,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List documents of a doctype
    List(ListArgs),

    /// Show a single document
    Get(DocArgs),

    /// Create a document
    Create(CreateArgs),

    /// Update a document
    Update(UpdateArgs),

    /// Delete a document
    Delete(DeleteArgs),

    /// List doctypes
    Doctypes(DoctypesArgs),

    /// Upload a file
    Upload(UploadArgs),

    /// Download a file by its URL
    Download(DownloadArgs),

    /// Browse the file manager
    #[command(subcommand)]
    Files(FilesCommands),

    /// Upload every file matching a glob pattern
    BulkUpload(BulkUploadArgs),

    /// Browse reports
    #[command(subcommand)]
    Reports(ReportsCommands),

    /// Run a report
    Report(ReportArgs),

    /// Call a whitelisted server method
    Call(CallArgs),

    /// Check that the site is reachable
    Status(StatusArgs),

    /// List configured sites
    Sites,
}

#[derive(clap::Subcommand, Debug)]
enum FilesCommands {
    /// List files in a folder or attached to a document
    List(FilesListArgs),

    /// Search files by name
    Search(FilesSearchArgs),
}

#[derive(clap::Subcommand, Debug)]
enum ReportsCommands {
    /// List available reports
    List(ReportsListArgs),
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    doctype: String,

    /// Filters as JSON, or @file.json
    #[arg(long)]
    filters: Option<String>,

    /// Comma separated field names
    #[arg(long)]
    fields: Option<String>,

    #[arg(long, default_value_t = 20)]
    limit: u32,

    #[arg(long, default_value_t = 0)]
    offset: u32,

    /// e.g. "modified desc"
    #[arg(long)]
    order_by: Option<String>,
}

#[derive(clap::Args, Debug)]
struct DocArgs {
    doctype: String,
    name: String,
}

#[derive(clap::Args, Debug)]
struct CreateArgs {
    doctype: String,

    /// Document as JSON, or @file.json
    #[arg(long)]
    data: String,

    /// Show what would be sent without sending it
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args, Debug)]
struct UpdateArgs {
    doctype: String,
    name: String,

    /// Changed fields as JSON, or @file.json
    #[arg(long)]
    data: String,

    /// Show what would be sent without sending it
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args, Debug)]
struct DeleteArgs {
    doctype: String,
    name: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(clap::Args, Debug)]
struct DoctypesArgs {
    #[arg(long)]
    module: Option<String>,

    /// Only custom doctypes
    #[arg(long, conflicts_with = "standard")]
    custom: bool,

    /// Only standard doctypes
    #[arg(long)]
    standard: bool,
}

#[derive(clap::Args, Debug)]
struct UploadTarget {
    /// Make the file public (files are private by default)
    #[arg(long)]
    public: bool,

    #[arg(long, default_value = "Home")]
    folder: String,
}

#[derive(clap::Args, Debug)]
struct UploadArgs {
    file: PathBuf,

    #[command(flatten)]
    target: UploadTarget,

    /// Attach to a document
    #[arg(long, num_args = 2, value_names = ["DOCTYPE", "DOCNAME"])]
    attach: Option<Vec<String>>,

    /// Attachment field of the document
    #[arg(long, requires = "attach")]
    field: Option<String>,

    /// Let the server optimize images
    #[arg(long)]
    optimize: bool,
}

#[derive(clap::Args, Debug)]
struct DownloadArgs {
    /// e.g. /private/files/report.pdf
    file_url: String,

    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct FilesListArgs {
    #[arg(long, default_value = "Home")]
    folder: String,

    #[arg(long, num_args = 2, value_names = ["DOCTYPE", "DOCNAME"])]
    attached_to: Option<Vec<String>>,
}

#[derive(clap::Args, Debug)]
struct FilesSearchArgs {
    query: String,
}

#[derive(clap::Args, Debug)]
struct BulkUploadArgs {
    /// Glob pattern, e.g. "invoices/*.pdf"
    pattern: String,

    #[command(flatten)]
    target: UploadTarget,

    /// Also match files in subdirectories
    #[arg(long, short = 'r')]
    recursive: bool,
}

#[derive(clap::Args, Debug)]
struct ReportsListArgs {
    #[arg(long)]
    module: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ReportArgs {
    name: String,

    /// Report filters as JSON, or @file.json
    #[arg(long)]
    filters: Option<String>,

    /// Save to a file (.csv or .json)
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct CallArgs {
    /// Dotted method path, e.g. frappe.auth.get_logged_user
    method: String,

    /// Arguments as JSON, or @file.json
    #[arg(long)]
    args: Option<String>,
}

#[derive(clap::Args, Debug)]
struct StatusArgs {
    /// Also list the installed apps
    #[arg(long)]
    detailed: bool,
}

fn pair(values: Option<Vec<String>>) -> Option<(String, String)> {
    match values.as_deref() {
        Some([a, b]) => Some((a.clone(), b.clone())),
        _ => None,
    }
}

fn upload_options(
    target: UploadTarget,
    attach: Option<Vec<String>>,
    field: Option<String>,
    optimize: bool,
) -> UploadOptions {
    UploadOptions {
        public: target.public,
        folder: Some(target.folder),
        attach: pair(attach),
        field,
        optimize,
    }
}

async fn run<R: Runtime>(cli: Cli, runtime: &R) -> Result<()> {
    let format = OutputFormat::from_json_flag(cli.json);
    let config = Config::load(runtime, cli.config.as_deref())?;

    // Listing sites needs no credentials
    if let Commands::Sites = cli.command {
        return commands::sites(&config, format);
    }

    let site = config.resolve(runtime, cli.site.as_deref())?;
    debug!("Using site {} at {}", site.name, site.url);
    let client = ApiClient::with_timeout(
        &site.url,
        &site.api_key,
        &site.api_secret,
        Duration::from_secs(cli.timeout),
    )?;

    dispatch(cli.command, &config, &client, runtime, format).await
}

async fn dispatch<R: Runtime>(
    command: Commands,
    config: &Config,
    client: &ApiClient,
    runtime: &R,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Commands::List(args) => {
            let filters = args
                .filters
                .as_deref()
                .map(|f| load_data(runtime, f))
                .transpose()
                .context("Invalid --filters")?;
            let options = ListOptions {
                filters,
                fields: args.fields,
                limit: args.limit,
                offset: args.offset,
                order_by: args.order_by,
            };
            commands::list(client, format, &args.doctype, &options).await
        }
        Commands::Get(args) => commands::get(client, format, &args.doctype, &args.name).await,
        Commands::Create(args) => {
            commands::create(client, runtime, format, &args.doctype, &args.data, args.dry_run).await
        }
        Commands::Update(args) => {
            commands::update(
                client,
                runtime,
                format,
                &args.doctype,
                &args.name,
                &args.data,
                args.dry_run,
            )
            .await
        }
        Commands::Delete(args) => {
            commands::delete(client, runtime, &args.doctype, &args.name, args.yes).await
        }
        Commands::Doctypes(args) => {
            let module = args.module.as_deref();
            commands::doctypes(client, format, module, args.custom, args.standard).await
        }
        Commands::Upload(args) => {
            let options = upload_options(args.target, args.attach, args.field, args.optimize);
            commands::upload(client, runtime, format, &args.file, &options).await
        }
        Commands::Download(args) => {
            commands::download(client, runtime, &args.file_url, args.output.as_deref()).await
        }
        Commands::Files(FilesCommands::List(args)) => {
            let attached = pair(args.attached_to);
            let attached = attached.as_ref().map(|(d, n)| (d.as_str(), n.as_str()));
            commands::files_list(client, format, &args.folder, attached).await
        }
        Commands::Files(FilesCommands::Search(args)) => {
            commands::files_search(client, format, &args.query).await
        }
        Commands::BulkUpload(args) => {
            let options = upload_options(args.target, None, None, false);
            commands::bulk_upload(client, runtime, &args.pattern, args.recursive, &options).await
        }
        Commands::Reports(ReportsCommands::List(args)) => {
            commands::reports_list(client, format, args.module.as_deref()).await
        }
        Commands::Report(args) => {
            commands::report(
                client,
                runtime,
                format,
                &args.name,
                args.filters.as_deref(),
                args.output.as_deref(),
            )
            .await
        }
        Commands::Call(args) => {
            commands::call(client, runtime, format, &args.method, args.args.as_deref()).await
        }
        Commands::Status(args) => commands::status(client, format, args.detailed).await,
        Commands::Sites => commands::sites(config, format),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    run(cli, &RealRuntime).await
}
