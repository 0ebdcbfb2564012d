use anyhow::Context;
use clap::{Parser, Subcommand};
use closeout_core::validation::validate_report_request;
use closeout_core::{
    CoreConfig, FormsService, PathSegment, Section, UploadFile, UploadOutcome, UploadRequest,
};
use closeout_store::{backend, BackendKind, DropboxCredentials};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "closeout")]
#[command(about = "Branch close-out forms CLI")]
struct Cli {
    /// Object store backend
    #[arg(long, env = "CLOSEOUT_STORE", default_value = "dropbox")]
    store: BackendKind,

    #[arg(long, env = "DROPBOX_APP_KEY", default_value = "", hide_env_values = true)]
    app_key: String,

    #[arg(long, env = "DROPBOX_APP_SECRET", default_value = "", hide_env_values = true)]
    app_secret: String,

    #[arg(long, env = "DROPBOX_REFRESH_TOKEN", default_value = "", hide_env_values = true)]
    refresh_token: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate the workspace for a folder, moving any previous one aside
    Allocate {
        /// Folder name under the forms root
        folder: String,
    },
    /// Upload a local file into a workspace, replacing any file of the same name
    Upload {
        /// Folder name under the forms root
        folder: String,
        /// Local file to upload
        file: PathBuf,
        /// Name to store the file under (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Compose and publish the report for a workspace, printing its link
    Report {
        /// Folder name under the forms root
        folder: String,
        /// Employee name shown on the report
        employee: String,
        /// JSON file holding the sections array: [{"text", "done", "images"}]
        sections: PathBuf,
    },
    /// Print the public link for an object, creating it if needed
    Link {
        /// Absolute store path, e.g. /forms/branch12/report.html
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("closeout_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("No command given. Use --help for usage.");
        return Ok(());
    };

    let cfg = CoreConfig::from_lookup(|name| std::env::var(name).ok())?;
    let credentials = DropboxCredentials {
        app_key: cli.app_key,
        app_secret: cli.app_secret,
        refresh_token: cli.refresh_token,
    };
    let store = backend::open(cli.store, credentials, cfg.request_timeout())
        .with_context(|| format!("failed to open {} store", cli.store))?;
    let service = FormsService::new(store, Arc::new(cfg));

    match command {
        Commands::Allocate { folder } => {
            let folder = PathSegment::new(&folder).context("invalid folder name")?;
            let workspace = service.allocator().allocate(&folder).await?;
            println!("Allocated workspace: {}", workspace.resolved_path);
            if let Some(previous) = workspace.preserved_as {
                println!("Previous submission preserved at: {}", previous);
            }
        }
        Commands::Upload { folder, file, name } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("local path has no file name")?,
            };
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let request = UploadRequest {
                folder: PathSegment::new(&folder).context("invalid folder name")?,
                file: Some(UploadFile {
                    name: PathSegment::new(&name).context("invalid file name")?,
                    bytes,
                }),
            };
            if let UploadOutcome::Uploaded { path } = service.allocate_and_upload(request).await? {
                println!("Uploaded: {}", path);
            }
        }
        Commands::Report {
            folder,
            employee,
            sections,
        } => {
            let raw = tokio::fs::read(&sections)
                .await
                .with_context(|| format!("failed to read {}", sections.display()))?;
            let parsed: Vec<Section> = serde_json::from_slice(&raw)
                .with_context(|| format!("{} is not a sections array", sections.display()))?;
            let request = validate_report_request(
                Some(folder.as_str()),
                Some(employee.as_str()),
                Some(parsed),
            )?;
            let link = service.create_report(request).await?;
            println!("{}", link.url);
        }
        Commands::Link { path } => {
            let link = service.resolver().resolve(&path).await?;
            println!("{}", link.url);
        }
    }

    Ok(())
}
