//! Dropzone CLI - validate and upload files through the orchestrator
//!
//! # Commands
//!
//! ```bash
//! dropzone validate a.png b.pdf                       # Check files against the config
//! dropzone upload a.png b.pdf --endpoint URL          # Upload over HTTP
//! dropzone upload a.png -e URL -H "Authorization: Bearer T"
//! dropzone upload a.png b.pdf --simulate --fail b.pdf # Dry run with a fake transport
//! dropzone config                                     # Print the effective config
//! ```
//!
//! Configuration comes from `--config <file.json>` (camelCase keys) and
//! `DROPZONE_*` environment variables, which win. Set `RUST_LOG` for
//! library logs.

use clap::{Args, Parser, Subcommand};
use dropzone::{
    format_size, BroadcastSink, Entry, FileHandle, HttpUploader, NotificationLevel, Orchestrator,
    OrchestratorOptions, SimulatedUploader, UploadConfig, UploadStatus, Uploader, Validator,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

#[derive(Parser)]
#[command(name = "dropzone")]
#[command(about = "Validate, queue and upload files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check files against the upload constraints without uploading
    Validate {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate, queue and upload files
    Upload(UploadArgs),

    /// Print the effective configuration as JSON
    Config {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct UploadArgs {
    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint receiving one POST per file
    #[arg(short, long, conflicts_with = "simulate", required_unless_present = "simulate")]
    endpoint: Option<String>,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", requires = "endpoint")]
    headers: Vec<String>,

    /// Use a simulated transport instead of HTTP
    #[arg(long)]
    simulate: bool,

    /// Simulated upload duration in milliseconds
    #[arg(long, default_value = "800", requires = "simulate")]
    delay_ms: u64,

    /// File name the simulated transport should fail (repeatable)
    #[arg(long, requires = "simulate")]
    fail: Vec<String>,

    /// Maximum uploads in flight
    #[arg(long, default_value = "1")]
    concurrency: usize,

    /// Single-file mode: only the first file is taken
    #[arg(long)]
    single: bool,

    /// Do not allocate previews for images
    #[arg(long)]
    no_previews: bool,

    /// Print entries as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { files, config } => cmd_validate(&files, config.as_deref()).await,
        Commands::Upload(args) => cmd_upload(args).await,
        Commands::Config { config } => cmd_config(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Optional JSON file, then `DROPZONE_*` overrides.
fn load_config(path: Option<&Path>) -> Result<UploadConfig, Box<dyn std::error::Error>> {
    let base = match path {
        Some(p) => {
            eprintln!("⚙️  Config: {}", p.display());
            UploadConfig::from_json_file(p)?
        }
        None => UploadConfig::default(),
    };
    Ok(base.with_env_overrides()?)
}

fn parse_headers(raw: &[String]) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    for header in raw {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("header '{}' is not 'Name: value'", header))?;
        headers.append(HeaderName::from_bytes(name.trim().as_bytes())?, HeaderValue::from_str(value.trim())?);
    }
    Ok(headers)
}

async fn load_files(paths: &[PathBuf]) -> Result<Vec<FileHandle>, Box<dyn std::error::Error>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = FileHandle::from_path(path)
            .await
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        files.push(file);
    }
    Ok(files)
}

async fn cmd_validate(paths: &[PathBuf], config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let validator = Validator::new(Arc::new(config));

    eprintln!("✔️  Validating {} file(s)", paths.len());

    let mut valid = 0;
    let mut invalid = 0;

    for file in load_files(paths).await? {
        match validator.validate(&file).await {
            Ok(()) => {
                valid += 1;
                eprintln!("   ✅ {} ({}, {})", file.name(), format_size(file.size()), file.mime());
            }
            Err(e) => {
                invalid += 1;
                eprintln!("   ❌ {}: {}", file.name(), e);
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

async fn cmd_upload(args: UploadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args.config.as_deref())?;

    let uploader: Arc<dyn Uploader> = match &args.endpoint {
        Some(endpoint) => {
            eprintln!("📤 Uploading to: {}", endpoint);
            Arc::new(HttpUploader::new(endpoint.clone()).with_headers(parse_headers(&args.headers)?))
        }
        None => {
            eprintln!("🧪 Simulated uploads ({} ms each)", args.delay_ms);
            Arc::new(SimulatedUploader::new(Duration::from_millis(args.delay_ms)).failing(args.fail.clone()))
        }
    };

    let options = if args.single {
        OrchestratorOptions::single()
    } else {
        OrchestratorOptions::default()
    }
    .with_concurrency_limit(args.concurrency)
    .with_previews(!args.no_previews);

    // Print notifications as they arrive
    let sink = Arc::new(BroadcastSink::default());
    let notifications = sink.stream();
    let printer = tokio::spawn(async move {
        tokio::pin!(notifications);
        while let Some(n) = notifications.next().await {
            let icon = match n.level {
                NotificationLevel::Success => "✅",
                NotificationLevel::Error => "❌",
                NotificationLevel::Info => "ℹ️ ",
            };
            eprintln!("   {} {}: {}", icon, n.title, n.description);
        }
    });

    let orchestrator = Orchestrator::builder_arc(uploader)
        .config(config)
        .options(options)
        .sink(sink.clone())
        .on_all_complete(|entries| {
            let failed = entries.iter().filter(|e| e.status == UploadStatus::Error).count();
            log::info!("All {} entries settled, {} failed", entries.len(), failed);
        })
        .build()?;

    let files = load_files(&args.files).await?;
    let admitted = orchestrator.select_files(files).await?;
    orchestrator.wait_idle().await;

    let entries = orchestrator.entries();
    orchestrator.teardown();

    // Dropping every sender ends the notification stream
    drop(orchestrator);
    drop(sink);
    printer.await.ok();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_table(&entries);
    }

    let completed = entries.iter().filter(|e| e.status == UploadStatus::Completed).count();
    let failed = entries.iter().filter(|e| e.status == UploadStatus::Error).count();
    eprintln!(
        "\n📊 Results: {} selected, {} completed, {} failed",
        admitted.len(),
        completed,
        failed
    );

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_table(entries: &[Entry]) {
    println!("{:<10} {:>5}  {:>9}  {}", "STATUS", "PROG", "SIZE", "FILE");
    for entry in entries {
        let detail = match &entry.error {
            Some(error) => format!("{} ({})", entry.name, error),
            None => entry.name.clone(),
        };
        println!(
            "{:<10} {:>4}%  {:>9}  {}",
            entry.status.as_str(),
            entry.progress,
            format_size(entry.size),
            detail
        );
    }
}

fn cmd_config(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&["Authorization: Bearer abc".into(), "x-trace:  1 ".into()]).unwrap();
        assert_eq!(headers["authorization"], "Bearer abc");
        assert_eq!(headers["x-trace"], "1");

        assert!(parse_headers(&["no-colon".into()]).is_err());
        assert!(parse_headers(&["bad name: v".into()]).is_err());
    }
}
