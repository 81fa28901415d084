//! Command-line front end for the segmentation workflow.
//!
//! Drives the same upload controller an interactive client would: select a
//! file, wait for the retry sequence, optionally re-run it at other
//! confidence values, then export the last result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jewel_models::{ConfidenceThreshold, ImageFile, SegmentationResult, SessionStatus};
use jewel_segment_client::{
    export_results, RetryPolicy, SegmentClient, SegmentClientConfig, SessionSnapshot, UploadController,
};

#[derive(Parser)]
#[command(name = "jewel")]
#[command(about = "Count jewellery components with the segmentation service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Segment one image and print per-category counts
    Segment(SegmentArgs),
    /// Check that the segmentation service is reachable
    Health {
        /// Segmentation endpoint
        #[arg(long, env = "SEGMENT_SERVICE_URL")]
        endpoint: Option<String>,
    },
}

#[derive(clap::Args)]
struct SegmentArgs {
    /// Path to a JPEG or PNG image
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Detection confidence (0.1 to 1.0)
    #[arg(short, long, default_value_t = ConfidenceThreshold::default())]
    confidence: ConfidenceThreshold,

    /// Re-run at each of these confidence values after the first result
    #[arg(long, value_delimiter = ',', value_name = "C1,C2,...")]
    sweep: Vec<ConfidenceThreshold>,

    /// Write the archive, annotated image and category crops here
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Segmentation endpoint
    #[arg(long, env = "SEGMENT_SERVICE_URL")]
    endpoint: Option<String>,

    /// Attempt ceiling for each request sequence
    #[arg(long, env = "SEGMENT_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Segment(args) => segment(args).await,
        Command::Health { endpoint } => health(endpoint).await,
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "jewel=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    }
}

fn client_config(endpoint: Option<String>, max_attempts: Option<u32>) -> SegmentClientConfig {
    let mut config = SegmentClientConfig::from_env();
    if let Some(endpoint) = endpoint {
        config.endpoint_url = endpoint;
    }
    if let Some(max_attempts) = max_attempts.filter(|n| *n > 0) {
        config.retry = RetryPolicy {
            max_attempts,
            ..config.retry
        };
    }
    config
}

async fn health(endpoint: Option<String>) -> anyhow::Result<()> {
    let client = SegmentClient::new(client_config(endpoint, None))?;
    let url = client.config().endpoint_url.clone();

    if client.health_check().await? {
        println!("Segmentation service at {} is healthy", url);
        Ok(())
    } else {
        bail!("Segmentation service at {} is not healthy", url)
    }
}

async fn segment(args: SegmentArgs) -> anyhow::Result<()> {
    let file = read_image_file(&args.image).await?;

    let client = SegmentClient::new(client_config(args.endpoint, args.max_attempts))?;
    let policy = client.retry_policy();
    let mut controller = UploadController::new(client, policy).with_confidence(args.confidence);

    let shutdown = controller.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling upload");
            shutdown.cancel();
        }
    });

    controller
        .select_files(vec![file])
        .with_context(|| format!("Cannot upload {}", args.image.display()))?;

    let mut last_result = report(&mut controller).await?;

    for confidence in args.sweep {
        controller.set_confidence(confidence)?;
        match report(&mut controller).await {
            Ok(result) => last_result = result,
            Err(e) if controller.status() == SessionStatus::Failed => {
                eprintln!("  {:#}", e);
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(dir) = args.out {
        let exported = export_results(&last_result, &dir)
            .await
            .with_context(|| format!("Failed to export results to {}", dir.display()))?;
        info!(files = exported.count(), dir = %dir.display(), "Results exported");
        println!("Exported {} file(s) to {}", exported.count(), dir.display());
    }

    controller.delete();
    Ok(())
}

/// Wait for the running sequence and print its outcome.
async fn report<S>(controller: &mut UploadController<S>) -> anyhow::Result<SegmentationResult>
where
    S: jewel_segment_client::Segmenter + 'static,
{
    let status = controller.wait().await;
    let snapshot = controller.snapshot();

    match (status, snapshot.result.clone()) {
        (SessionStatus::Succeeded, Some(result)) => {
            print_result(&snapshot, &result);
            Ok(result)
        }
        (SessionStatus::Failed, _) => {
            println!(
                "Confidence {}% failed after {} attempt(s)",
                snapshot.confidence.slider_percent(),
                snapshot.attempts.len()
            );
            bail!(
                "{}",
                snapshot
                    .error_message
                    .unwrap_or_else(|| "Segmentation failed".to_string())
            )
        }
        _ => bail!("Upload cancelled"),
    }
}

fn print_result(snapshot: &SessionSnapshot, result: &SegmentationResult) {
    println!();
    println!(
        "=== {} @ confidence {}% ===",
        snapshot.file_name.as_deref().unwrap_or("image"),
        snapshot.confidence.slider_percent()
    );
    println!("{}", result.analysis.message);

    let summaries = result.component_summaries();
    if summaries.is_empty() {
        for (label, count) in &result.analysis.components {
            println!("  {:<20} {}", label.replace('_', " "), count);
        }
    } else {
        for summary in summaries {
            println!("  {:<20} {}", summary.display_label, summary.count);
        }
    }
    println!("  {:<20} {}", "total", result.analysis.total());

    let failed = snapshot.attempts.iter().filter(|a| a.failure.is_some()).count();
    if failed > 0 {
        let waited: Duration = snapshot.attempts.iter().map(|a| a.delay_before).sum();
        println!("  ({} failed attempt(s), {:.1}s spent waiting)", failed, waited.as_secs_f32());
    }
}

async fn read_image_file(path: &Path) -> anyhow::Result<ImageFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    let declared_type = media_type_for(path);
    Ok(ImageFile::new(name, declared_type, bytes))
}

/// Media type implied by the file extension, as a file picker would report it.
fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "",
    }
}
