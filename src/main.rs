//! Knapsack - search cluster exporter
//!
//! Exports index settings, mappings, aliases and documents into a packet
//! archive or a bulk-load stream.
//!
//! # Usage
//!
//! ```bash
//! # Everything into ./_all.jsonl
//! knapsack export
//!
//! # Two indices into a bulk stream, renaming one of them
//! knapsack export --index logs-*,users --path users.bulk --map users=people
//! ```

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use knapsack::archive::FileSessionFactory;
use knapsack::cli::{CliInterface, Commands};
use knapsack::cluster::HttpClusterClient;
use knapsack::config::Config;
use knapsack::error::{KnapsackError, Result};
use knapsack::export::{
    ExportContext, ExportRequest, ExportService, FileJobRegistry, InMemoryJobRegistry, JobRegistry,
};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle local subcommands or submit the export
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    let Commands::Export(args) = &cli.args().command else {
        return Ok(());
    };
    let request = cli.export_request(args)?;
    let service = create_export_service(cli.config())?;
    run_export(&service, request).await
}

/// Wire the export service to the configured cluster and registry
fn create_export_service(config: &Config) -> Result<ExportService> {
    let cluster = HttpClusterClient::new(&config.cluster.url, config.request_timeout())?;
    let registry: Arc<dyn JobRegistry> = match &config.registry.state_file {
        Some(path) => Arc::new(FileJobRegistry::open(path)?),
        None => Arc::new(InMemoryJobRegistry::new()),
    };

    ExportService::new(ExportContext {
        cluster: Arc::new(cluster),
        registry,
        sessions: Arc::new(FileSessionFactory),
        node_name: config.node_name(),
        default_path: config.export.default_path.clone(),
    })
}

/// Submit, print the response and wait for the detached task
///
/// Ctrl+C requests cooperative cancellation; the session is still closed.
async fn run_export(service: &ExportService, request: ExportRequest) -> Result<()> {
    let response = service.submit(request);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.running {
        return Err(KnapsackError::Generic(
            response.reason.unwrap_or_else(|| "export rejected".to_string()),
        ));
    }

    tokio::select! {
        _ = service.wait() => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    info!("interrupted, cancelling running exports");
                    service.cancel_all();
                }
                Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
            }
            service.wait().await;
        }
    }
    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr,
/// stdout carries the submission response only.
///
/// # Arguments
/// * `cli` - CLI interface with the effective logging configuration
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
