use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use meshprint::config;
use meshprint::job::JobStore;
use meshprint::printer::BambuTransport;
use meshprint::web::api::{self, AppStateInner};

#[derive(Parser)]
#[command(name = "meshprint", about = "Slice-and-print orchestration service")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    tracing::info!("Starting meshprint orchestration service");

    let config = config::load_config(args.config.as_deref()).map_err(|e| {
        tracing::error!("Failed to load configuration: {e}");
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    tracing::info!("Slicer: {}", config.slicer.executable.display());
    tracing::info!(
        "Printer: {} (serial {})",
        config.printer.ip,
        config.printer.serial
    );
    tracing::info!("Work directory: {}", config.slicer.work_dir.display());

    tokio::fs::create_dir_all(config.slicer.work_dir.join("uploads")).await?;
    tokio::fs::create_dir_all(config.slicer.work_dir.join("output")).await?;

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = Arc::new(AppStateInner {
        store: JobStore::new(),
        transport: Box::new(BambuTransport::new(config.printer.clone())),
        config,
    });
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
