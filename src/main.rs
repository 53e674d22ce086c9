//! RedGreen - serve RED and GREEN product data from the fruit CRMs
//!
//! Parses configuration, wires the upstream clients, store, cache and rate
//! tracker together, and serves them over HTTP until Ctrl-C.

use std::process;
use std::sync::Arc;

use clap::Parser;

use redgreen::aggregator::Aggregator;
use redgreen::cli::{Cli, DatabaseLocation, StartupConfig};
use redgreen::data::{BananaClient, JsonClient, StrawberryClient, UpstreamSource};
use redgreen::logging;
use redgreen::refresh::RefreshHandle;
use redgreen::server::{self, AppState};
use redgreen::service::AggregationService;
use redgreen::store::{RecordStore, SqliteStore};

/// Opens the record store selected on the command line
fn open_store(location: &DatabaseLocation) -> Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    let store = match location {
        DatabaseLocation::InMemory => SqliteStore::open_in_memory()?,
        DatabaseLocation::File(path) => SqliteStore::open(path)?,
    };
    Ok(Arc::new(store))
}

/// Resolves when Ctrl-C is received
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    logging::init_subscriber(&config.log_level);

    let http = JsonClient::new(config.upstream_timeout)?;
    let sources: Vec<Arc<dyn UpstreamSource>> = vec![
        Arc::new(BananaClient::with_url(http.clone(), &config.banana_url)),
        Arc::new(StrawberryClient::with_url(http, &config.strawberry_url)),
    ];
    let store = open_store(&config.database)?;

    let aggregator = Aggregator::new(sources, store).with_mode(config.fetch_mode);
    tracing::info!(
        sources = ?aggregator.source_names(),
        mode = ?config.fetch_mode,
        "Configured upstream sources"
    );
    let service = Arc::new(AggregationService::new(
        aggregator,
        config.rate_limit_minutes,
    ));

    let refresh = RefreshHandle::spawn(Arc::clone(&service), config.refresh.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        rate_limit = service.tracker().rate_limit_minutes(),
        "RedGreen service listening"
    );
    let app = server::router(AppState::new(service, config.check_on_read));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh.shutdown().await;
    Ok(())
}
