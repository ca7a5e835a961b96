use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod models;
mod services;

use api::datafeed::DataFeedClient;
use config::AppConfig;
use services::{ChartSync, PngRenderer};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ratiochart=debug".parse().unwrap()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting ratiochart...");

    let app_config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    info!(
        "Polling {} every {:?}, {} series, output {}",
        app_config.sync.endpoint,
        app_config.sync.interval,
        app_config.sync.series.len(),
        app_config.chart.path.display()
    );

    let source = DataFeedClient::new(app_config.sync.endpoint.clone());
    let renderer = PngRenderer::new(app_config.chart);

    let mut sync = ChartSync::new(app_config.sync, Box::new(source), Box::new(renderer));
    sync.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down...");
    sync.stop().await;
    info!("Chart sync stopped cleanly");
}
