//! `hygieia` binary: wires the JSON file store and a scorer behind the HTTP API.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use reqwest::Client;
use tracing::info;

use hygieia_core::service::HygieiaService;
use hygieia_server::{Config, serve, telemetry};
use hygieia_store_file::JsonFileStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    telemetry::init(&config.log_level, config.log_format)?;
    let settings = config.service_settings()?;

    // Store + scorer setup
    let store = Arc::new(JsonFileStore::new(&config.database));
    let client = Client::builder().user_agent("hygieia/0.1").build()?;
    let scorer = hygieia_scorer::scorer(config.scorer_url.clone(), client);
    info!(
        database = %config.database.display(),
        scorer = scorer.name(),
        radius_km = settings.default_radius_km,
        missing_target = ?settings.missing_target,
        "configuration loaded"
    );

    let service = Arc::new(HygieiaService::new(store, scorer).with_settings(settings));
    serve(service, config.bind).await
}
