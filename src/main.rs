use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ride_compare::{
    BatchOrchestrator, ComparisonType, FetchConfig, FetchEvent, HttpClient, JsonFileStore, Session,
};

/// Compare ride prices or ETAs from each city's airport to its center
#[derive(Parser)]
#[command(name = "ride-compare")]
struct Cli {
    /// Comparison type: price or eta
    #[arg(long, default_value = "price")]
    compare: ComparisonType,

    /// Cache file, created if missing
    #[arg(long, default_value = "ride-compare-cache.json")]
    cache_path: PathBuf,

    /// Keep refreshing on the configured countdown
    #[arg(long)]
    watch: bool,

    /// Cities to compare
    #[arg(required = true)]
    cities: Vec<String>,
}

fn log_event(event: FetchEvent) {
    match event {
        FetchEvent::BatchRequested { request } => info!(
            cities = request.cities.len(),
            refresh_time = request.refresh_time.as_deref().unwrap_or("-"),
            "requested"
        ),
        FetchEvent::AirportsLoaded { city_name, airports } => {
            let names: Vec<_> = airports.iter().map(|a| a.name.as_str()).collect();
            info!(city = %city_name, airports = ?names, "airports loaded");
        }
        FetchEvent::PriceSucceeded { payload, city } => {
            info!(city = %city.name, airport_index = city.index, %payload, "estimate")
        }
        FetchEvent::DataError { message } => warn!(city = %message, "no data"),
        FetchEvent::AllDataLoaded => info!("all data loaded"),
        FetchEvent::ComparisonChanged { compare } => info!(%compare, "comparison changed"),
        FetchEvent::ProductChanged { product } => info!(%product, "product changed"),
        FetchEvent::TimerTick => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = FetchConfig::from_env().context("invalid configuration")?;
    let client = Arc::new(HttpClient::new(config.clone()).context("building HTTP client")?);
    let cache = Arc::new(JsonFileStore::open(&cli.cache_path));
    info!(path = %cache.path().display(), "using cache file");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_event(event);
        }
    });

    let orchestrator = BatchOrchestrator::with_services(
        &config,
        cache,
        client.clone(),
        client.clone(),
        client,
        Arc::new(tx),
    );
    let session = Arc::new(Session::new(orchestrator, cli.compare, config.countdown_seconds));

    for city in &cli.cities {
        session.add_city(city).await;
    }

    if cli.watch {
        let countdown = session.clone();
        tokio::select! {
            _ = countdown.run_countdown() => {}
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    error!(error = %err, "failed to listen for ctrl-c");
                }
            }
        }
    }

    drop(session);
    printer.await.context("event printer panicked")?;
    Ok(())
}
