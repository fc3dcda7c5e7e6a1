//! Ocean PULSE - marine protected area health fusion

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use ocean_pulse::{
    cache::{FishingActivityTracker, FishingDataService, FishingRequest, SystemClock},
    config::{Args, Command, FishingArgs, HealthArgs},
    fishing::FishingAggregator,
    gateway::GatewayClient,
    health::{
        CachedRemoteProvider, DataServiceClient, HealthMonitor, HealthProviders, RegionTarget,
        RemoteCompositeScoreProvider, UnconfiguredProvider,
    },
    logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Ocean PULSE - region health fusion");
    info!("======================================");
    info!("Surveillance API: {}", args.gateway.gfw_base_url);
    info!("API token: {}", if args.has_gfw_token() { "configured" } else { "not configured" });
    info!("Data service: {}", args.data_service_url.as_deref().unwrap_or("not configured"));
    info!("Request timeout: {}ms", args.request_timeout_ms);
    info!("======================================");

    let gateway = Arc::new(GatewayClient::new(args.gateway_config())?);
    let aggregator = Arc::new(FishingAggregator::with_defaults(gateway));
    let fishing = Arc::new(FishingDataService::new(
        aggregator,
        &args.cache_ttls(),
        Arc::new(SystemClock),
    ));

    match &args.command {
        Command::Fishing(cmd) => run_fishing(fishing, cmd).await,
        Command::Health(cmd) => run_health(&args, fishing, cmd).await,
    }
}

async fn run_fishing(service: Arc<FishingDataService>, cmd: &FishingArgs) -> anyhow::Result<()> {
    let area = cmd.area.load_area()?.context("--bbox or --geometry is required")?;
    let tracker = FishingActivityTracker::new(service.clone());

    tracker.fetch_fishing_data(FishingRequest {
        region_id: cmd.region_id.clone(),
        area,
        date_range: Some(cmd.date_range(Utc::now().date_naive())),
        protection: Some(cmd.area.protection),
        established_year: cmd.area.established_year,
    });
    let state = tracker.settled().await;

    let stats = service.cache().stats();
    info!(
        entries = stats.total_entries,
        fresh = stats.fresh_entries,
        stale = stats.stale_entries,
        "Fishing cache"
    );

    match (state.data, state.error) {
        (Some(activity), _) => {
            println!("{}", serde_json::to_string_pretty(&activity)?);
            Ok(())
        }
        (None, Some(err)) => {
            error!(
                kind = %err.kind,
                unavailable = err.is_temporarily_unavailable(),
                "{}",
                err.user_message()
            );
            std::process::exit(2);
        }
        (None, None) => anyhow::bail!("fishing fetch finished without data"),
    }
}

async fn run_health(args: &Args, fishing: Arc<FishingDataService>, cmd: &HealthArgs) -> anyhow::Result<()> {
    let remote: Arc<dyn RemoteCompositeScoreProvider> = match args.data_service_config() {
        Some(config) => {
            let client = Arc::new(DataServiceClient::new(config)?);
            Arc::new(CachedRemoteProvider::with_ttl(client, args.cache_ttls().environmental))
        }
        None => {
            warn!("DATA_SERVICE_URL not set, remote score unavailable");
            Arc::new(UnconfiguredProvider)
        }
    };

    let area = cmd.area.load_area()?;
    let target = RegionTarget {
        region_id: cmd.region_id.clone(),
        name: cmd.name.clone(),
        lat: cmd.lat,
        lon: cmd.lon,
        area,
        protection: Some(cmd.area.protection),
        established_year: cmd.area.established_year,
        indicator_species_count: cmd.indicator_species,
    };

    let providers = HealthProviders {
        remote: Some(remote),
        fishing: Some(fishing),
        ..Default::default()
    };

    let monitor = HealthMonitor::spawn(providers, target);
    let mut updates = monitor.subscribe();
    loop {
        let score = updates.borrow_and_update().clone();
        println!("{}", serde_json::to_string(&score)?);
        if !score.loading || updates.changed().await.is_err() {
            break;
        }
    }

    Ok(())
}
