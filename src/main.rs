//! seisflow-run: builds a `RunConfig` from the environment and drives one
//! pipeline run to completion, exiting with the process code §7 assigns
//! the terminal condition (if any) the run stopped on.

use std::sync::Arc;

use chrono::{Duration, Utc};
use seisflow::{run, RoutingConfig, RunConfig};
use seisflow_domain::interop::{ConstantVelocityTable, FakeMiniseedUnpacker};
use seisflow_persistence::{build_dev_pool_from_env, init_dotenv, ConnectionProvider, PoolProvider};
use seisflow_policies::RadiusSchedule;

fn config_from_env() -> RunConfig {
    let events_webservice_url = std::env::var("SEISFLOW_EVENTS_URL")
        .unwrap_or_else(|_| "https://earthquake.usgs.gov/fdsnws/event/1/query".to_string());
    let network = std::env::var("SEISFLOW_NETWORK").unwrap_or_else(|_| "*".to_string());
    let station = std::env::var("SEISFLOW_STATION").unwrap_or_else(|_| "*".to_string());
    let location = std::env::var("SEISFLOW_LOCATION").unwrap_or_else(|_| "*".to_string());
    let channel = std::env::var("SEISFLOW_CHANNEL").unwrap_or_else(|_| "BH?,HH?".to_string());
    let routing = match std::env::var("SEISFLOW_ROUTING_URL") {
        Ok(routing_url) => RoutingConfig::Eida { routing_url },
        Err(_) => RoutingConfig::Iris,
    };

    RunConfig {
        events_webservice_url,
        start: Utc::now() - Duration::days(7),
        end: Utc::now(),
        min_latitude: None,
        max_latitude: None,
        min_longitude: None,
        max_longitude: None,
        min_depth: None,
        max_depth: None,
        min_magnitude: Some(5.0),
        max_magnitude: None,
        routing,
        network,
        station,
        location,
        channel,
        min_sample_rate: Some(1.0),
        radius_schedule: RadiusSchedule { min_mag: 5.0, max_mag: 8.0, min_mag_radius_deg: 2.0, max_mag_radius_deg: 20.0 },
        pre_arrival_minutes: 1,
        post_arrival_minutes: 5,
        retry_mask: 0,
        max_concurrent_requests: 8,
        http_timeout_secs: 30,
        memory_sample_every: 64,
        memory_threshold_fraction: 0.85,
        segment_flush_batch_size: 200,
    }
}

#[tokio::main]
async fn main() {
    init_dotenv();

    let pool = match build_dev_pool_from_env() {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("could not connect to the database: {e}");
            std::process::exit(1);
        }
    };
    let connections: Arc<dyn ConnectionProvider> = Arc::new(PoolProvider { pool });

    // No production travel-time model or miniSEED decoder ships in this
    // workspace (§6): these stand-ins are what a real deployment swaps
    // out for its own implementation of the two trait seams.
    let travel_times = Arc::new(ConstantVelocityTable { km_per_sec: 8.0 });
    let unpacker = Arc::new(FakeMiniseedUnpacker);

    let config = config_from_env();

    match run(config, connections, travel_times, unpacker).await {
        Ok(outcome) => {
            println!(
                "run {} (download #{}) finished: {} stage(s) ran, {} warning(s), stopped early at {:?}",
                outcome.run_id,
                outcome.download_id,
                outcome.report.stages_run.len(),
                outcome.report.total_warnings,
                outcome.report.stopped_early_at,
            );
        }
        Err(e) => {
            eprintln!("run failed: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
