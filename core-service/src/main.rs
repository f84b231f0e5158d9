//! Area Occupancy - replay entry point
//!
//! Loads an area config and a recorded SQLite history, seeds current states
//! from the newest recorded values, runs one analysis pass plus one refresh
//! and prints the outcome as JSON.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use area_occupancy::api::{sensors, ViewContext};
use area_occupancy::constants::{self, APP_NAME, APP_VERSION};
use area_occupancy::logic::config::AreaConfig;
use area_occupancy::logic::host::{SqliteHistory, StaticStates};
use area_occupancy::logic::storage::JsonFileStore;
use area_occupancy::OccupancyCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let config_path = constants::get_config_path()
        .ok_or_else(|| anyhow!("AREA_OCCUPANCY_CONFIG is not set"))?;
    let config = AreaConfig::from_json_file(&config_path)
        .with_context(|| format!("loading area config {}", config_path.display()))?;

    let db_path = constants::get_history_db()
        .ok_or_else(|| anyhow!("AREA_OCCUPANCY_HISTORY_DB is not set"))?;
    let history = Arc::new(
        SqliteHistory::open(&db_path)
            .with_context(|| format!("opening history database {}", db_path.display()))?,
    );

    let states = Arc::new(StaticStates::new());
    let latest = history
        .latest_states(&config.sensors.all_ids())
        .context("reading latest recorded states")?;
    log::info!("Seeded {} of {} sensors from history", latest.len(), config.sensors.len());
    for (entity_id, state) in latest {
        states.insert(&entity_id, state);
    }

    let store = Arc::new(JsonFileStore::default_location());
    log::info!("Storage: {}", store.path_for(&config.storage_key()).display());

    let coordinator = OccupancyCoordinator::new(config, states, history, store)?;
    coordinator.setup().await?;

    if let Err(e) = coordinator.run_analysis().await {
        log::warn!("Analysis failed, continuing with defaults: {}", e);
    }
    coordinator.refresh().await?;

    let report = serde_json::json!({
        "diagnostics": coordinator.diagnostics(),
        "timeslots": coordinator.timeslot_cache().as_deref(),
        "sensors": sensors::render(&ViewContext::capture(&coordinator)),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    coordinator.shutdown().await;
    Ok(())
}
