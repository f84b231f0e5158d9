//! Host Commands - the surface a host calls into
//!
//! Every command returns `Result<T, String>` so hosts can forward errors
//! without depending on the library's error types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sensors::{self, ViewContext};
use crate::logic::calculator::ProbabilityResult;
use crate::logic::config::AreaConfig;
use crate::logic::coordinator::{Diagnostics, OccupancyCoordinator};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Compact status for dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaStatus {
    pub area_id: String,
    pub name: String,
    pub lifecycle: String,
    pub probability: Option<f64>,
    pub is_occupied: Option<bool>,
    pub threshold_percent: f64,
    pub last_update_success: bool,
}

/// Serialized command envelope, `{"command": "...", ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    GetResult,
    GetStatus,
    GetDiagnostics,
    GetSensorViews,
    UpdateThreshold { value: f64 },
    UpdateOptions { config: AreaConfig },
    Refresh,
    RunAnalysis,
}

// ============================================================================
// COMMANDS
// ============================================================================

pub async fn get_result(coordinator: &OccupancyCoordinator) -> Result<Option<ProbabilityResult>, String> {
    Ok(coordinator.result())
}

pub async fn get_status(coordinator: &OccupancyCoordinator) -> Result<AreaStatus, String> {
    let config = coordinator.config();
    let result = coordinator.result();
    Ok(AreaStatus {
        area_id: config.area_id,
        name: config.name,
        lifecycle: coordinator.lifecycle().to_string(),
        probability: result.as_ref().map(|r| r.probability),
        is_occupied: result.as_ref().map(|r| r.is_occupied),
        threshold_percent: config.threshold.percent(),
        last_update_success: coordinator.last_update_success(),
    })
}

pub async fn get_diagnostics(coordinator: &OccupancyCoordinator) -> Result<Diagnostics, String> {
    Ok(coordinator.diagnostics())
}

pub async fn get_sensor_views(coordinator: &OccupancyCoordinator) -> Result<Value, String> {
    Ok(sensors::render(&ViewContext::capture(coordinator)))
}

pub async fn update_threshold(coordinator: &OccupancyCoordinator, value: f64) -> Result<bool, String> {
    coordinator
        .update_threshold(value)
        .await
        .map_err(|e| e.to_string())?;
    log::info!("Threshold set to {}%", value);
    Ok(true)
}

pub async fn update_options(coordinator: &OccupancyCoordinator, config: AreaConfig) -> Result<bool, String> {
    coordinator
        .update_options(config)
        .await
        .map_err(|e| e.to_string())?;
    Ok(true)
}

pub async fn refresh(coordinator: &OccupancyCoordinator) -> Result<ProbabilityResult, String> {
    coordinator.refresh().await.map_err(|e| e.to_string())
}

pub async fn run_analysis(coordinator: &OccupancyCoordinator) -> Result<bool, String> {
    coordinator.run_analysis().await.map_err(|e| e.to_string())?;
    Ok(true)
}

/// Dispatch a decoded command and serialize its answer
pub async fn execute(coordinator: &OccupancyCoordinator, command: Command) -> Result<Value, String> {
    log::debug!("Executing command: {:?}", command);
    let value = match command {
        Command::GetResult => to_value(get_result(coordinator).await?)?,
        Command::GetStatus => to_value(get_status(coordinator).await?)?,
        Command::GetDiagnostics => to_value(get_diagnostics(coordinator).await?)?,
        Command::GetSensorViews => get_sensor_views(coordinator).await?,
        Command::UpdateThreshold { value } => to_value(update_threshold(coordinator, value).await?)?,
        Command::UpdateOptions { config } => to_value(update_options(coordinator, config).await?)?,
        Command::Refresh => to_value(refresh(coordinator).await?)?,
        Command::RunAnalysis => to_value(run_analysis(coordinator).await?)?,
    };
    Ok(value)
}

/// Parse a JSON command and dispatch it
pub async fn execute_json(coordinator: &OccupancyCoordinator, raw: &str) -> Result<Value, String> {
    let command: Command = serde_json::from_str(raw).map_err(|e| format!("Invalid command: {}", e))?;
    execute(coordinator, command).await
}

fn to_value<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;

    use crate::logic::host::{HostState, MemoryHistory, StaticStates};
    use crate::logic::storage::MemoryStore;

    async fn coordinator() -> OccupancyCoordinator {
        let states = Arc::new(StaticStates::new());
        states.insert("binary_sensor.motion", HostState::new("on", Utc::now()));
        let coordinator = OccupancyCoordinator::new(
            AreaConfig::new("office", "Office", vec!["binary_sensor.motion".into()]),
            states,
            Arc::new(MemoryHistory::default()),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        coordinator.setup().await.unwrap();
        coordinator
    }

    #[test]
    fn test_command_wire_format() {
        let command: Command =
            serde_json::from_value(json!({"command": "update_threshold", "value": 65.0})).unwrap();
        assert!(matches!(command, Command::UpdateThreshold { value } if value == 65.0));

        let command: Command = serde_json::from_value(json!({"command": "run_analysis"})).unwrap();
        assert!(matches!(command, Command::RunAnalysis));
    }

    #[tokio::test]
    async fn test_execute_status_and_threshold() {
        let coordinator = coordinator().await;

        let status = execute(&coordinator, Command::GetStatus).await.unwrap();
        assert_eq!(status["area_id"], json!("office"));
        assert_eq!(status["lifecycle"], json!("historical_analysis_pending"));

        let ok = execute_json(&coordinator, r#"{"command":"update_threshold","value":20}"#)
            .await
            .unwrap();
        assert_eq!(ok, json!(true));
        assert_eq!(coordinator.config().threshold.percent(), 20.0);

        let err = execute_json(&coordinator, r#"{"command":"update_threshold","value":120}"#).await;
        assert!(err.unwrap_err().contains("threshold"));
    }

    #[tokio::test]
    async fn test_execute_refresh_and_views() {
        let coordinator = coordinator().await;

        let result = execute(&coordinator, Command::Refresh).await.unwrap();
        assert!(result["probability"].as_f64().unwrap() > 0.1);

        let views = execute(&coordinator, Command::GetSensorViews).await.unwrap();
        assert_eq!(views["area_occupancy_office_occupancy"]["available"], json!(true));

        assert!(execute_json(&coordinator, r#"{"command":"explode"}"#).await.is_err());
    }
}
