use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::seeds;
use crate::fabric::{self, GenerationReport};
use crate::models::Topology;
use crate::AppState;

use super::{ApiError, MessageResponse};

/// List all topologies
pub async fn list_topologies(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Topology>>, ApiError> {
    let topologies = state.client.all::<Topology>().await?;
    Ok(Json(topologies))
}

/// Run generation for one topology. Runs are serialized.
pub async fn generate_topology(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<GenerationReport>, ApiError> {
    state
        .client
        .find::<Topology>(&name)
        .await?
        .ok_or_else(|| ApiError::not_found("topology"))?;

    let _guard = state.generation.lock().await;
    let mut reports = fabric::generate_all(&state.client, &state.config.generator, Some(&name)).await?;
    match reports.pop() {
        Some(report) => Ok(Json(report)),
        None => Err(ApiError::bad_request(format!(
            "Generation of {} stopped early, see server logs",
            name
        ))),
    }
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub topology: String,
    pub ok: bool,
    pub findings: Vec<String>,
}

/// Compare a topology's element plan with its generated devices
pub async fn check_topology(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CheckResponse>, ApiError> {
    let topology: Topology = state.client.get(&name).await?;
    let findings = fabric::check_device_topology(&state.client, &topology).await?;
    Ok(Json(CheckResponse {
        topology: topology.name,
        ok: findings.is_empty(),
        findings,
    }))
}

/// Load the demo inventory (idempotent)
pub async fn seed_inventory(State(state): State<Arc<AppState>>) -> Result<Json<MessageResponse>, ApiError> {
    let _guard = state.generation.lock().await;
    seeds::seed(&state.client, &state.config.generator).await?;
    Ok(MessageResponse::new("Inventory seeded"))
}
