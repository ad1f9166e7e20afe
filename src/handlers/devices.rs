use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::fabric::computed_link_description;
use crate::models::{BgpSession, Device, Interface};
use crate::AppState;

use super::ApiError;

/// List all generated devices
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = state.client.all::<Device>().await?;
    Ok(Json(devices))
}

#[derive(Serialize)]
pub struct InterfaceView {
    #[serde(flatten)]
    pub interface: Interface,
    pub link_description: String,
}

/// Interfaces of one device, with their computed link description
pub async fn list_device_interfaces(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<InterfaceView>>, ApiError> {
    let device: Device = state.client.get(&name).await?;
    let interfaces = state
        .client
        .filters::<Interface, _>(|i| i.device == device.id)
        .await?;

    let mut views = Vec::with_capacity(interfaces.len());
    for interface in interfaces {
        let link_description = computed_link_description(&state.client, &interface).await?;
        views.push(InterfaceView {
            interface,
            link_description,
        });
    }
    Ok(Json(views))
}

/// List all BGP sessions
pub async fn list_bgp_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Vec<BgpSession>>, ApiError> {
    let sessions = state.client.all::<BgpSession>().await?;
    Ok(Json(sessions))
}
