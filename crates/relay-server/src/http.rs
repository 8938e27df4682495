//! Plain HTTP surfaces next to the WebSocket endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use relay_core::messages::{CommandState, DeviceCommand};
use relay_core::{DeviceId, RelayError};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::registry::ConnectionRegistry;
use crate::server::AppState;

pub const BANNER: &str = "relay is running";

/// `/health` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub devices: usize,
    pub observers: usize,
}

pub fn health_check(started_at: Instant, registry: &ConnectionRegistry) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: started_at.elapsed().as_secs(),
        devices: registry.device_count(),
        observers: registry.observer_count(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LedQuery {
    pub id: Option<String>,
    pub state: Option<String>,
}

impl LedQuery {
    /// Validated before anything reaches the router.
    pub fn into_command(self) -> Result<DeviceCommand, RelayError> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RelayError::InvalidCommand("missing id".into()))?;
        let target = DeviceId::parse(&id)?;
        let state: CommandState = self.state.as_deref().unwrap_or_default().parse()?;
        Ok(DeviceCommand::new(target, state))
    }
}

/// HTTP status for a command outcome.
pub fn status_for(err: &RelayError) -> StatusCode {
    match err {
        RelayError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        RelayError::Undeliverable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::InvalidCommand(_) | RelayError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
    }
}

pub(crate) async fn index_handler() -> &'static str {
    BANNER
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(health_check(state.started_at, state.router.registry()))
}

pub(crate) async fn devices_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ids: Vec<String> = state
        .router
        .registry()
        .device_ids()
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    Json(ids)
}

pub(crate) async fn led_handler(
    State(state): State<AppState>,
    Query(query): Query<LedQuery>,
) -> (StatusCode, String) {
    let cmd = match query.into_command() {
        Ok(cmd) => cmd,
        Err(e) => return (status_for(&e), e.to_string()),
    };
    match state.router.deliver_command(&cmd) {
        Ok(()) => (
            StatusCode::OK,
            format!("Sent {} to {}", cmd.state.wire(), cmd.target),
        ),
        Err(e) => (status_for(&e), e.to_string()),
    }
}
