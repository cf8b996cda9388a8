//! account-gateway: HTTP adapter in front of the account gate
//!
//! The chat host posts every inbound event to `/events` and follows the
//! returned action. Replies the bot is about to send go through `/replies`
//! so the low-quota note can be appended.

use account_rs::{AccessGate, InboundEvent, Outcome};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Shared state for all handlers
pub struct AppState {
    pub gate: AccessGate,
}

impl AppState {
    pub fn new(gate: AccessGate) -> Arc<Self> {
        Arc::new(Self { gate })
    }
}

/// Body of `POST /replies`
#[derive(Debug, Deserialize)]
pub struct DecorateRequest {
    pub event: InboundEvent,
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecorateResponse {
    pub reply: String,
}

/// Build the Axum router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(handle_event))
        .route("/replies", post(decorate_reply))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check; reports unhealthy when the store cannot be queried
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.gate.store().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "service": "account-gateway",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "service": "account-gateway",
                    "error": "storage unavailable"
                })),
            )
        }
    }
}

async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InboundEvent>,
) -> Json<Outcome> {
    debug!("Event from {} (group {:?})", event.sender_id, event.group_id);
    Json(state.gate.handle(&event).await)
}

async fn decorate_reply(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DecorateRequest>,
) -> Json<DecorateResponse> {
    let reply = state
        .gate
        .decorate_reply(&request.event, &request.reply)
        .await;
    Json(DecorateResponse { reply })
}
