//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    infrastructure::dto::http::{DeliveryDto, HealthDto, ProposalStatusRequest},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
        connections: state.relay.connection_count().await,
    })
}

/// Push `proposal_updated` to every connection in a room of the order
pub async fn notify_proposal(
    State(state): State<Arc<AppState>>,
    Path((order_id, proposal_id)): Path<(String, String)>,
    Json(request): Json<ProposalStatusRequest>,
) -> Result<Json<DeliveryDto>, StatusCode> {
    if request.status.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state
        .relay
        .notify_proposal(&order_id, &proposal_id, &request.status)
        .await
    {
        Ok(delivered) => Ok(Json(DeliveryDto { delivered })),
        Err(e) => {
            tracing::error!("Failed to notify proposal {}: {}", proposal_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
