//! Ticket intake API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::{SlaTracking, TicketCreated, TicketPriorityUpdate};

use crate::api::AppResult;
use crate::core::ServerState;
use crate::intake::{TicketIntakeResult, TicketResolution};

/// POST /api/tickets - 新工单
pub async fn created(
    State(state): State<ServerState>,
    Json(payload): Json<TicketCreated>,
) -> AppResult<Json<TicketIntakeResult>> {
    let result = state.intake.ticket_created(payload)?;
    Ok(Json(result))
}

/// PUT /api/tickets/:id/priority - 设置优先级 (首次设置时开始 SLA 跟踪)
pub async fn set_priority(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<TicketPriorityUpdate>,
) -> AppResult<Json<Option<SlaTracking>>> {
    let tracking = state.intake.priority_set(&id, payload.priority)?;
    Ok(Json(tracking))
}

/// POST /api/tickets/:id/first-response - 记录首次响应
pub async fn first_response(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Option<SlaTracking>>> {
    let tracking = state.intake.first_response(&id)?;
    Ok(Json(tracking))
}

/// POST /api/tickets/:id/resolve - 工单已解决
pub async fn resolve(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<TicketResolution>> {
    let resolution = state.intake.resolved(&id)?;
    Ok(Json(resolution))
}
