//! Assignment API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::error::ErrorCode;
use shared::models::{
    AssignmentFilter, BulkReassignRequest, BulkReassignResult, ManualAssignRequest,
    ReassignRequest, TicketAssignment, UnassignRequest, WorkloadDrift,
};

use crate::api::{AppError, AppResult};
use crate::assignment::AutoAssignOutcome;
use crate::core::ServerState;

/// GET /api/assignments - 按条件查询分配记录 (最新在前)
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<AssignmentFilter>,
) -> AppResult<Json<Vec<TicketAssignment>>> {
    let records = state.ledger.list(&filter)?;
    Ok(Json(records))
}

/// GET /api/assignments/:id - 获取单条分配记录
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<TicketAssignment>> {
    let record = state.ledger.get(&id)?;
    Ok(Json(record))
}

/// GET /api/assignments/ticket/:ticket_id - 工单分配历史 (最早在前)
pub async fn history_for_ticket(
    State(state): State<ServerState>,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<Vec<TicketAssignment>>> {
    let history = state.ledger.history_for_ticket(&ticket_id)?;
    Ok(Json(history))
}

/// POST /api/assignments - 手动分配
pub async fn manual_assign(
    State(state): State<ServerState>,
    Json(payload): Json<ManualAssignRequest>,
) -> AppResult<Json<TicketAssignment>> {
    let record =
        state
            .ledger
            .manual_assign(&payload.ticket_id, &payload.agent_id, &payload.operator)?;
    Ok(Json(record))
}

/// POST /api/assignments/auto/:ticket_id - 自动分配
///
/// 没有可用坐席时返回 NoAvailableAgent 错误；其余结果原样返回。
pub async fn auto_assign(
    State(state): State<ServerState>,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<AutoAssignOutcome>> {
    match state.ledger.auto_assign(&ticket_id)? {
        AutoAssignOutcome::NoAvailableAgent => {
            Err(AppError::new(ErrorCode::NoAvailableAgent).with_detail("ticket_id", ticket_id))
        }
        outcome => Ok(Json(outcome)),
    }
}

/// POST /api/assignments/:id/reassign - 强制改派
pub async fn reassign(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ReassignRequest>,
) -> AppResult<Json<TicketAssignment>> {
    let record = state.ledger.force_reassign(
        &id,
        &payload.new_agent_id,
        &payload.reason,
        &payload.operator,
    )?;
    Ok(Json(record))
}

/// POST /api/assignments/:id/unassign - 取消分配
pub async fn unassign(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<UnassignRequest>,
) -> AppResult<Json<TicketAssignment>> {
    let record = state
        .ledger
        .unassign(&id, &payload.reason, &payload.operator)?;
    Ok(Json(record))
}

/// POST /api/assignments/bulk-reassign - 批量改派
pub async fn bulk_reassign(
    State(state): State<ServerState>,
    Json(payload): Json<BulkReassignRequest>,
) -> AppResult<Json<BulkReassignResult>> {
    let result = state.ledger.bulk_reassign(
        &payload.from_agent_id,
        &payload.to_agent_id,
        &payload.reason,
        &payload.operator,
    )?;
    Ok(Json(result))
}

/// POST /api/assignments/ticket/:ticket_id/complete - 完成当前分配
pub async fn complete(
    State(state): State<ServerState>,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<Option<TicketAssignment>>> {
    let record = state.ledger.complete_assignment(&ticket_id)?;
    Ok(Json(record))
}

/// DELETE /api/assignments/:id - 删除非当前记录
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<bool>> {
    state.ledger.delete_record(&id)?;
    Ok(Json(true))
}

/// GET /api/assignments/audit - 坐席计数与 CURRENT 记录的差异
pub async fn audit(State(state): State<ServerState>) -> AppResult<Json<Vec<WorkloadDrift>>> {
    let drift = state.ledger.audit_workloads()?;
    Ok(Json(drift))
}
