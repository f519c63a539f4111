//! Agent API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use shared::models::{AgentRegister, AgentStatusUpdate, AgentWorkload, TicketAssignment};

use crate::api::AppResult;
use crate::core::ServerState;
use crate::utils::validation::{MAX_ID_LEN, MAX_NAME_LEN, validate_required_text};

/// 坐席详情 (工作量 + 当前分配)
#[derive(Debug, Serialize)]
pub struct AgentDetail {
    #[serde(flatten)]
    pub workload: AgentWorkload,
    pub capacity: u32,
    pub current_assignments: Vec<TicketAssignment>,
}

/// GET /api/agents - 获取所有坐席
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<AgentWorkload>>> {
    let agents = state.registry.list()?;
    Ok(Json(agents))
}

/// GET /api/agents/:id - 坐席工作量详情
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AgentDetail>> {
    let workload = state.registry.get(&id)?;
    let current_assignments = state.ledger.current_for_agent(&id)?;
    Ok(Json(AgentDetail {
        workload,
        capacity: state.registry.capacity(),
        current_assignments,
    }))
}

/// POST /api/agents - 注册坐席 (已存在则原样返回)
pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<AgentRegister>,
) -> AppResult<Json<AgentWorkload>> {
    validate_required_text(&payload.agent_id, "agent_id", MAX_ID_LEN)?;
    validate_required_text(&payload.username, "username", MAX_NAME_LEN)?;
    let agent = state.registry.register(&payload.agent_id, &payload.username)?;
    Ok(Json(agent))
}

/// PUT /api/agents/:id/status - 设置在线/离线
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<AgentStatusUpdate>,
) -> AppResult<Json<AgentWorkload>> {
    let agent = state.registry.set_status(&id, payload.status)?;
    Ok(Json(agent))
}
