//! SLA API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use shared::models::{SlaComplianceSummary, SlaRule, SlaRuleUpsert, SlaTracking};

use crate::api::{AppError, AppResult};
use crate::core::ServerState;
use crate::sla::SweepReport;

/// 手动巡检结果
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    /// false 表示已有巡检在运行，本次跳过
    pub ran: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SweepReport>,
}

/// GET /api/sla/tracking/:ticket_id - 获取 SLA 跟踪
pub async fn get_tracking(
    State(state): State<ServerState>,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<SlaTracking>> {
    let tracking = state.tracker.get(&ticket_id)?;
    Ok(Json(tracking))
}

/// POST /api/sla/tracking/:ticket_id/pause - 暂停 (到期时间不顺延)
pub async fn pause(
    State(state): State<ServerState>,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<SlaTracking>> {
    let tracking = state.tracker.pause(&ticket_id)?;
    Ok(Json(tracking))
}

/// POST /api/sla/tracking/:ticket_id/resume - 恢复
pub async fn resume(
    State(state): State<ServerState>,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<SlaTracking>> {
    let tracking = state.tracker.resume(&ticket_id)?;
    Ok(Json(tracking))
}

/// GET /api/sla/compliance - 达标率汇总
pub async fn compliance(
    State(state): State<ServerState>,
) -> AppResult<Json<SlaComplianceSummary>> {
    let summary = state.tracker.compliance_summary()?;
    Ok(Json(summary))
}

/// GET /api/sla/rules - 获取所有规则
pub async fn list_rules(State(state): State<ServerState>) -> AppResult<Json<Vec<SlaRule>>> {
    let rules = state.resolver.list_rules()?;
    Ok(Json(rules))
}

/// PUT /api/sla/rules - 创建或替换规则
pub async fn upsert_rule(
    State(state): State<ServerState>,
    Json(payload): Json<SlaRuleUpsert>,
) -> AppResult<Json<SlaRule>> {
    let rule = state.resolver.upsert_rule(payload)?;
    Ok(Json(rule))
}

/// POST /api/sla/sweep - 立即执行一次巡检
pub async fn sweep(State(state): State<ServerState>) -> AppResult<Json<SweepResponse>> {
    let sweeper = state.sweeper.clone();
    let report = tokio::task::spawn_blocking(move || sweeper.sweep())
        .await
        .map_err(|e| AppError::internal(format!("Sweep task failed: {e}")))?;
    Ok(Json(SweepResponse {
        ran: report.is_some(),
        report,
    }))
}
