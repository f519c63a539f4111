//! 健康检查路由
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/health | GET | 健康检查 + 存储统计 |
//!
//! # 响应示例
//!
//! ```json
//! {
//!   "status": "ok",
//!   "version": "0.1.0",
//!   "uptime_seconds": 42,
//!   "strategy": "least_loaded",
//!   "auto_assign_enabled": true,
//!   "sweep_running": false,
//!   "storage": { "status": "ok", "latency_ms": 0, "stats": { "agent_count": 3 } }
//! }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::time::Instant;

use crate::core::ServerState;
use crate::storage::StorageStats;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// 状态 (ok | error)
    status: &'static str,
    version: &'static str,
    /// 运行时间 (秒)
    uptime_seconds: u64,
    strategy: &'static str,
    auto_assign_enabled: bool,
    sweep_running: bool,
    storage: StorageCheck,
}

/// 存储检查结果
#[derive(Serialize)]
pub struct StorageCheck {
    status: &'static str,
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<StorageStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// GET /api/health
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let started = Instant::now();
    let storage = match state.storage.get_stats() {
        Ok(stats) => StorageCheck {
            status: "ok",
            latency_ms: Some(started.elapsed().as_millis() as u64),
            stats: Some(stats),
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Health check: storage unavailable");
            StorageCheck {
                status: "error",
                latency_ms: None,
                stats: None,
                message: Some(e.to_string()),
            }
        }
    };

    Json(HealthResponse {
        status: if storage.status == "ok" { "ok" } else { "error" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        strategy: state.ledger.strategy_name(),
        auto_assign_enabled: state.ledger.auto_assign_enabled(),
        sweep_running: state.sweeper.is_running(),
        storage,
    })
}
