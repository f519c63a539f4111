//! API 路由模块
//!
//! Thin JSON wrapper over the engine. Handlers translate [`DeskError`] into
//! [`AppError`] through `?`; nothing here holds business rules.
//!
//! # 结构
//!
//! - [`assignments`] - 分配记录 (manual/auto/reassign/unassign/bulk)
//! - [`agents`] - 坐席注册与状态
//! - [`tickets`] - 工单子系统回调入口
//! - [`sla`] - SLA 跟踪、规则与巡检
//! - [`health`] - 健康检查
//!
//! [`DeskError`]: crate::error::DeskError
//! [`AppError`]: shared::error::AppError

use axum::Router;
use http::{HeaderName, HeaderValue};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

pub mod agents;
pub mod assignments;
pub mod health;
pub mod sla;
pub mod tickets;

pub use crate::utils::{AppError, AppResult};

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(assignments::router())
        .merge(agents::router())
        .merge(tickets::router())
        .merge(sla::router())
        .merge(health::router())
        .fallback(route_not_found)
}

async fn route_not_found(uri: http::Uri) -> AppError {
    AppError::not_found(format!("Route {}", uri.path()))
}

/// Build the application with middleware; state is attached by the caller
pub fn build_app() -> Router<ServerState> {
    build_router()
        // Trace - Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
}
