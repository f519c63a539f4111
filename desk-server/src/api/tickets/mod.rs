//! Ticket intake API 模块
//!
//! 工单子系统通过这些接口通知创建、优先级、首次响应和解决。

mod handler;

use axum::{
    Router,
    routing::{post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/tickets", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::created))
        .route("/{id}/priority", put(handler::set_priority))
        .route("/{id}/first-response", post(handler::first_response))
        .route("/{id}/resolve", post(handler::resolve))
}
