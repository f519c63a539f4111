//! SLA API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/sla", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/tracking/{ticket_id}", get(handler::get_tracking))
        .route("/tracking/{ticket_id}/pause", post(handler::pause))
        .route("/tracking/{ticket_id}/resume", post(handler::resume))
        .route("/compliance", get(handler::compliance))
        .route("/rules", get(handler::list_rules).put(handler::upsert_rule))
        .route("/sweep", post(handler::sweep))
}
