//! Assignment API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/assignments", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::manual_assign))
        .route("/auto/{ticket_id}", post(handler::auto_assign))
        .route("/bulk-reassign", post(handler::bulk_reassign))
        .route("/audit", get(handler::audit))
        .route("/ticket/{ticket_id}", get(handler::history_for_ticket))
        .route("/ticket/{ticket_id}/complete", post(handler::complete))
        .route("/{id}", get(handler::get_by_id).delete(handler::delete))
        .route("/{id}/reassign", post(handler::reassign))
        .route("/{id}/unassign", post(handler::unassign))
}
