//! Shared types for the support desk
//!
//! Domain models, notification events, the unified error system and small
//! time/id helpers used by desk-server and its clients.

pub mod error;
pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use message::DeskEvent;
