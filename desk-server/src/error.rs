//! Engine errors and their mapping onto the shared error codes

use crate::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Engine errors
#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Assignment not found: {0}")]
    AssignmentNotFound(String),

    #[error("SLA tracking not found for ticket: {0}")]
    TrackingNotFound(String),

    /// Ticket already has a CURRENT assignment
    #[error("Ticket {0} already has a current assignment")]
    AlreadyAssigned(String),

    /// Operation illegal for the record's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// CURRENT records must be unassigned before deletion
    #[error("Assignment {0} is current, unassign it first")]
    AssignmentIsCurrent(String),

    #[error("Invalid SLA state: {0}")]
    InvalidSlaState(String),

    #[error("Agent {agent_id} is offline")]
    AgentUnavailable { agent_id: String },

    #[error("Agent {agent_id} has reached maximum capacity ({active}/{capacity})")]
    CapacityExceeded {
        agent_id: String,
        active: u32,
        capacity: u32,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type DeskResult<T> = Result<T, DeskError>;

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if let StorageError::Serialization(_) = e {
        return ErrorCode::InternalError;
    }

    // redb 错误通过字符串匹配分类
    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    if err_str.contains("out of memory") || err_str.contains("cannot allocate") {
        return ErrorCode::OutOfMemory;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    ErrorCode::SystemBusy
}

impl From<DeskError> for AppError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::Storage(e) => {
                tracing::error!(error = %e, "Desk storage failure");
                AppError::new(classify_storage_error(&e))
            }
            DeskError::TicketNotFound(id) => {
                AppError::new(ErrorCode::TicketNotFound).with_detail("ticket_id", id)
            }
            DeskError::AgentNotFound(id) => {
                AppError::new(ErrorCode::AgentNotFound).with_detail("agent_id", id)
            }
            DeskError::AssignmentNotFound(id) => {
                AppError::new(ErrorCode::AssignmentNotFound).with_detail("assignment_id", id)
            }
            DeskError::TrackingNotFound(id) => {
                AppError::new(ErrorCode::SlaTrackingNotFound).with_detail("ticket_id", id)
            }
            e @ DeskError::AlreadyAssigned(_) => {
                AppError::with_message(ErrorCode::TicketAlreadyAssigned, e.to_string())
            }
            DeskError::InvalidState(msg) => {
                AppError::with_message(ErrorCode::InvalidAssignmentState, msg)
            }
            DeskError::AssignmentIsCurrent(id) => {
                AppError::new(ErrorCode::AssignmentIsCurrent).with_detail("assignment_id", id)
            }
            DeskError::InvalidSlaState(msg) => AppError::with_message(ErrorCode::InvalidSlaState, msg),
            DeskError::AgentUnavailable { agent_id } => {
                AppError::new(ErrorCode::AgentUnavailable).with_detail("agent_id", agent_id)
            }
            DeskError::CapacityExceeded {
                agent_id,
                active,
                capacity,
            } => AppError::with_message(
                ErrorCode::AgentCapacityExceeded,
                format!("Agent {agent_id} has reached maximum capacity ({active}/{capacity})"),
            )
            .with_detail("agent_id", agent_id)
            .with_detail("active_tickets", active)
            .with_detail("capacity", capacity),
            DeskError::Validation(msg) => AppError::validation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_error_carries_counters() {
        let err: AppError = DeskError::CapacityExceeded {
            agent_id: "a1".into(),
            active: 5,
            capacity: 5,
        }
        .into();

        assert_eq!(err.code, ErrorCode::AgentCapacityExceeded);
        assert_eq!(
            err.message,
            "Agent a1 has reached maximum capacity (5/5)"
        );
        let details = err.details.unwrap();
        assert_eq!(details.get("active_tickets").unwrap(), 5);
    }

    #[test]
    fn test_not_found_mapping() {
        let err: AppError = DeskError::AssignmentNotFound("as-9".into()).into();
        assert_eq!(err.code, ErrorCode::AssignmentNotFound);
        assert_eq!(err.http_status(), http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_mapping() {
        let err: AppError = DeskError::Validation("reason is required".into()).into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.message, "reason is required");
    }

    #[test]
    fn test_serialization_failure_is_internal() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: AppError = DeskError::Storage(StorageError::Serialization(json_err)).into();
        assert_eq!(err.code, ErrorCode::InternalError);
    }
}
