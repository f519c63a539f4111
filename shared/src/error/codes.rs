//! Unified error codes for the support desk
//!
//! This module defines all error codes used across desk-server and its API clients.
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Assignment errors
//! - 5xxx: SLA errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 4xxx: Assignment ====================
    /// Ticket not found
    TicketNotFound = 4001,
    /// Agent not found
    AgentNotFound = 4002,
    /// Assignment record not found
    AssignmentNotFound = 4003,
    /// Ticket already has a current assignment
    TicketAlreadyAssigned = 4004,
    /// Operation is not allowed for the assignment's status
    InvalidAssignmentState = 4005,
    /// Agent is offline
    AgentUnavailable = 4006,
    /// Agent has reached maximum capacity
    AgentCapacityExceeded = 4007,
    /// Current assignment must be unassigned before deletion
    AssignmentIsCurrent = 4008,
    /// No available agent for auto-assignment
    NoAvailableAgent = 4009,

    // ==================== 5xxx: SLA ====================
    /// SLA tracking record not found
    SlaTrackingNotFound = 5001,
    /// SLA rule is invalid
    SlaRuleInvalid = 5002,
    /// Operation is not allowed for the SLA status
    InvalidSlaState = 5003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,

    // ==================== 94xx: Storage ====================
    /// Storage full (disk space insufficient)
    StorageFull = 9401,
    /// Out of memory
    OutOfMemory = 9402,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
    /// System busy (IO error, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",

            // Assignment
            ErrorCode::TicketNotFound => "Ticket not found",
            ErrorCode::AgentNotFound => "Agent not found",
            ErrorCode::AssignmentNotFound => "Assignment not found",
            ErrorCode::TicketAlreadyAssigned => "Ticket already has a current assignment",
            ErrorCode::InvalidAssignmentState => "Operation not allowed for assignment status",
            ErrorCode::AgentUnavailable => "Agent is offline",
            ErrorCode::AgentCapacityExceeded => "Agent has reached maximum capacity",
            ErrorCode::AssignmentIsCurrent => "Cannot delete a current assignment",
            ErrorCode::NoAvailableAgent => "No available agent",

            // SLA
            ErrorCode::SlaTrackingNotFound => "SLA tracking not found",
            ErrorCode::SlaRuleInvalid => "SLA rule is invalid",
            ErrorCode::InvalidSlaState => "Operation not allowed for SLA status",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",

            // Storage
            ErrorCode::StorageFull => "Storage is full",
            ErrorCode::OutOfMemory => "Out of memory",
            ErrorCode::StorageCorrupted => "Storage is corrupted",
            ErrorCode::SystemBusy => "System is busy, please retry",
        }
    }
}

/// Error returned when converting an unknown u16 into [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),

            // Assignment
            4001 => Ok(ErrorCode::TicketNotFound),
            4002 => Ok(ErrorCode::AgentNotFound),
            4003 => Ok(ErrorCode::AssignmentNotFound),
            4004 => Ok(ErrorCode::TicketAlreadyAssigned),
            4005 => Ok(ErrorCode::InvalidAssignmentState),
            4006 => Ok(ErrorCode::AgentUnavailable),
            4007 => Ok(ErrorCode::AgentCapacityExceeded),
            4008 => Ok(ErrorCode::AssignmentIsCurrent),
            4009 => Ok(ErrorCode::NoAvailableAgent),

            // SLA
            5001 => Ok(ErrorCode::SlaTrackingNotFound),
            5002 => Ok(ErrorCode::SlaRuleInvalid),
            5003 => Ok(ErrorCode::InvalidSlaState),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),

            // Storage
            9401 => Ok(ErrorCode::StorageFull),
            9402 => Ok(ErrorCode::OutOfMemory),
            9403 => Ok(ErrorCode::StorageCorrupted),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::TicketNotFound.code(), 4001);
        assert_eq!(ErrorCode::AgentCapacityExceeded.code(), 4007);
        assert_eq!(ErrorCode::SlaTrackingNotFound.code(), 5001);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
        assert_eq!(ErrorCode::SystemBusy.code(), 9404);
    }

    #[test]
    fn test_try_from_matches_code() {
        let all = [
            ErrorCode::Success,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::TicketNotFound,
            ErrorCode::AgentNotFound,
            ErrorCode::AssignmentNotFound,
            ErrorCode::TicketAlreadyAssigned,
            ErrorCode::InvalidAssignmentState,
            ErrorCode::AgentUnavailable,
            ErrorCode::AgentCapacityExceeded,
            ErrorCode::AssignmentIsCurrent,
            ErrorCode::NoAvailableAgent,
            ErrorCode::SlaTrackingNotFound,
            ErrorCode::SlaRuleInvalid,
            ErrorCode::InvalidSlaState,
            ErrorCode::InternalError,
            ErrorCode::DatabaseError,
            ErrorCode::StorageFull,
            ErrorCode::OutOfMemory,
            ErrorCode::StorageCorrupted,
            ErrorCode::SystemBusy,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(1001), Err(InvalidErrorCode(1001)));
        assert_eq!(ErrorCode::try_from(10000), Err(InvalidErrorCode(10000)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::AgentUnavailable).unwrap();
        assert_eq!(json, "4006");

        let code: ErrorCode = serde_json::from_str("5001").unwrap();
        assert_eq!(code, ErrorCode::SlaTrackingNotFound);

        let result: Result<ErrorCode, _> = serde_json::from_str("4999");
        assert!(result.is_err());
    }

    #[test]
    fn test_display_and_message() {
        assert_eq!(format!("{}", ErrorCode::TicketNotFound), "4001");
        assert_eq!(ErrorCode::TicketNotFound.message(), "Ticket not found");
        assert_eq!(
            format!("{}", InvalidErrorCode(999)),
            "invalid error code: 999"
        );
    }
}
