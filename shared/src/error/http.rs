//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::TicketNotFound
            | Self::AgentNotFound
            | Self::AssignmentNotFound
            | Self::SlaTrackingNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::TicketAlreadyAssigned
            | Self::InvalidAssignmentState
            | Self::AssignmentIsCurrent
            | Self::InvalidSlaState => StatusCode::CONFLICT,

            // 422 Unprocessable (agent cannot take the work right now)
            Self::AgentUnavailable | Self::AgentCapacityExceeded | Self::NoAvailableAgent => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            // 503 Service Unavailable (transient errors, client can retry)
            Self::SystemBusy => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::StorageFull
            | Self::OutOfMemory
            | Self::StorageCorrupted => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
