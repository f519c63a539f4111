//! Input validation helpers
//!
//! Centralized text length constants and validation functions shared by the
//! ledger, the intake boundary and the HTTP handlers.

use crate::error::{DeskError, DeskResult};

/// Ids: ticket, agent, assignment
pub const MAX_ID_LEN: usize = 128;

/// Display names: usernames, ticket numbers, categories
pub const MAX_NAME_LEN: usize = 200;

/// Reassignment / unassignment reasons
pub const MAX_REASON_LEN: usize = 500;

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> DeskResult<()> {
    if value.trim().is_empty() {
        return Err(DeskError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(DeskError::Validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(value: Option<&str>, field: &str, max_len: usize) -> DeskResult<()> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(DeskError::Validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("agent-1", "agent_id", MAX_ID_LEN).is_ok());
        assert!(matches!(
            validate_required_text("   ", "reason", MAX_REASON_LEN),
            Err(DeskError::Validation(msg)) if msg == "reason must not be empty"
        ));
        assert!(validate_required_text(&"x".repeat(129), "agent_id", MAX_ID_LEN).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert!(validate_optional_text(None, "reason", MAX_REASON_LEN).is_ok());
        assert!(validate_optional_text(Some("short"), "reason", MAX_REASON_LEN).is_ok());
        assert!(validate_optional_text(Some(&"x".repeat(501)), "reason", MAX_REASON_LEN).is_err());
    }
}
