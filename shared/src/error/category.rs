//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// - 0xxx: General errors
/// - 4xxx: Assignment errors
/// - 5xxx: SLA errors
/// - 9xxx: System errors
///
/// Unused ranges fall back to General.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Assignment errors (4xxx)
    Assignment,
    /// SLA errors (5xxx)
    Sla,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            4000..5000 => Self::Assignment,
            5000..6000 => Self::Sla,
            9000.. => Self::System,
            _ => Self::General,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Assignment => "assignment",
            Self::Sla => "sla",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code(0), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(2), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(4001), ErrorCategory::Assignment);
        assert_eq!(ErrorCategory::from_code(5003), ErrorCategory::Sla);
        assert_eq!(ErrorCategory::from_code(9404), ErrorCategory::System);
        assert_eq!(ErrorCategory::from_code(7001), ErrorCategory::General);
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(
            ErrorCode::AgentUnavailable.category(),
            ErrorCategory::Assignment
        );
        assert_eq!(ErrorCode::SlaTrackingNotFound.category(), ErrorCategory::Sla);
        assert_eq!(ErrorCode::StorageFull.category(), ErrorCategory::System);
        assert_eq!(ErrorCode::Success.category().name(), "general");
    }
}
