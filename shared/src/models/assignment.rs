//! Ticket Assignment Model (工单分配)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentType {
    Manual,
    Auto,
    Reassignment,
}

impl AssignmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Auto => "AUTO",
            Self::Reassignment => "REASSIGNMENT",
        }
    }
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment record status
///
/// At most one record per ticket is CURRENT; every other status is history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Current,
    Completed,
    Reassigned,
    Unassigned,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "CURRENT",
            Self::Completed => "COMPLETED",
            Self::Reassigned => "REASSIGNED",
            Self::Unassigned => "UNASSIGNED",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CURRENT" => Ok(Self::Current),
            "COMPLETED" => Ok(Self::Completed),
            "REASSIGNED" => Ok(Self::Reassigned),
            "UNASSIGNED" => Ok(Self::Unassigned),
            other => Err(format!("unknown assignment status: {other}")),
        }
    }
}

/// Who performed an assignment action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub username: String,
}

impl Operator {
    pub const SYSTEM_ID: &'static str = "system";

    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }

    /// The operator recorded on automatic assignments
    pub fn system() -> Self {
        Self::new(Self::SYSTEM_ID, "System")
    }
}

/// Assignment ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketAssignment {
    pub assignment_id: String,
    pub ticket_id: String,
    pub ticket_number: String,
    pub agent_id: String,
    pub agent_username: String,
    pub assigned_by: String,
    pub assigned_by_username: String,
    pub assignment_type: AssignmentType,
    /// Strategy that picked the agent (auto assignments only)
    pub strategy: Option<String>,
    pub previous_agent_id: Option<String>,
    pub previous_agent_username: Option<String>,
    pub reassignment_reason: Option<String>,
    pub status: AssignmentStatus,
    pub assigned_at: i64,
    pub completed_at: Option<i64>,
    pub unassigned_at: Option<i64>,
    pub unassigned_by: Option<String>,
    pub unassign_reason: Option<String>,
}

impl TicketAssignment {
    pub fn is_current(&self) -> bool {
        self.status == AssignmentStatus::Current
    }
}

/// Query filter for listing assignments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentFilter {
    pub agent_id: Option<String>,
    pub ticket_id: Option<String>,
    pub status: Option<AssignmentStatus>,
    pub assignment_type: Option<AssignmentType>,
    pub limit: Option<usize>,
}

impl AssignmentFilter {
    pub fn matches(&self, record: &TicketAssignment) -> bool {
        self.agent_id.as_ref().is_none_or(|a| *a == record.agent_id)
            && self.ticket_id.as_ref().is_none_or(|t| *t == record.ticket_id)
            && self.status.is_none_or(|s| s == record.status)
            && self
                .assignment_type
                .is_none_or(|t| t == record.assignment_type)
    }
}

/// Manual assign payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAssignRequest {
    pub ticket_id: String,
    pub agent_id: String,
    pub operator: Operator,
}

/// Force reassign payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignRequest {
    pub new_agent_id: String,
    pub reason: String,
    pub operator: Operator,
}

/// Unassign payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnassignRequest {
    pub reason: String,
    pub operator: Operator,
}

/// Bulk reassign payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkReassignRequest {
    pub from_agent_id: String,
    pub to_agent_id: String,
    pub reason: String,
    pub operator: Operator,
}

/// Per-ticket failure inside a bulk reassignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkReassignError {
    pub ticket_id: String,
    pub assignment_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkReassignResult {
    pub total_processed: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<BulkReassignError>,
}

/// Mismatch between an agent's active counter and its CURRENT records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadDrift {
    pub agent_id: String,
    pub active_tickets: u32,
    pub current_assignments: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(agent: &str, status: AssignmentStatus) -> TicketAssignment {
        TicketAssignment {
            assignment_id: "as-1".into(),
            ticket_id: "t-1".into(),
            ticket_number: "T-0001".into(),
            agent_id: agent.into(),
            agent_username: agent.into(),
            assigned_by: "admin".into(),
            assigned_by_username: "admin".into(),
            assignment_type: AssignmentType::Manual,
            strategy: None,
            previous_agent_id: None,
            previous_agent_username: None,
            reassignment_reason: None,
            status,
            assigned_at: 0,
            completed_at: None,
            unassigned_at: None,
            unassigned_by: None,
            unassign_reason: None,
        }
    }

    #[test]
    fn test_filter_matches() {
        let rec = record("a1", AssignmentStatus::Current);
        assert!(AssignmentFilter::default().matches(&rec));

        let filter = AssignmentFilter {
            agent_id: Some("a1".into()),
            status: Some(AssignmentStatus::Current),
            ..Default::default()
        };
        assert!(filter.matches(&rec));

        let filter = AssignmentFilter {
            status: Some(AssignmentStatus::Completed),
            ..Default::default()
        };
        assert!(!filter.matches(&rec));
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&AssignmentType::Reassignment).unwrap();
        assert_eq!(json, "\"REASSIGNMENT\"");
        assert_eq!(
            "reassigned".parse::<AssignmentStatus>().unwrap(),
            AssignmentStatus::Reassigned
        );
    }
}
