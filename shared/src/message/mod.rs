//! 通知事件定义
//!
//! Events produced by the desk engine for the downstream notification consumer.
//! Delivery is fire-and-forget: at most once, no acknowledgement.

use crate::models::{AssignmentType, SlaAxis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketAssignedPayload {
    pub ticket_id: String,
    pub ticket_number: String,
    pub agent_id: String,
    pub agent_username: String,
    pub assigned_by: String,
    pub assigned_by_username: String,
    pub assignment_type: AssignmentType,
    pub assigned_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaWarningPayload {
    pub tracking_id: String,
    pub ticket_id: String,
    pub warning_type: SlaAxis,
    pub due_at: i64,
    pub minutes_remaining: i64,
    /// 0..=100, rounded to 2 decimals
    pub percentage_time_used: f64,
    pub assigned_agent_id: Option<String>,
    pub assigned_agent_username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaBreachPayload {
    pub tracking_id: String,
    pub ticket_id: String,
    pub breach_type: SlaAxis,
    pub due_at: i64,
    pub breached_at: i64,
    pub minutes_overdue: i64,
    pub breach_reason: String,
    pub assigned_agent_id: Option<String>,
    pub assigned_agent_username: Option<String>,
}

/// Notification event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DeskEvent {
    TicketAssigned(TicketAssignedPayload),
    SlaWarning(SlaWarningPayload),
    SlaBreach(SlaBreachPayload),
}

impl DeskEvent {
    pub fn ticket_id(&self) -> &str {
        match self {
            Self::TicketAssigned(p) => &p.ticket_id,
            Self::SlaWarning(p) => &p.ticket_id,
            Self::SlaBreach(p) => &p.ticket_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TicketAssigned(_) => "ticket_assigned",
            Self::SlaWarning(_) => "sla_warning",
            Self::SlaBreach(_) => "sla_breach",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = DeskEvent::SlaBreach(SlaBreachPayload {
            tracking_id: "trk-1".into(),
            ticket_id: "t-1".into(),
            breach_type: SlaAxis::Response,
            due_at: 900_000,
            breached_at: 960_000,
            minutes_overdue: 1,
            breach_reason: "Response SLA exceeded".into(),
            assigned_agent_id: None,
            assigned_agent_username: None,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "sla_breach");
        assert_eq!(json["data"]["breach_type"], "response");
        assert_eq!(event.ticket_id(), "t-1");
        assert_eq!(event.kind(), "sla_breach");
    }
}
