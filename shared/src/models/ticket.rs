//! Ticket reference (工单引用)
//!
//! Ticket content lives in the ticket subsystem; the desk keeps only what routing
//! and SLA tracking need.

use super::sla::TicketPriority;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRef {
    pub ticket_id: String,
    pub ticket_number: String,
    pub priority: Option<TicketPriority>,
    pub category: Option<String>,
    pub received_at: i64,
    pub updated_at: i64,
}

/// Ticket created notification from the ticket subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCreated {
    pub ticket_id: String,
    pub ticket_number: String,
    pub priority: Option<TicketPriority>,
    pub category: Option<String>,
}

/// Priority set notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketPriorityUpdate {
    pub priority: TicketPriority,
}
