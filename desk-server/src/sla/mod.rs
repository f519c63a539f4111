//! SLA 模块
//!
//! - [`resolver`]: rule lookup with lazily synthesized defaults
//! - [`tracker`]: per-ticket SLA state machine
//! - [`sweeper`]: periodic warning/breach detection

pub mod resolver;
pub mod sweeper;
pub mod tracker;

pub use resolver::SlaRuleResolver;
pub use sweeper::{SlaBreachSweeper, SweepReport};
pub use tracker::SlaTracker;

use shared::message::{DeskEvent, SlaBreachPayload, SlaWarningPayload};
use shared::models::{SlaAxis, SlaTracking};
use shared::util::{minutes_between, round2};

fn due_at(tracking: &SlaTracking, axis: SlaAxis) -> i64 {
    match axis {
        SlaAxis::Response => tracking.response_due_at,
        SlaAxis::Resolution => tracking.resolution_due_at,
    }
}

pub(crate) fn breach_event(tracking: &SlaTracking, axis: SlaAxis, now: i64) -> DeskEvent {
    let due = due_at(tracking, axis);
    DeskEvent::SlaBreach(SlaBreachPayload {
        tracking_id: tracking.tracking_id.clone(),
        ticket_id: tracking.ticket_id.clone(),
        breach_type: axis,
        due_at: due,
        breached_at: tracking.breached_at.unwrap_or(now),
        minutes_overdue: minutes_between(due, now).max(0),
        breach_reason: axis.breach_reason().to_string(),
        assigned_agent_id: tracking.assigned_agent_id.clone(),
        assigned_agent_username: tracking.assigned_agent_username.clone(),
    })
}

pub(crate) fn warning_event(tracking: &SlaTracking, axis: SlaAxis, now: i64) -> DeskEvent {
    let due = due_at(tracking, axis);
    DeskEvent::SlaWarning(SlaWarningPayload {
        tracking_id: tracking.tracking_id.clone(),
        ticket_id: tracking.ticket_id.clone(),
        warning_type: axis,
        due_at: due,
        minutes_remaining: minutes_between(now, due).max(0),
        percentage_time_used: round2(tracking.elapsed_fraction(due, now) * 100.0),
        assigned_agent_id: tracking.assigned_agent_id.clone(),
        assigned_agent_username: tracking.assigned_agent_username.clone(),
    })
}
