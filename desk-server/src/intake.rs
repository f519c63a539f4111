//! TicketIntake - 工单子系统入口
//!
//! The ticket subsystem owns ticket content. It tells the desk when a ticket is
//! created, when its priority is set, and when it is answered or resolved; the
//! desk keeps a [`TicketRef`] and drives SLA tracking and assignment from there.

use crate::assignment::{AssignmentLedger, AutoAssignOutcome};
use crate::error::{DeskError, DeskResult};
use crate::sla::SlaTracker;
use crate::storage::{DeskStorage, StorageError};
use crate::utils::validation::{MAX_ID_LEN, MAX_NAME_LEN, validate_optional_text, validate_required_text};
use serde::Serialize;
use shared::models::{SlaTracking, TicketAssignment, TicketCreated, TicketPriority, TicketRef};
use shared::util::now_millis;
use std::sync::Arc;

/// Result of registering a new ticket
#[derive(Debug, Clone, Serialize)]
pub struct TicketIntakeResult {
    pub ticket: TicketRef,
    pub tracking: Option<SlaTracking>,
    pub auto_assign: AutoAssignOutcome,
}

/// Result of resolving a ticket
#[derive(Debug, Clone, Serialize)]
pub struct TicketResolution {
    pub assignment: Option<TicketAssignment>,
    pub tracking: Option<SlaTracking>,
}

#[derive(Debug, Clone)]
pub struct TicketIntake {
    storage: DeskStorage,
    tracker: SlaTracker,
    ledger: Arc<AssignmentLedger>,
}

impl TicketIntake {
    pub fn new(storage: DeskStorage, tracker: SlaTracker, ledger: Arc<AssignmentLedger>) -> Self {
        Self {
            storage,
            tracker,
            ledger,
        }
    }

    fn ensure_ticket(&self, ticket_id: &str) -> DeskResult<TicketRef> {
        self.storage
            .get_ticket(ticket_id)?
            .ok_or_else(|| DeskError::TicketNotFound(ticket_id.to_string()))
    }

    /// Store the reference, start SLA tracking when a priority is known, then
    /// try auto-assignment. Re-sending a known ticket keeps its first receipt
    /// time, and its priority and category when the new request omits them.
    pub fn ticket_created(&self, req: TicketCreated) -> DeskResult<TicketIntakeResult> {
        validate_required_text(&req.ticket_id, "ticket_id", MAX_ID_LEN)?;
        validate_required_text(&req.ticket_number, "ticket_number", MAX_NAME_LEN)?;
        validate_optional_text(req.category.as_deref(), "category", MAX_NAME_LEN)?;

        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let existing = self.storage.get_ticket_txn(&txn, &req.ticket_id)?;
        let (received_at, priority, category) = match existing {
            Some(existing) => (
                existing.received_at,
                req.priority.or(existing.priority),
                req.category.or(existing.category),
            ),
            None => (now, req.priority, req.category),
        };
        let ticket = TicketRef {
            ticket_id: req.ticket_id,
            ticket_number: req.ticket_number,
            priority,
            category,
            received_at,
            updated_at: now,
        };
        self.storage.store_ticket(&txn, &ticket)?;
        let tracking = self.tracker.create_in(
            &txn,
            &ticket.ticket_id,
            ticket.priority,
            ticket.category.as_deref(),
            now,
        )?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            ticket_id = %ticket.ticket_id,
            ticket_number = %ticket.ticket_number,
            priority = ?ticket.priority,
            "Ticket received"
        );

        let auto_assign = self.ledger.auto_assign(&ticket.ticket_id)?;
        Ok(TicketIntakeResult {
            ticket,
            tracking,
            auto_assign,
        })
    }

    /// Record the priority. An existing tracker keeps its original due times.
    pub fn priority_set(
        &self,
        ticket_id: &str,
        priority: TicketPriority,
    ) -> DeskResult<Option<SlaTracking>> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let mut ticket = self
            .storage
            .get_ticket_txn(&txn, ticket_id)?
            .ok_or_else(|| DeskError::TicketNotFound(ticket_id.to_string()))?;

        ticket.priority = Some(priority);
        ticket.updated_at = now;
        self.storage.store_ticket(&txn, &ticket)?;
        let tracking = self.tracker.create_in(
            &txn,
            ticket_id,
            Some(priority),
            ticket.category.as_deref(),
            now,
        )?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(ticket_id = %ticket_id, priority = %priority, "Ticket priority set");
        Ok(tracking)
    }

    pub fn first_response(&self, ticket_id: &str) -> DeskResult<Option<SlaTracking>> {
        self.ensure_ticket(ticket_id)?;
        self.tracker.record_first_response(ticket_id)
    }

    /// Close the SLA timer and complete the CURRENT assignment in one transaction
    pub fn resolved(&self, ticket_id: &str) -> DeskResult<TicketResolution> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        if self.storage.get_ticket_txn(&txn, ticket_id)?.is_none() {
            return Err(DeskError::TicketNotFound(ticket_id.to_string()));
        }

        let mut outbox = Vec::new();
        let assignment = self.ledger.complete_assignment_in(&txn, ticket_id, now)?;
        let tracking = self
            .tracker
            .record_resolution_in(&txn, ticket_id, now, &mut outbox)?;
        txn.commit().map_err(StorageError::from)?;
        self.tracker.publish_all(outbox);

        tracing::info!(
            ticket_id = %ticket_id,
            completed_assignment = assignment.is_some(),
            "Ticket resolved"
        );
        Ok(TicketResolution {
            assignment,
            tracking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::LeastLoadedStrategy;
    use crate::events::EventBus;
    use crate::sla::SlaRuleResolver;
    use crate::workload::AgentWorkloadRegistry;
    use shared::models::{AssignmentStatus, SlaStatus};

    struct Fixture {
        intake: TicketIntake,
        registry: AgentWorkloadRegistry,
        tracker: SlaTracker,
    }

    fn fixture() -> Fixture {
        let storage = DeskStorage::open_in_memory().unwrap();
        let events = EventBus::new();
        let registry = AgentWorkloadRegistry::new(storage.clone(), 10);
        let tracker = SlaTracker::new(
            storage.clone(),
            SlaRuleResolver::new(storage.clone()),
            events.clone(),
            0.8,
        );
        let ledger = Arc::new(AssignmentLedger::new(
            storage.clone(),
            registry.clone(),
            Box::new(LeastLoadedStrategy),
            tracker.clone(),
            events,
            true,
        ));
        Fixture {
            intake: TicketIntake::new(storage, tracker.clone(), ledger),
            registry,
            tracker,
        }
    }

    fn created(ticket_id: &str, priority: Option<TicketPriority>) -> TicketCreated {
        TicketCreated {
            ticket_id: ticket_id.into(),
            ticket_number: format!("T-{ticket_id}"),
            priority,
            category: None,
        }
    }

    #[test]
    fn test_created_with_priority_tracks_and_assigns() {
        let f = fixture();
        f.registry.register("alice", "alice").unwrap();

        let result = f
            .intake
            .ticket_created(created("t1", Some(TicketPriority::Critical)))
            .unwrap();
        let tracking = result.tracking.unwrap();
        assert_eq!(tracking.status, SlaStatus::OnTime);

        let AutoAssignOutcome::Assigned(record) = result.auto_assign else {
            panic!("expected auto assignment");
        };
        assert_eq!(record.agent_id, "alice");
        assert_eq!(
            f.tracker.get("t1").unwrap().assigned_agent_id.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_priority_set_starts_tracking_once() {
        let f = fixture();
        let result = f.intake.ticket_created(created("t1", None)).unwrap();
        assert!(result.tracking.is_none());
        assert_eq!(result.auto_assign, AutoAssignOutcome::NoAvailableAgent);

        let first = f
            .intake
            .priority_set("t1", TicketPriority::High)
            .unwrap()
            .unwrap();
        let second = f
            .intake
            .priority_set("t1", TicketPriority::Critical)
            .unwrap()
            .unwrap();
        assert_eq!(first.resolution_due_at, second.resolution_due_at);
        assert_eq!(second.priority, TicketPriority::High);

        assert!(matches!(
            f.intake.priority_set("ghost", TicketPriority::Low),
            Err(DeskError::TicketNotFound(_))
        ));
    }

    #[test]
    fn test_resolved_completes_assignment_and_tracker() {
        let f = fixture();
        f.registry.register("alice", "alice").unwrap();
        f.intake
            .ticket_created(created("t1", Some(TicketPriority::Low)))
            .unwrap();
        f.intake.first_response("t1").unwrap();

        let resolution = f.intake.resolved("t1").unwrap();
        assert_eq!(
            resolution.assignment.unwrap().status,
            AssignmentStatus::Completed
        );
        assert_eq!(resolution.tracking.unwrap().status, SlaStatus::Met);

        let agent = f.registry.get("alice").unwrap();
        assert_eq!(agent.active_tickets, 0);
        assert_eq!(agent.completed_tickets, 1);
    }

    #[test]
    fn test_resend_keeps_known_fields() {
        let f = fixture();
        let mut first = created("t1", Some(TicketPriority::High));
        first.category = Some("billing".into());
        let original = f.intake.ticket_created(first).unwrap().ticket;

        let again = f.intake.ticket_created(created("t1", None)).unwrap();
        assert_eq!(again.ticket.priority, Some(TicketPriority::High));
        assert_eq!(again.ticket.category.as_deref(), Some("billing"));
        assert_eq!(again.ticket.received_at, original.received_at);
        assert_eq!(again.tracking.unwrap().priority, TicketPriority::High);
    }

    #[test]
    fn test_unknown_ticket() {
        let f = fixture();
        assert!(matches!(
            f.intake.first_response("ghost"),
            Err(DeskError::TicketNotFound(_))
        ));
        assert!(matches!(
            f.intake.resolved("ghost"),
            Err(DeskError::TicketNotFound(_))
        ));
    }

    #[test]
    fn test_created_validation() {
        let f = fixture();
        assert!(matches!(
            f.intake.ticket_created(created("", Some(TicketPriority::Low))),
            Err(DeskError::Validation(_))
        ));
    }
}
