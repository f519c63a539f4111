//! AssignmentLedger - 工单分配台账
//!
//! Owns the assignment lifecycle. Every operation that touches an agent's
//! counters and an assignment record runs in one redb write transaction, so the
//! two never disagree on disk.
//!
//! # Operation Flow
//!
//! ```text
//! manual_assign / auto_assign / force_reassign / unassign / complete
//!     ├─ 1. Begin write transaction
//!     ├─ 2. Load ticket, records and agents inside the transaction
//!     ├─ 3. Validate (state, OFFLINE, capacity)
//!     ├─ 4. Write records, CURRENT index and agent counters
//!     ├─ 5. Mirror the agent onto the SLA tracker
//!     ├─ 6. Commit
//!     └─ 7. Publish events
//! ```
//!
//! The `current_assignments` index maps each ticket to its single CURRENT record.
//! It is written only here, alongside the record status, which makes "at most one
//! CURRENT record per ticket" a property of the write path.

use super::strategy::AssignmentStrategy;
use crate::error::{DeskError, DeskResult};
use crate::events::EventBus;
use crate::sla::SlaTracker;
use crate::storage::{DeskStorage, StorageError};
use crate::utils::validation::{
    MAX_ID_LEN, MAX_REASON_LEN, validate_required_text,
};
use crate::workload::AgentWorkloadRegistry;
use redb::WriteTransaction;
use serde::Serialize;
use shared::message::{DeskEvent, TicketAssignedPayload};
use shared::models::{
    AgentWorkload, AssignmentFilter, AssignmentStatus, AssignmentType, BulkReassignError,
    BulkReassignResult, Operator, TicketAssignment, TicketRef, WorkloadDrift,
};
use shared::util::{new_id, now_millis};
use std::collections::HashMap;

/// Upper bound on REASSIGNED → CURRENT resolution hops in `unassign`
const MAX_RESOLVE_HOPS: usize = 4;

/// What `auto_assign` did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "assignment", rename_all = "snake_case")]
pub enum AutoAssignOutcome {
    Assigned(TicketAssignment),
    Disabled,
    AlreadyAssigned,
    NoAvailableAgent,
}

pub struct AssignmentLedger {
    storage: DeskStorage,
    registry: AgentWorkloadRegistry,
    strategy: Box<dyn AssignmentStrategy>,
    tracker: SlaTracker,
    events: EventBus,
    auto_assign_enabled: bool,
}

impl std::fmt::Debug for AssignmentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentLedger")
            .field("strategy", &self.strategy.name())
            .field("capacity", &self.registry.capacity())
            .field("auto_assign_enabled", &self.auto_assign_enabled)
            .finish_non_exhaustive()
    }
}

impl AssignmentLedger {
    pub fn new(
        storage: DeskStorage,
        registry: AgentWorkloadRegistry,
        strategy: Box<dyn AssignmentStrategy>,
        tracker: SlaTracker,
        events: EventBus,
        auto_assign_enabled: bool,
    ) -> Self {
        Self {
            storage,
            registry,
            strategy,
            tracker,
            events,
            auto_assign_enabled,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn auto_assign_enabled(&self) -> bool {
        self.auto_assign_enabled
    }

    fn get_ticket_in(&self, txn: &WriteTransaction, ticket_id: &str) -> DeskResult<TicketRef> {
        self.storage
            .get_ticket_txn(txn, ticket_id)?
            .ok_or_else(|| DeskError::TicketNotFound(ticket_id.to_string()))
    }

    fn get_record_in(&self, txn: &WriteTransaction, assignment_id: &str) -> DeskResult<TicketAssignment> {
        self.storage
            .get_assignment_txn(txn, assignment_id)?
            .ok_or_else(|| DeskError::AssignmentNotFound(assignment_id.to_string()))
    }

    fn current_record_in(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
    ) -> DeskResult<Option<TicketAssignment>> {
        match self.storage.get_current_assignment_id_txn(txn, ticket_id)? {
            Some(id) => Ok(Some(self.get_record_in(txn, &id)?)),
            None => Ok(None),
        }
    }

    /// Write a new CURRENT record, charge the agent for it and stamp the agent
    /// on the ticket's SLA tracker (started here if the ticket has a priority)
    fn open_record_in(
        &self,
        txn: &WriteTransaction,
        ticket: &TicketRef,
        record: &TicketAssignment,
        now: i64,
    ) -> DeskResult<()> {
        self.storage.store_assignment(txn, record)?;
        self.storage
            .set_current_assignment(txn, &record.ticket_id, &record.assignment_id)?;
        self.registry.increment_active_in(txn, &record.agent_id, now)?;
        self.tracker.create_in(
            txn,
            &ticket.ticket_id,
            ticket.priority,
            ticket.category.as_deref(),
            now,
        )?;
        self.tracker.assign_agent_in(
            txn,
            &record.ticket_id,
            Some((&record.agent_id, &record.agent_username)),
            now,
        )?;
        Ok(())
    }

    fn assigned_event(record: &TicketAssignment) -> DeskEvent {
        DeskEvent::TicketAssigned(TicketAssignedPayload {
            ticket_id: record.ticket_id.clone(),
            ticket_number: record.ticket_number.clone(),
            agent_id: record.agent_id.clone(),
            agent_username: record.agent_username.clone(),
            assigned_by: record.assigned_by.clone(),
            assigned_by_username: record.assigned_by_username.clone(),
            assignment_type: record.assignment_type,
            assigned_at: record.assigned_at,
        })
    }

    fn commit(&self, txn: WriteTransaction) -> DeskResult<()> {
        txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    // ========== Assign ==========

    pub fn manual_assign(
        &self,
        ticket_id: &str,
        agent_id: &str,
        operator: &Operator,
    ) -> DeskResult<TicketAssignment> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let ticket = self.get_ticket_in(&txn, ticket_id)?;
        if self.storage.get_current_assignment_id_txn(&txn, ticket_id)?.is_some() {
            return Err(DeskError::AlreadyAssigned(ticket_id.to_string()));
        }
        let agent = self.registry.get_in(&txn, agent_id)?;
        self.registry.ensure_can_accept(&agent)?;

        let record = new_record(&ticket, &agent, operator, AssignmentType::Manual, None, now);
        self.open_record_in(&txn, &ticket, &record, now)?;
        self.commit(txn)?;

        tracing::info!(
            ticket_id = %ticket_id,
            agent_id = %agent_id,
            assigned_by = %operator.id,
            "Ticket assigned manually"
        );
        self.events.publish(Self::assigned_event(&record));
        Ok(record)
    }

    /// Let the strategy pick an agent. Disabled auto-assignment, an already
    /// assigned ticket and an empty candidate pool are reported, not errors.
    pub fn auto_assign(&self, ticket_id: &str) -> DeskResult<AutoAssignOutcome> {
        if !self.auto_assign_enabled {
            tracing::debug!(ticket_id = %ticket_id, "Auto-assign disabled");
            return Ok(AutoAssignOutcome::Disabled);
        }

        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let ticket = self.get_ticket_in(&txn, ticket_id)?;
        if self.storage.get_current_assignment_id_txn(&txn, ticket_id)?.is_some() {
            return Ok(AutoAssignOutcome::AlreadyAssigned);
        }

        let candidates = self.registry.available_candidates_in(&txn)?;
        let Some(agent) = self.strategy.select_agent(&candidates) else {
            tracing::warn!(
                ticket_id = %ticket_id,
                candidates = candidates.len(),
                "No available agent for auto-assignment"
            );
            return Ok(AutoAssignOutcome::NoAvailableAgent);
        };
        self.registry.ensure_can_accept(&agent)?;

        let record = new_record(
            &ticket,
            &agent,
            &Operator::system(),
            AssignmentType::Auto,
            Some(self.strategy.name()),
            now,
        );
        self.open_record_in(&txn, &ticket, &record, now)?;
        self.commit(txn)?;

        tracing::info!(
            ticket_id = %ticket_id,
            agent_id = %agent.agent_id,
            strategy = self.strategy.name(),
            "Ticket auto-assigned"
        );
        self.events.publish(Self::assigned_event(&record));
        Ok(AutoAssignOutcome::Assigned(record))
    }

    // ========== Complete ==========

    pub fn complete_assignment(&self, ticket_id: &str) -> DeskResult<Option<TicketAssignment>> {
        let txn = self.storage.begin_write()?;
        let record = self.complete_assignment_in(&txn, ticket_id, now_millis())?;
        self.commit(txn)?;
        Ok(record)
    }

    /// CURRENT → COMPLETED. A ticket without a CURRENT record is left alone.
    pub fn complete_assignment_in(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
        now: i64,
    ) -> DeskResult<Option<TicketAssignment>> {
        let Some(mut record) = self.current_record_in(txn, ticket_id)? else {
            tracing::debug!(ticket_id = %ticket_id, "No current assignment to complete");
            return Ok(None);
        };

        record.status = AssignmentStatus::Completed;
        record.completed_at = Some(now);
        self.storage.store_assignment(txn, &record)?;
        self.storage.clear_current_assignment(txn, ticket_id)?;
        self.registry.record_completion_in(txn, &record.agent_id, now)?;

        tracing::info!(ticket_id = %ticket_id, agent_id = %record.agent_id, "Assignment completed");
        Ok(Some(record))
    }

    // ========== Reassign ==========

    pub fn force_reassign(
        &self,
        assignment_id: &str,
        new_agent_id: &str,
        reason: &str,
        operator: &Operator,
    ) -> DeskResult<TicketAssignment> {
        validate_required_text(reason, "reason", MAX_REASON_LEN)?;
        validate_required_text(new_agent_id, "new_agent_id", MAX_ID_LEN)?;

        let txn = self.storage.begin_write()?;
        let record = self.force_reassign_in(
            &txn,
            assignment_id,
            new_agent_id,
            reason,
            operator,
            now_millis(),
        )?;
        self.commit(txn)?;

        self.events.publish(Self::assigned_event(&record));
        Ok(record)
    }

    /// Move a CURRENT record to another agent. The old record becomes
    /// REASSIGNED history, the new one carries the previous agent as lineage.
    fn force_reassign_in(
        &self,
        txn: &WriteTransaction,
        assignment_id: &str,
        new_agent_id: &str,
        reason: &str,
        operator: &Operator,
        now: i64,
    ) -> DeskResult<TicketAssignment> {
        let mut old = self.get_record_in(txn, assignment_id)?;
        if !old.is_current() {
            return Err(DeskError::InvalidState(format!(
                "assignment {assignment_id} is {}, only CURRENT assignments can be reassigned",
                old.status
            )));
        }
        if old.agent_id == new_agent_id {
            return Err(DeskError::InvalidState(format!(
                "ticket {} is already assigned to agent {new_agent_id}",
                old.ticket_id
            )));
        }
        let new_agent = self.registry.get_in(txn, new_agent_id)?;
        self.registry.ensure_can_accept(&new_agent)?;
        let ticket = self.get_ticket_in(txn, &old.ticket_id)?;

        self.registry.decrement_active_in(txn, &old.agent_id, now)?;
        old.status = AssignmentStatus::Reassigned;
        old.reassignment_reason = Some(reason.to_string());
        self.storage.store_assignment(txn, &old)?;

        let mut record = new_record(
            &ticket,
            &new_agent,
            operator,
            AssignmentType::Reassignment,
            None,
            now,
        );
        record.previous_agent_id = Some(old.agent_id.clone());
        record.previous_agent_username = Some(old.agent_username.clone());
        record.reassignment_reason = Some(reason.to_string());
        self.open_record_in(txn, &ticket, &record, now)?;

        tracing::info!(
            ticket_id = %record.ticket_id,
            from = %old.agent_id,
            to = %new_agent_id,
            reassigned_by = %operator.id,
            "Ticket reassigned"
        );
        Ok(record)
    }

    /// Reassign every CURRENT record of `from_agent_id`. Each ticket commits on
    /// its own; failures are collected, never rolled back across the batch.
    pub fn bulk_reassign(
        &self,
        from_agent_id: &str,
        to_agent_id: &str,
        reason: &str,
        operator: &Operator,
    ) -> DeskResult<BulkReassignResult> {
        validate_required_text(reason, "reason", MAX_REASON_LEN)?;
        validate_required_text(from_agent_id, "from_agent_id", MAX_ID_LEN)?;
        validate_required_text(to_agent_id, "to_agent_id", MAX_ID_LEN)?;
        if from_agent_id == to_agent_id {
            return Err(DeskError::Validation(
                "source and target agent must differ".into(),
            ));
        }
        self.registry.get(from_agent_id)?;
        self.registry.get(to_agent_id)?;

        let records = self.storage.current_assignments_for_agent(from_agent_id)?;
        let mut result = BulkReassignResult {
            total_processed: records.len(),
            ..Default::default()
        };

        for record in records {
            match self.reassign_one(&record, to_agent_id, reason, operator) {
                Ok(new_record) => {
                    result.success_count += 1;
                    self.events.publish(Self::assigned_event(&new_record));
                }
                Err(e) => {
                    tracing::warn!(
                        ticket_id = %record.ticket_id,
                        error = %e,
                        "Bulk reassignment failed for ticket"
                    );
                    result.failed_count += 1;
                    result.errors.push(BulkReassignError {
                        ticket_id: record.ticket_id.clone(),
                        assignment_id: record.assignment_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            from = %from_agent_id,
            to = %to_agent_id,
            total = result.total_processed,
            success = result.success_count,
            failed = result.failed_count,
            "Bulk reassignment finished"
        );
        Ok(result)
    }

    fn reassign_one(
        &self,
        record: &TicketAssignment,
        to_agent_id: &str,
        reason: &str,
        operator: &Operator,
    ) -> DeskResult<TicketAssignment> {
        let target = self.registry.get(to_agent_id)?;
        if target.remaining_capacity(self.registry.capacity()) == 0 {
            return Err(DeskError::CapacityExceeded {
                agent_id: target.agent_id,
                active: target.active_tickets,
                capacity: self.registry.capacity(),
            });
        }

        let txn = self.storage.begin_write()?;
        let new_record = self.force_reassign_in(
            &txn,
            &record.assignment_id,
            to_agent_id,
            reason,
            operator,
            now_millis(),
        )?;
        self.commit(txn)?;
        Ok(new_record)
    }

    // ========== Unassign / Delete ==========

    /// Release a ticket. A REASSIGNED target resolves to the ticket's present
    /// CURRENT record.
    pub fn unassign(
        &self,
        assignment_id: &str,
        reason: &str,
        operator: &Operator,
    ) -> DeskResult<TicketAssignment> {
        validate_required_text(reason, "reason", MAX_REASON_LEN)?;
        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let mut record = self.get_record_in(&txn, assignment_id)?;
        let mut hops = 0;
        while record.status == AssignmentStatus::Reassigned {
            hops += 1;
            if hops > MAX_RESOLVE_HOPS {
                return Err(DeskError::InvalidState(format!(
                    "could not resolve current assignment for ticket {}",
                    record.ticket_id
                )));
            }
            let Some(current) = self.current_record_in(&txn, &record.ticket_id)? else {
                return Err(DeskError::InvalidState(format!(
                    "ticket {} has no current assignment",
                    record.ticket_id
                )));
            };
            record = current;
        }
        if !record.is_current() {
            return Err(DeskError::InvalidState(format!(
                "assignment {} is {}, cannot unassign",
                record.assignment_id, record.status
            )));
        }

        record.status = AssignmentStatus::Unassigned;
        record.unassigned_at = Some(now);
        record.unassigned_by = Some(operator.id.clone());
        record.unassign_reason = Some(reason.to_string());
        self.storage.store_assignment(&txn, &record)?;
        self.storage.clear_current_assignment(&txn, &record.ticket_id)?;
        self.registry.decrement_active_in(&txn, &record.agent_id, now)?;
        self.tracker.assign_agent_in(&txn, &record.ticket_id, None, now)?;
        self.commit(txn)?;

        tracing::info!(
            ticket_id = %record.ticket_id,
            agent_id = %record.agent_id,
            requested = %assignment_id,
            resolved = %record.assignment_id,
            unassigned_by = %operator.id,
            "Ticket unassigned"
        );
        Ok(record)
    }

    /// Hard-delete a history record
    pub fn delete_record(&self, assignment_id: &str) -> DeskResult<()> {
        let txn = self.storage.begin_write()?;
        let record = self.get_record_in(&txn, assignment_id)?;
        if record.is_current() {
            return Err(DeskError::AssignmentIsCurrent(assignment_id.to_string()));
        }
        self.storage.remove_assignment(&txn, assignment_id)?;
        self.commit(txn)?;

        tracing::info!(assignment_id = %assignment_id, ticket_id = %record.ticket_id, "Assignment record deleted");
        Ok(())
    }

    // ========== Queries ==========

    pub fn get(&self, assignment_id: &str) -> DeskResult<TicketAssignment> {
        self.storage
            .get_assignment(assignment_id)?
            .ok_or_else(|| DeskError::AssignmentNotFound(assignment_id.to_string()))
    }

    pub fn current_for_ticket(&self, ticket_id: &str) -> DeskResult<Option<TicketAssignment>> {
        match self.storage.get_current_assignment_id(ticket_id)? {
            Some(id) => Ok(self.storage.get_assignment(&id)?),
            None => Ok(None),
        }
    }

    /// All records of a ticket, oldest first
    pub fn history_for_ticket(&self, ticket_id: &str) -> DeskResult<Vec<TicketAssignment>> {
        self.list(&AssignmentFilter {
            ticket_id: Some(ticket_id.to_string()),
            ..Default::default()
        })
        .map(|mut records| {
            records.reverse();
            records
        })
    }

    /// Matching records, newest first
    pub fn list(&self, filter: &AssignmentFilter) -> DeskResult<Vec<TicketAssignment>> {
        let mut records: Vec<TicketAssignment> = self
            .storage
            .list_assignments()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(|a, b| {
            b.assigned_at
                .cmp(&a.assigned_at)
                .then_with(|| b.assignment_id.cmp(&a.assignment_id))
        });
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// CURRENT records held by an agent
    pub fn current_for_agent(&self, agent_id: &str) -> DeskResult<Vec<TicketAssignment>> {
        Ok(self.storage.current_assignments_for_agent(agent_id)?)
    }

    /// Agents whose `active_tickets` disagrees with their CURRENT record count
    pub fn audit_workloads(&self) -> DeskResult<Vec<WorkloadDrift>> {
        let mut current: HashMap<String, u32> = HashMap::new();
        for record in self.storage.list_assignments()? {
            if record.is_current() {
                *current.entry(record.agent_id).or_default() += 1;
            }
        }

        let mut drift = Vec::new();
        for agent in self.registry.list()? {
            let count = current.get(&agent.agent_id).copied().unwrap_or(0);
            if count != agent.active_tickets {
                tracing::warn!(
                    agent_id = %agent.agent_id,
                    active_tickets = agent.active_tickets,
                    current_assignments = count,
                    "Agent workload drift detected"
                );
                drift.push(WorkloadDrift {
                    agent_id: agent.agent_id,
                    active_tickets: agent.active_tickets,
                    current_assignments: count,
                });
            }
        }
        Ok(drift)
    }
}

fn new_record(
    ticket: &TicketRef,
    agent: &AgentWorkload,
    operator: &Operator,
    assignment_type: AssignmentType,
    strategy: Option<&str>,
    now: i64,
) -> TicketAssignment {
    TicketAssignment {
        assignment_id: new_id(),
        ticket_id: ticket.ticket_id.clone(),
        ticket_number: ticket.ticket_number.clone(),
        agent_id: agent.agent_id.clone(),
        agent_username: agent.username.clone(),
        assigned_by: operator.id.clone(),
        assigned_by_username: operator.username.clone(),
        assignment_type,
        strategy: strategy.map(str::to_string),
        previous_agent_id: None,
        previous_agent_username: None,
        reassignment_reason: None,
        status: AssignmentStatus::Current,
        assigned_at: now,
        completed_at: None,
        unassigned_at: None,
        unassigned_by: None,
        unassign_reason: None,
    }
}

#[cfg(test)]
mod tests;
