//! SlaTracker - 工单 SLA 状态机
//!
//! ```text
//! ON_TIME ──► WARNING ──► BREACHED
//!    │  ▲        │
//!    ▼  │        ▼
//!   PAUSED      MET (resolved in time)
//! ```
//!
//! BREACHED is terminal for status: a later first response or an in-time
//! resolution records timestamps but never moves the tracker back to ON_TIME or
//! MET. Due times are fixed at creation.
//!
//! Lifecycle calls for tickets without a tracker (no priority yet) are no-ops.
//! The `*_in` variants run inside the caller's transaction and push events to an
//! outbox the caller publishes after commit.

use super::{SlaRuleResolver, breach_event, warning_event};
use crate::error::{DeskError, DeskResult};
use crate::events::EventBus;
use crate::storage::{DeskStorage, StorageError};
use redb::WriteTransaction;
use shared::message::DeskEvent;
use shared::models::{SlaAxis, SlaComplianceSummary, SlaStatus, SlaTracking, TicketPriority};
use shared::util::{minutes_between, new_id, now_millis, round2};

#[derive(Debug, Clone)]
pub struct SlaTracker {
    storage: DeskStorage,
    resolver: SlaRuleResolver,
    events: EventBus,
    warning_threshold: f64,
}

impl SlaTracker {
    pub fn new(
        storage: DeskStorage,
        resolver: SlaRuleResolver,
        events: EventBus,
        warning_threshold: f64,
    ) -> Self {
        Self {
            storage,
            resolver,
            events,
            warning_threshold,
        }
    }

    pub(crate) fn publish_all(&self, outbox: Vec<DeskEvent>) {
        for event in outbox {
            self.events.publish(event);
        }
    }

    fn commit(&self, txn: WriteTransaction, outbox: Vec<DeskEvent>) -> DeskResult<()> {
        txn.commit().map_err(StorageError::from)?;
        self.publish_all(outbox);
        Ok(())
    }

    // ========== Creation ==========

    pub fn create(
        &self,
        ticket_id: &str,
        priority: Option<TicketPriority>,
        category: Option<&str>,
    ) -> DeskResult<Option<SlaTracking>> {
        self.create_at(ticket_id, priority, category, now_millis())
    }

    pub fn create_at(
        &self,
        ticket_id: &str,
        priority: Option<TicketPriority>,
        category: Option<&str>,
        now: i64,
    ) -> DeskResult<Option<SlaTracking>> {
        let txn = self.storage.begin_write()?;
        let tracking = self.create_in(&txn, ticket_id, priority, category, now)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(tracking)
    }

    /// Start tracking a ticket. Without a priority nothing is persisted; an
    /// existing tracker is returned unchanged.
    pub fn create_in(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
        priority: Option<TicketPriority>,
        category: Option<&str>,
        now: i64,
    ) -> DeskResult<Option<SlaTracking>> {
        let Some(priority) = priority else {
            tracing::debug!(ticket_id = %ticket_id, "Ticket has no priority, SLA tracking deferred");
            return Ok(None);
        };
        if let Some(existing) = self.storage.get_tracking_txn(txn, ticket_id)? {
            return Ok(Some(existing));
        }

        let rule = self.resolver.resolve_in(txn, Some(priority), category, now)?;
        let tracking = SlaTracking {
            tracking_id: new_id(),
            ticket_id: ticket_id.to_string(),
            priority,
            category: category.map(str::to_string),
            sla_start_time: now,
            response_due_at: now + rule.response_window_ms(),
            resolution_due_at: now + rule.resolution_window_ms(),
            first_response_at: None,
            response_breached: false,
            response_time_minutes: None,
            resolved_at: None,
            resolution_breached: false,
            resolution_time_hours: None,
            status: SlaStatus::OnTime,
            breach_reason: None,
            breached_at: None,
            assigned_agent_id: None,
            assigned_agent_username: None,
            paused_at: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.store_tracking(txn, &tracking)?;
        tracing::info!(
            ticket_id = %ticket_id,
            priority = %priority,
            response_due_at = tracking.response_due_at,
            resolution_due_at = tracking.resolution_due_at,
            "SLA tracking started"
        );
        Ok(Some(tracking))
    }

    // ========== Lifecycle ==========

    pub fn record_first_response(&self, ticket_id: &str) -> DeskResult<Option<SlaTracking>> {
        self.record_first_response_at(ticket_id, now_millis())
    }

    pub fn record_first_response_at(
        &self,
        ticket_id: &str,
        now: i64,
    ) -> DeskResult<Option<SlaTracking>> {
        let txn = self.storage.begin_write()?;
        let mut outbox = Vec::new();
        let tracking = self.record_first_response_in(&txn, ticket_id, now, &mut outbox)?;
        self.commit(txn, outbox)?;
        Ok(tracking)
    }

    /// Only the first call counts; later calls and calls after resolution
    /// return the tracker unchanged
    pub fn record_first_response_in(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
        now: i64,
        outbox: &mut Vec<DeskEvent>,
    ) -> DeskResult<Option<SlaTracking>> {
        let Some(mut tracking) = self.storage.get_tracking_txn(txn, ticket_id)? else {
            tracing::debug!(ticket_id = %ticket_id, "No SLA tracker, first response ignored");
            return Ok(None);
        };
        if tracking.first_response_at.is_some() || tracking.is_resolved() {
            return Ok(Some(tracking));
        }

        tracking.first_response_at = Some(now);
        tracking.response_time_minutes = Some(minutes_between(tracking.sla_start_time, now));
        tracking.updated_at = now;

        if now > tracking.response_due_at {
            if !tracking.response_breached {
                tracking.mark_breached(SlaAxis::Response, now);
                outbox.push(breach_event(&tracking, SlaAxis::Response, now));
                tracing::warn!(ticket_id = %ticket_id, "First response after SLA deadline");
            }
        } else if tracking.status != SlaStatus::Paused {
            self.refresh_status(&mut tracking, now, outbox);
        }

        self.storage.store_tracking(txn, &tracking)?;
        Ok(Some(tracking))
    }

    pub fn record_resolution(&self, ticket_id: &str) -> DeskResult<Option<SlaTracking>> {
        self.record_resolution_at(ticket_id, now_millis())
    }

    pub fn record_resolution_at(&self, ticket_id: &str, now: i64) -> DeskResult<Option<SlaTracking>> {
        let txn = self.storage.begin_write()?;
        let mut outbox = Vec::new();
        let tracking = self.record_resolution_in(&txn, ticket_id, now, &mut outbox)?;
        self.commit(txn, outbox)?;
        Ok(tracking)
    }

    /// Close the tracker: MET unless any breach was recorded
    pub fn record_resolution_in(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
        now: i64,
        outbox: &mut Vec<DeskEvent>,
    ) -> DeskResult<Option<SlaTracking>> {
        let Some(mut tracking) = self.storage.get_tracking_txn(txn, ticket_id)? else {
            tracing::debug!(ticket_id = %ticket_id, "No SLA tracker, resolution ignored");
            return Ok(None);
        };
        if tracking.is_resolved() {
            return Ok(Some(tracking));
        }

        let elapsed_minutes = minutes_between(tracking.sla_start_time, now);
        tracking.resolved_at = Some(now);
        tracking.resolution_time_hours = Some(round2(elapsed_minutes as f64 / 60.0));
        tracking.paused_at = None;
        tracking.updated_at = now;

        if now > tracking.resolution_due_at {
            if !tracking.resolution_breached {
                tracking.mark_breached(SlaAxis::Resolution, now);
                outbox.push(breach_event(&tracking, SlaAxis::Resolution, now));
            }
        } else if tracking.status != SlaStatus::Breached {
            tracking.status = SlaStatus::Met;
        }

        self.storage.store_tracking(txn, &tracking)?;
        tracing::info!(
            ticket_id = %ticket_id,
            status = %tracking.status,
            resolution_time_hours = ?tracking.resolution_time_hours,
            "SLA tracking closed"
        );
        Ok(Some(tracking))
    }

    /// Time-remaining rule on the open timers. Never leaves BREACHED.
    fn refresh_status(&self, tracking: &mut SlaTracking, now: i64, outbox: &mut Vec<DeskEvent>) {
        if tracking.status == SlaStatus::Breached || tracking.is_resolved() {
            return;
        }
        if tracking.first_response_at.is_none() && now > tracking.response_due_at {
            tracking.mark_breached(SlaAxis::Response, now);
            outbox.push(breach_event(tracking, SlaAxis::Response, now));
            return;
        }
        if now > tracking.resolution_due_at {
            tracking.mark_breached(SlaAxis::Resolution, now);
            outbox.push(breach_event(tracking, SlaAxis::Resolution, now));
            return;
        }

        let fraction = tracking.elapsed_fraction(tracking.open_due_at(), now);
        let next = if fraction >= self.warning_threshold {
            SlaStatus::Warning
        } else {
            SlaStatus::OnTime
        };
        if next == SlaStatus::Warning && tracking.status != SlaStatus::Warning {
            outbox.push(warning_event(tracking, SlaAxis::Resolution, now));
        }
        tracking.status = next;
    }

    // ========== Pause / Resume ==========

    pub fn pause(&self, ticket_id: &str) -> DeskResult<SlaTracking> {
        self.pause_at(ticket_id, now_millis())
    }

    /// Suspend sweep evaluation. Due times are not extended.
    pub fn pause_at(&self, ticket_id: &str, now: i64) -> DeskResult<SlaTracking> {
        let txn = self.storage.begin_write()?;
        let mut tracking = self.get_in(&txn, ticket_id)?;
        if !matches!(tracking.status, SlaStatus::OnTime | SlaStatus::Warning) {
            return Err(DeskError::InvalidSlaState(format!(
                "cannot pause SLA tracking in status {}",
                tracking.status
            )));
        }
        tracking.status = SlaStatus::Paused;
        tracking.paused_at = Some(now);
        tracking.updated_at = now;
        self.storage.store_tracking(&txn, &tracking)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(ticket_id = %ticket_id, "SLA tracking paused");
        Ok(tracking)
    }

    pub fn resume(&self, ticket_id: &str) -> DeskResult<SlaTracking> {
        self.resume_at(ticket_id, now_millis())
    }

    /// Back to the time-remaining status, which may be an immediate breach
    pub fn resume_at(&self, ticket_id: &str, now: i64) -> DeskResult<SlaTracking> {
        let txn = self.storage.begin_write()?;
        let mut tracking = self.get_in(&txn, ticket_id)?;
        if tracking.status != SlaStatus::Paused {
            return Err(DeskError::InvalidSlaState(format!(
                "cannot resume SLA tracking in status {}",
                tracking.status
            )));
        }
        let mut outbox = Vec::new();
        tracking.status = SlaStatus::OnTime;
        tracking.paused_at = None;
        tracking.updated_at = now;
        self.refresh_status(&mut tracking, now, &mut outbox);
        self.storage.store_tracking(&txn, &tracking)?;
        self.commit(txn, outbox)?;

        tracing::info!(ticket_id = %ticket_id, status = %tracking.status, "SLA tracking resumed");
        Ok(tracking)
    }

    // ========== Agent ==========

    /// Mirror the ticket's current agent onto its tracker, `None` clears it
    pub fn assign_agent_in(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
        agent: Option<(&str, &str)>,
        now: i64,
    ) -> DeskResult<()> {
        let Some(mut tracking) = self.storage.get_tracking_txn(txn, ticket_id)? else {
            return Ok(());
        };
        if tracking.is_resolved() {
            return Ok(());
        }
        tracking.assigned_agent_id = agent.map(|(id, _)| id.to_string());
        tracking.assigned_agent_username = agent.map(|(_, name)| name.to_string());
        tracking.updated_at = now;
        self.storage.store_tracking(txn, &tracking)?;
        Ok(())
    }

    // ========== Queries ==========

    pub fn get(&self, ticket_id: &str) -> DeskResult<SlaTracking> {
        self.storage
            .get_tracking(ticket_id)?
            .ok_or_else(|| DeskError::TrackingNotFound(ticket_id.to_string()))
    }

    fn get_in(&self, txn: &WriteTransaction, ticket_id: &str) -> DeskResult<SlaTracking> {
        self.storage
            .get_tracking_txn(txn, ticket_id)?
            .ok_or_else(|| DeskError::TrackingNotFound(ticket_id.to_string()))
    }

    pub fn compliance_summary(&self) -> DeskResult<SlaComplianceSummary> {
        let mut summary = SlaComplianceSummary::default();
        // 只统计已关闭 (resolved) 的 BREACHED
        let mut closed_breached = 0usize;
        for tracking in self.storage.list_trackings()? {
            summary.total += 1;
            match tracking.status {
                SlaStatus::OnTime => summary.on_time += 1,
                SlaStatus::Warning => summary.warning += 1,
                SlaStatus::Breached => {
                    summary.breached += 1;
                    closed_breached += usize::from(tracking.is_resolved());
                }
                SlaStatus::Met => summary.met += 1,
                SlaStatus::Paused => summary.paused += 1,
            }
            summary.response_breaches += usize::from(tracking.response_breached);
            summary.resolution_breaches += usize::from(tracking.resolution_breached);
        }

        let closed = summary.met + closed_breached;
        summary.compliance_rate = if closed == 0 {
            100.0
        } else {
            round2(summary.met as f64 * 100.0 / closed as f64)
        };
        Ok(summary)
    }
}
