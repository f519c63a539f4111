//! SlaBreachSweeper - 定时 SLA 扫描
//!
//! Re-evaluates every open tracker on a fixed cadence. Each tracker is re-read
//! and written in its own transaction, so one failing tracker never stops the run
//! and a concurrent lifecycle update is never overwritten with a stale copy.
//!
//! The sweep is level-triggered: running it again without elapsed time changes
//! nothing and emits nothing. Overlapping runs are skipped, not queued.

use super::{breach_event, warning_event};
use crate::error::DeskResult;
use crate::events::EventBus;
use crate::storage::{DeskStorage, StorageError};
use serde::Serialize;
use shared::message::DeskEvent;
use shared::models::{SlaAxis, SlaStatus, SlaTracking};
use shared::util::now_millis;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Result of one sweep run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Open trackers examined
    pub scanned: usize,
    pub warnings: usize,
    pub breaches: usize,
    /// Trackers left alone (paused or already breached)
    pub skipped: usize,
    /// Trackers whose evaluation failed
    pub failed: usize,
}

enum Outcome {
    Skipped,
    Evaluated { warnings: usize, breaches: usize },
}

#[derive(Debug, Clone)]
pub struct SlaBreachSweeper {
    storage: DeskStorage,
    events: EventBus,
    warning_threshold: f64,
    running: Arc<AtomicBool>,
}

/// Clears the running flag when the sweep ends, panics included
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SlaBreachSweeper {
    pub fn new(storage: DeskStorage, events: EventBus, warning_threshold: f64) -> Self {
        Self {
            storage,
            events,
            warning_threshold,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn sweep(&self) -> Option<SweepReport> {
        self.sweep_at(now_millis())
    }

    /// One pass over all open trackers. None when another run is in progress.
    pub fn sweep_at(&self, now: i64) -> Option<SweepReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("SLA sweep already running, skipped");
            return None;
        }
        let _guard = RunningGuard(&self.running);

        let mut report = SweepReport::default();
        let ticket_ids = match self.storage.get_open_tracker_ids() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list open SLA trackers");
                return Some(report);
            }
        };

        for ticket_id in ticket_ids {
            report.scanned += 1;
            match self.sweep_one(&ticket_id, now) {
                Ok(Outcome::Skipped) => report.skipped += 1,
                Ok(Outcome::Evaluated { warnings, breaches }) => {
                    report.warnings += warnings;
                    report.breaches += breaches;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(ticket_id = %ticket_id, error = %e, "SLA sweep failed for tracker");
                }
            }
        }

        if report.warnings + report.breaches + report.failed > 0 {
            tracing::info!(
                scanned = report.scanned,
                warnings = report.warnings,
                breaches = report.breaches,
                failed = report.failed,
                "SLA sweep completed"
            );
        } else {
            tracing::debug!(scanned = report.scanned, "SLA sweep completed, no changes");
        }
        Some(report)
    }

    fn sweep_one(&self, ticket_id: &str, now: i64) -> DeskResult<Outcome> {
        let txn = self.storage.begin_write()?;
        let Some(mut tracking) = self.storage.get_tracking_txn(&txn, ticket_id)? else {
            txn.abort().map_err(StorageError::from)?;
            return Ok(Outcome::Skipped);
        };
        if tracking.is_resolved()
            || matches!(tracking.status, SlaStatus::Breached | SlaStatus::Paused)
        {
            txn.abort().map_err(StorageError::from)?;
            return Ok(Outcome::Skipped);
        }

        let before = tracking.clone();
        let events = evaluate(&mut tracking, now, self.warning_threshold);
        if tracking == before {
            txn.abort().map_err(StorageError::from)?;
            return Ok(Outcome::Evaluated {
                warnings: 0,
                breaches: 0,
            });
        }

        tracking.updated_at = now;
        self.storage.store_tracking(&txn, &tracking)?;
        txn.commit().map_err(StorageError::from)?;

        let mut warnings = 0;
        let mut breaches = 0;
        for event in events {
            match &event {
                DeskEvent::SlaWarning(_) => warnings += 1,
                DeskEvent::SlaBreach(_) => breaches += 1,
                DeskEvent::TicketAssigned(_) => {}
            }
            self.events.publish(event);
        }
        Ok(Outcome::Evaluated { warnings, breaches })
    }

    /// Sweep every `interval` until shutdown
    pub async fn run(self, interval: Duration, shutdown: CancellationToken) {
        tracing::info!(interval_secs = interval.as_secs(), "SLA sweeper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("SLA sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep();
                }
            }
        }
    }
}

/// Apply the warning/breach rules to an open, non-breached tracker.
/// Returns the events for the transitions that happened.
fn evaluate(tracking: &mut SlaTracking, now: i64, threshold: f64) -> Vec<DeskEvent> {
    let mut events = Vec::new();

    // Response axis, only while nobody has answered yet
    if tracking.first_response_at.is_none() {
        if now > tracking.response_due_at {
            tracking.mark_breached(SlaAxis::Response, now);
            events.push(breach_event(tracking, SlaAxis::Response, now));
        } else if tracking.elapsed_fraction(tracking.response_due_at, now) >= threshold
            && tracking.status != SlaStatus::Warning
        {
            tracking.status = SlaStatus::Warning;
            events.push(warning_event(tracking, SlaAxis::Response, now));
        }
    }

    // Resolution axis
    if now > tracking.resolution_due_at {
        if !tracking.resolution_breached {
            tracking.mark_breached(SlaAxis::Resolution, now);
            events.push(breach_event(tracking, SlaAxis::Resolution, now));
        }
    } else if tracking.first_response_at.is_some()
        && tracking.status == SlaStatus::OnTime
        && tracking.elapsed_fraction(tracking.resolution_due_at, now) >= threshold
    {
        tracking.status = SlaStatus::Warning;
        events.push(warning_event(tracking, SlaAxis::Resolution, now));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sla::{SlaRuleResolver, SlaTracker};
    use shared::models::TicketPriority;
    use shared::util::{HOUR_MS, MINUTE_MS};

    const T0: i64 = 1_700_000_000_000;

    struct Fixture {
        tracker: SlaTracker,
        sweeper: SlaBreachSweeper,
        events: EventBus,
    }

    fn fixture() -> Fixture {
        let storage = DeskStorage::open_in_memory().unwrap();
        let events = EventBus::new();
        let resolver = SlaRuleResolver::new(storage.clone());
        Fixture {
            tracker: SlaTracker::new(storage.clone(), resolver, events.clone(), 0.8),
            sweeper: SlaBreachSweeper::new(storage, events.clone(), 0.8),
            events,
        }
    }

    fn create(f: &Fixture, ticket_id: &str, priority: TicketPriority) {
        f.tracker
            .create_at(ticket_id, Some(priority), None, T0)
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_resolution_warning_fires_once() {
        let f = fixture();
        create(&f, "t1", TicketPriority::Critical);
        f.tracker
            .record_first_response_at("t1", T0 + 5 * MINUTE_MS)
            .unwrap();
        let mut rx = f.events.subscribe();

        let at = T0 + 3 * HOUR_MS + 13 * MINUTE_MS;
        let report = f.sweeper.sweep_at(at).unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.warnings, 1);
        assert_eq!(f.tracker.get("t1").unwrap().status, SlaStatus::Warning);
        match rx.try_recv().unwrap() {
            DeskEvent::SlaWarning(p) => {
                assert_eq!(p.warning_type, SlaAxis::Resolution);
                assert_eq!(p.minutes_remaining, 47);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let before = f.tracker.get("t1").unwrap();
        let report = f.sweeper.sweep_at(at).unwrap();
        assert_eq!(report.warnings, 0);
        assert_eq!(f.tracker.get("t1").unwrap(), before);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_missing_response_breaches() {
        let f = fixture();
        create(&f, "t1", TicketPriority::Critical);

        let report = f.sweeper.sweep_at(T0 + 20 * MINUTE_MS).unwrap();
        assert_eq!(report.breaches, 1);

        let tracking = f.tracker.get("t1").unwrap();
        assert_eq!(tracking.status, SlaStatus::Breached);
        assert!(tracking.response_breached);
        assert_eq!(tracking.breached_at, Some(T0 + 20 * MINUTE_MS));

        // Breached trackers are left alone afterwards
        let report = f.sweeper.sweep_at(T0 + 5 * HOUR_MS).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.breaches, 0);
    }

    #[test]
    fn test_response_warning() {
        let f = fixture();
        create(&f, "t1", TicketPriority::Critical);

        let report = f.sweeper.sweep_at(T0 + 13 * MINUTE_MS).unwrap();
        assert_eq!(report.warnings, 1);
        assert_eq!(f.tracker.get("t1").unwrap().status, SlaStatus::Warning);

        let report = f.sweeper.sweep_at(T0 + 14 * MINUTE_MS).unwrap();
        assert_eq!(report.warnings, 0);
    }

    #[test]
    fn test_early_sweep_changes_nothing() {
        let f = fixture();
        create(&f, "t1", TicketPriority::Low);
        let before = f.tracker.get("t1").unwrap();

        let report = f.sweeper.sweep_at(T0 + MINUTE_MS).unwrap();
        assert_eq!(report, SweepReport { scanned: 1, ..Default::default() });
        assert_eq!(f.tracker.get("t1").unwrap(), before);
    }

    #[test]
    fn test_paused_and_resolved_are_not_evaluated() {
        let f = fixture();
        create(&f, "paused", TicketPriority::Critical);
        create(&f, "done", TicketPriority::Critical);
        f.tracker.pause_at("paused", T0 + MINUTE_MS).unwrap();
        f.tracker.record_first_response_at("done", T0 + MINUTE_MS).unwrap();
        f.tracker.record_resolution_at("done", T0 + HOUR_MS).unwrap();

        let report = f.sweeper.sweep_at(T0 + 10 * HOUR_MS).unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(f.tracker.get("paused").unwrap().status, SlaStatus::Paused);
        assert_eq!(f.tracker.get("done").unwrap().status, SlaStatus::Met);
    }

    #[test]
    fn test_corrupt_tracker_does_not_stop_sweep() {
        let f = fixture();
        f.sweeper
            .storage
            .insert_raw_tracking("bad", b"not json", T0)
            .unwrap();
        create(&f, "good", TicketPriority::Critical);

        let report = f.sweeper.sweep_at(T0 + 20 * MINUTE_MS).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.breaches, 1);
        assert_eq!(f.tracker.get("good").unwrap().status, SlaStatus::Breached);
        assert!(!f.sweeper.is_running());
    }

    #[test]
    fn test_overlapping_run_is_skipped() {
        let f = fixture();
        f.sweeper.running.store(true, Ordering::Release);
        assert!(f.sweeper.sweep_at(T0).is_none());

        f.sweeper.running.store(false, Ordering::Release);
        assert!(f.sweeper.sweep_at(T0).is_some());
        assert!(!f.sweeper.is_running());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = fixture();
        let token = CancellationToken::new();
        let handle = tokio::spawn(f.sweeper.clone().run(Duration::from_millis(10), token.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        handle.await.unwrap();
    }
}
