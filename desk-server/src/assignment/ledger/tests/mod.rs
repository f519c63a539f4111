use super::*;
use crate::assignment::strategy::LeastLoadedStrategy;
use crate::sla::SlaRuleResolver;
use shared::models::{AgentStatus, TicketPriority};

struct Harness {
    ledger: AssignmentLedger,
    storage: DeskStorage,
    registry: AgentWorkloadRegistry,
    tracker: SlaTracker,
    events: EventBus,
}

fn create_test_ledger(capacity: u32) -> Harness {
    create_test_ledger_with(capacity, true)
}

fn create_test_ledger_with(capacity: u32, auto_assign_enabled: bool) -> Harness {
    let storage = DeskStorage::open_in_memory().unwrap();
    let events = EventBus::new();
    let registry = AgentWorkloadRegistry::new(storage.clone(), capacity);
    let tracker = SlaTracker::new(
        storage.clone(),
        SlaRuleResolver::new(storage.clone()),
        events.clone(),
        0.8,
    );
    let ledger = AssignmentLedger::new(
        storage.clone(),
        registry.clone(),
        Box::new(LeastLoadedStrategy),
        tracker.clone(),
        events.clone(),
        auto_assign_enabled,
    );
    Harness {
        ledger,
        storage,
        registry,
        tracker,
        events,
    }
}

// ========================================================================
// Helpers
// ========================================================================

fn add_ticket(h: &Harness, ticket_id: &str) {
    add_ticket_with_priority(h, ticket_id, Some(TicketPriority::High));
}

fn add_ticket_with_priority(h: &Harness, ticket_id: &str, priority: Option<TicketPriority>) {
    let now = now_millis();
    let txn = h.storage.begin_write().unwrap();
    h.storage
        .store_ticket(
            &txn,
            &TicketRef {
                ticket_id: ticket_id.to_string(),
                ticket_number: format!("T-{ticket_id}"),
                priority,
                category: None,
                received_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    h.tracker
        .create_in(&txn, ticket_id, priority, None, now)
        .unwrap();
    txn.commit().unwrap();
}

fn add_agent(h: &Harness, agent_id: &str) {
    h.registry.register(agent_id, agent_id).unwrap();
}

fn admin() -> Operator {
    Operator::new("admin-1", "Admin")
}

/// Give `agent_id` `count` fresh tickets named `{prefix}-{n}`
fn load_agent(h: &Harness, agent_id: &str, prefix: &str, count: usize) -> Vec<TicketAssignment> {
    (0..count)
        .map(|n| {
            let ticket_id = format!("{prefix}-{n}");
            add_ticket(h, &ticket_id);
            h.ledger.manual_assign(&ticket_id, agent_id, &admin()).unwrap()
        })
        .collect()
}

fn active(h: &Harness, agent_id: &str) -> u32 {
    h.registry.get(agent_id).unwrap().active_tickets
}

/// activeTickets == number of CURRENT records, for every agent
fn assert_workloads_consistent(h: &Harness) {
    let drift = h.ledger.audit_workloads().unwrap();
    assert!(drift.is_empty(), "workload drift: {drift:?}");

    for agent in h.registry.list().unwrap() {
        let current = h.ledger.current_for_agent(&agent.agent_id).unwrap();
        assert_eq!(agent.active_tickets as usize, current.len());
    }
}
