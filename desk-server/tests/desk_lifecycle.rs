//! 引擎生命周期测试
//!
//! 使用 ServerState::initialize 完整初始化 (磁盘上的 redb)，覆盖
//! 注册坐席 → 收单自动分配 → 解决 → 重启后数据仍在。

use desk_server::{AutoAssignOutcome, Config, ServerState};
use shared::models::{
    AgentStatus, AssignmentStatus, SlaStatus, TicketCreated, TicketPriority,
};
use tempfile::TempDir;

fn test_config(dir: &TempDir, capacity: u32) -> Config {
    let mut config = Config::with_overrides(dir.path().to_string_lossy(), capacity);
    config.auto_assign_enabled = true;
    config.auto_assign_strategy = "least_loaded".into();
    config.sla_warning_threshold = 0.8;
    config.sla_sweep_interval_secs = 60;
    config.business_hours.enabled = false;
    config
}

fn created(ticket_id: &str, priority: TicketPriority) -> TicketCreated {
    TicketCreated {
        ticket_id: ticket_id.into(),
        ticket_number: format!("T-{ticket_id}"),
        priority: Some(priority),
        category: None,
    }
}

#[test]
fn test_intake_assigns_until_everyone_is_busy() {
    let dir = TempDir::new().unwrap();
    let state = ServerState::initialize(&test_config(&dir, 2)).unwrap();
    state.registry.register("alice", "alice").unwrap();
    state.registry.register("bob", "bob").unwrap();

    // 2 agents x capacity 2: four tickets fit, the fifth finds nobody
    for (i, priority) in [
        TicketPriority::Critical,
        TicketPriority::High,
        TicketPriority::Medium,
        TicketPriority::Low,
    ]
    .into_iter()
    .enumerate()
    {
        let result = state.intake.ticket_created(created(&format!("t{i}"), priority)).unwrap();
        assert!(
            matches!(result.auto_assign, AutoAssignOutcome::Assigned(_)),
            "ticket t{i} should be assigned"
        );
        assert!(result.tracking.is_some());
    }

    let result = state
        .intake
        .ticket_created(created("t4", TicketPriority::Low))
        .unwrap();
    assert_eq!(result.auto_assign, AutoAssignOutcome::NoAvailableAgent);

    for agent in state.registry.list().unwrap() {
        assert_eq!(agent.active_tickets, 2);
        assert_eq!(agent.status, AgentStatus::Busy);
    }
    assert!(state.ledger.audit_workloads().unwrap().is_empty());
}

#[test]
fn test_resolution_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 5);

    let assignment_id = {
        let state = ServerState::initialize(&config).unwrap();
        state.registry.register("alice", "alice").unwrap();
        let result = state
            .intake
            .ticket_created(created("t1", TicketPriority::High))
            .unwrap();
        let AutoAssignOutcome::Assigned(record) = result.auto_assign else {
            panic!("expected assignment");
        };

        state.intake.first_response("t1").unwrap();
        let resolution = state.intake.resolved("t1").unwrap();
        assert_eq!(resolution.tracking.unwrap().status, SlaStatus::Met);
        record.assignment_id
    };

    // Reopen the same database
    let state = ServerState::initialize(&config).unwrap();
    let record = state.ledger.get(&assignment_id).unwrap();
    assert_eq!(record.status, AssignmentStatus::Completed);
    assert!(state.ledger.current_for_ticket("t1").unwrap().is_none());

    let alice = state.registry.get("alice").unwrap();
    assert_eq!(alice.active_tickets, 0);
    assert_eq!(alice.completed_tickets, 1);

    let summary = state.tracker.compliance_summary().unwrap();
    assert_eq!(summary.met, 1);
    assert_eq!(summary.compliance_rate, 100.0);
    assert_eq!(state.storage.get_stats().unwrap().open_tracker_count, 0);
}

#[test]
fn test_initialize_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir, 5);
    config.auto_assign_strategy = "skills".into();
    assert!(ServerState::initialize(&config).is_err());

    let config = test_config(&dir, 0);
    assert!(ServerState::initialize(&config).is_err());
}

#[tokio::test]
async fn test_background_tasks_start_and_stop() {
    let dir = TempDir::new().unwrap();
    let state = ServerState::initialize(&test_config(&dir, 5)).unwrap();
    state
        .intake
        .ticket_created(created("t1", TicketPriority::Low))
        .unwrap();

    let tasks = state.start_background_tasks();
    assert_eq!(tasks.len(), 2);

    // 第一次 tick 立即执行巡检
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(tasks.check_health(), 0);

    tasks.shutdown().await;
}
