//! Assignment strategies - 自动分配策略
//!
//! A strategy only chooses among candidates; it never mutates workload. The ledger
//! passes every registered agent and re-validates the choice before committing.

use parking_lot::Mutex;
use shared::models::{AgentStatus, AgentWorkload};

/// Names accepted by `AUTO_ASSIGN_STRATEGY`
pub const STRATEGY_NAMES: &[&str] = &[LeastLoadedStrategy::NAME, RoundRobinStrategy::NAME];

pub trait AssignmentStrategy: Send + Sync {
    /// Pick an agent, or None when nobody qualifies
    fn select_agent(&self, candidates: &[AgentWorkload]) -> Option<AgentWorkload>;

    /// Tag recorded on assignments this strategy produced
    fn name(&self) -> &'static str;
}

/// AVAILABLE agent with the fewest active tickets; ties keep candidate order
#[derive(Debug, Default)]
pub struct LeastLoadedStrategy;

impl LeastLoadedStrategy {
    pub const NAME: &'static str = "least_loaded";
}

impl AssignmentStrategy for LeastLoadedStrategy {
    fn select_agent(&self, candidates: &[AgentWorkload]) -> Option<AgentWorkload> {
        let mut available: Vec<&AgentWorkload> = candidates
            .iter()
            .filter(|a| a.status == AgentStatus::Available)
            .collect();
        // sort_by_key is stable: equal loads stay in candidate order
        available.sort_by_key(|a| a.active_tickets);
        available.first().map(|a| (*a).clone())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Rotates through AVAILABLE agents, resuming after the last one picked
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    last_agent_id: Mutex<Option<String>>,
}

impl RoundRobinStrategy {
    pub const NAME: &'static str = "round_robin";
}

impl AssignmentStrategy for RoundRobinStrategy {
    fn select_agent(&self, candidates: &[AgentWorkload]) -> Option<AgentWorkload> {
        let available: Vec<&AgentWorkload> = candidates
            .iter()
            .filter(|a| a.status == AgentStatus::Available)
            .collect();
        if available.is_empty() {
            return None;
        }

        let mut last = self.last_agent_id.lock();
        let next = last
            .as_ref()
            .and_then(|id| available.iter().position(|a| &a.agent_id == id))
            .map(|pos| (pos + 1) % available.len())
            .unwrap_or(0);

        let chosen = available[next].clone();
        *last = Some(chosen.agent_id.clone());
        Some(chosen)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Build a strategy from its configured name
pub fn strategy_from_name(name: &str) -> Option<Box<dyn AssignmentStrategy>> {
    match name {
        LeastLoadedStrategy::NAME => Some(Box::new(LeastLoadedStrategy)),
        RoundRobinStrategy::NAME => Some(Box::new(RoundRobinStrategy::default())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, active: u32, status: AgentStatus) -> AgentWorkload {
        let mut a = AgentWorkload::new(id, id, 0);
        a.active_tickets = active;
        a.status = status;
        a
    }

    #[test]
    fn test_least_loaded_picks_fewest_active() {
        let candidates = vec![
            agent("a", 3, AgentStatus::Available),
            agent("b", 1, AgentStatus::Available),
            agent("c", 0, AgentStatus::Offline),
            agent("d", 0, AgentStatus::Busy),
        ];
        let chosen = LeastLoadedStrategy.select_agent(&candidates).unwrap();
        assert_eq!(chosen.agent_id, "b");
    }

    #[test]
    fn test_least_loaded_tie_keeps_first() {
        let candidates = vec![
            agent("first", 2, AgentStatus::Available),
            agent("second", 2, AgentStatus::Available),
        ];
        let chosen = LeastLoadedStrategy.select_agent(&candidates).unwrap();
        assert_eq!(chosen.agent_id, "first");
    }

    #[test]
    fn test_no_available_candidates() {
        let candidates = vec![agent("a", 0, AgentStatus::Offline)];
        assert!(LeastLoadedStrategy.select_agent(&candidates).is_none());
        assert!(LeastLoadedStrategy.select_agent(&[]).is_none());
        assert!(RoundRobinStrategy::default().select_agent(&candidates).is_none());
    }

    #[test]
    fn test_round_robin_rotates() {
        let strategy = RoundRobinStrategy::default();
        let candidates = vec![
            agent("a", 5, AgentStatus::Available),
            agent("b", 0, AgentStatus::Available),
            agent("c", 1, AgentStatus::Available),
        ];
        let picks: Vec<String> = (0..4)
            .map(|_| strategy.select_agent(&candidates).unwrap().agent_id)
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(strategy_from_name("least_loaded").unwrap().name(), "least_loaded");
        assert_eq!(strategy_from_name("round_robin").unwrap().name(), "round_robin");
        assert!(strategy_from_name("skill_match").is_none());
    }
}
