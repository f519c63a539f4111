//! AgentWorkloadRegistry - 坐席负载登记
//!
//! The only place agent counters change. Every mutation takes the caller's
//! `WriteTransaction`, so the counter update commits with the ledger record that
//! caused it. redb admits one writer at a time, which serializes concurrent
//! updates to the same agent without extra locking.
//!
//! Status rules:
//! - OFFLINE is sticky: counter changes never clear it, only [`AgentWorkloadRegistry::set_status_in`]
//! - otherwise BUSY when `active >= BUSY_RATIO * capacity`, else AVAILABLE

use crate::error::{DeskError, DeskResult};
use crate::storage::DeskStorage;
use redb::WriteTransaction;
use shared::models::{AgentStatus, AgentWorkload};
use shared::util::now_millis;

/// Fraction of capacity at which an agent is considered BUSY
pub const BUSY_RATIO: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct AgentWorkloadRegistry {
    storage: DeskStorage,
    capacity: u32,
}

impl AgentWorkloadRegistry {
    pub fn new(storage: DeskStorage, capacity: u32) -> Self {
        Self { storage, capacity }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Status implied by the counters alone
    pub fn derive_status(&self, active_tickets: u32) -> AgentStatus {
        if f64::from(active_tickets) >= BUSY_RATIO * f64::from(self.capacity) {
            AgentStatus::Busy
        } else {
            AgentStatus::Available
        }
    }

    fn recompute_status(&self, agent: &mut AgentWorkload) {
        if agent.status != AgentStatus::Offline {
            agent.status = self.derive_status(agent.active_tickets);
        }
    }

    /// Reject agents that may not take another ticket
    pub fn ensure_can_accept(&self, agent: &AgentWorkload) -> DeskResult<()> {
        if agent.status == AgentStatus::Offline {
            return Err(DeskError::AgentUnavailable {
                agent_id: agent.agent_id.clone(),
            });
        }
        if agent.active_tickets >= self.capacity {
            return Err(DeskError::CapacityExceeded {
                agent_id: agent.agent_id.clone(),
                active: agent.active_tickets,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    // ========== Reads ==========

    pub fn get(&self, agent_id: &str) -> DeskResult<AgentWorkload> {
        self.storage
            .get_agent(agent_id)?
            .ok_or_else(|| DeskError::AgentNotFound(agent_id.to_string()))
    }

    pub fn get_in(&self, txn: &WriteTransaction, agent_id: &str) -> DeskResult<AgentWorkload> {
        self.storage
            .get_agent_txn(txn, agent_id)?
            .ok_or_else(|| DeskError::AgentNotFound(agent_id.to_string()))
    }

    pub fn list(&self) -> DeskResult<Vec<AgentWorkload>> {
        let mut agents = self.storage.list_agents()?;
        agents.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(agents)
    }

    /// AVAILABLE agents in a deterministic order (oldest registration first)
    pub fn available_candidates_in(&self, txn: &WriteTransaction) -> DeskResult<Vec<AgentWorkload>> {
        let mut agents: Vec<AgentWorkload> = self
            .storage
            .list_agents_txn(txn)?
            .into_iter()
            .filter(|a| a.status == AgentStatus::Available)
            .collect();
        agents.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        Ok(agents)
    }

    // ========== Mutations ==========

    /// Idempotent create-or-fetch
    pub fn register(&self, agent_id: &str, username: &str) -> DeskResult<AgentWorkload> {
        let txn = self.storage.begin_write()?;
        let agent = self.register_in(&txn, agent_id, username, now_millis())?;
        txn.commit().map_err(crate::storage::StorageError::from)?;
        Ok(agent)
    }

    pub fn register_in(
        &self,
        txn: &WriteTransaction,
        agent_id: &str,
        username: &str,
        now: i64,
    ) -> DeskResult<AgentWorkload> {
        if let Some(existing) = self.storage.get_agent_txn(txn, agent_id)? {
            return Ok(existing);
        }
        let agent = AgentWorkload::new(agent_id, username, now);
        self.storage.store_agent(txn, &agent)?;
        tracing::info!(agent_id = %agent_id, username = %username, "Agent registered");
        Ok(agent)
    }

    pub fn set_status(&self, agent_id: &str, status: AgentStatus) -> DeskResult<AgentWorkload> {
        let txn = self.storage.begin_write()?;
        let agent = self.set_status_in(&txn, agent_id, status, now_millis())?;
        txn.commit().map_err(crate::storage::StorageError::from)?;
        Ok(agent)
    }

    /// OFFLINE is stored as requested; any other status clears OFFLINE and re-derives
    /// AVAILABLE/BUSY from the counters.
    pub fn set_status_in(
        &self,
        txn: &WriteTransaction,
        agent_id: &str,
        status: AgentStatus,
        now: i64,
    ) -> DeskResult<AgentWorkload> {
        let mut agent = self.get_in(txn, agent_id)?;
        let previous = agent.status;
        agent.status = match status {
            AgentStatus::Offline => AgentStatus::Offline,
            _ => self.derive_status(agent.active_tickets),
        };
        agent.updated_at = now;
        self.storage.store_agent(txn, &agent)?;
        tracing::info!(agent_id = %agent_id, from = %previous, to = %agent.status, "Agent status changed");
        Ok(agent)
    }

    /// active + 1, total assigned + 1
    pub fn increment_active_in(
        &self,
        txn: &WriteTransaction,
        agent_id: &str,
        now: i64,
    ) -> DeskResult<AgentWorkload> {
        let mut agent = self.get_in(txn, agent_id)?;
        agent.active_tickets += 1;
        agent.total_assigned_tickets += 1;
        agent.last_assigned_at = Some(now);
        agent.updated_at = now;
        self.recompute_status(&mut agent);
        self.storage.store_agent(txn, &agent)?;
        Ok(agent)
    }

    /// active - 1, clamped at 0
    pub fn decrement_active_in(
        &self,
        txn: &WriteTransaction,
        agent_id: &str,
        now: i64,
    ) -> DeskResult<AgentWorkload> {
        let mut agent = self.get_in(txn, agent_id)?;
        if agent.active_tickets == 0 {
            tracing::warn!(agent_id = %agent_id, "Active ticket counter already at 0, clamping");
        }
        agent.active_tickets = agent.active_tickets.saturating_sub(1);
        agent.updated_at = now;
        self.recompute_status(&mut agent);
        self.storage.store_agent(txn, &agent)?;
        Ok(agent)
    }

    /// active - 1 (clamped), completed + 1
    pub fn record_completion_in(
        &self,
        txn: &WriteTransaction,
        agent_id: &str,
        now: i64,
    ) -> DeskResult<AgentWorkload> {
        let mut agent = self.get_in(txn, agent_id)?;
        agent.active_tickets = agent.active_tickets.saturating_sub(1);
        agent.completed_tickets += 1;
        agent.updated_at = now;
        self.recompute_status(&mut agent);
        self.storage.store_agent(txn, &agent)?;
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: u32) -> AgentWorkloadRegistry {
        AgentWorkloadRegistry::new(DeskStorage::open_in_memory().unwrap(), capacity)
    }

    fn bump(reg: &AgentWorkloadRegistry, agent_id: &str, times: u32) -> AgentWorkload {
        let txn = reg.storage.begin_write().unwrap();
        let mut agent = reg.get_in(&txn, agent_id).unwrap();
        for _ in 0..times {
            agent = reg.increment_active_in(&txn, agent_id, 1).unwrap();
        }
        txn.commit().unwrap();
        agent
    }

    #[test]
    fn test_register_is_idempotent() {
        let reg = registry(10);
        let first = reg.register("a1", "alice").unwrap();
        let second = reg.register("a1", "renamed").unwrap();

        assert_eq!(first, second);
        assert_eq!(second.username, "alice");
        assert_eq!(reg.list().unwrap().len(), 1);
    }

    #[test]
    fn test_busy_derived_at_eighty_percent() {
        let reg = registry(5);
        reg.register("a1", "alice").unwrap();

        assert_eq!(bump(&reg, "a1", 3).status, AgentStatus::Available);
        let agent = bump(&reg, "a1", 1);
        assert_eq!(agent.active_tickets, 4);
        assert_eq!(agent.status, AgentStatus::Busy);
        assert_eq!(agent.total_assigned_tickets, 4);
        assert_eq!(agent.last_assigned_at, Some(1));
    }

    #[test]
    fn test_decrement_clamps_at_zero() {
        let reg = registry(5);
        reg.register("a1", "alice").unwrap();

        let txn = reg.storage.begin_write().unwrap();
        let agent = reg.decrement_active_in(&txn, "a1", 2).unwrap();
        txn.commit().unwrap();

        assert_eq!(agent.active_tickets, 0);
        assert_eq!(agent.status, AgentStatus::Available);
    }

    #[test]
    fn test_offline_is_sticky_across_counter_changes() {
        let reg = registry(5);
        reg.register("a1", "alice").unwrap();
        bump(&reg, "a1", 2);
        reg.set_status("a1", AgentStatus::Offline).unwrap();

        let txn = reg.storage.begin_write().unwrap();
        let agent = reg.record_completion_in(&txn, "a1", 3).unwrap();
        txn.commit().unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
        assert_eq!(agent.active_tickets, 1);
        assert_eq!(agent.completed_tickets, 1);

        // Requesting any non-offline status re-derives from counters
        let agent = reg.set_status("a1", AgentStatus::Busy).unwrap();
        assert_eq!(agent.status, AgentStatus::Available);
    }

    #[test]
    fn test_ensure_can_accept() {
        let reg = registry(2);
        let mut agent = AgentWorkload::new("a1", "alice", 0);
        assert!(reg.ensure_can_accept(&agent).is_ok());

        agent.active_tickets = 2;
        assert!(matches!(
            reg.ensure_can_accept(&agent),
            Err(DeskError::CapacityExceeded { active: 2, capacity: 2, .. })
        ));

        agent.active_tickets = 0;
        agent.status = AgentStatus::Offline;
        assert!(matches!(
            reg.ensure_can_accept(&agent),
            Err(DeskError::AgentUnavailable { .. })
        ));
    }

    #[test]
    fn test_unknown_agent() {
        let reg = registry(2);
        assert!(matches!(
            reg.set_status("ghost", AgentStatus::Offline),
            Err(DeskError::AgentNotFound(_))
        ));
    }
}
