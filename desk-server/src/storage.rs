//! redb-based storage layer for the desk engine
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `tickets` | `ticket_id` | `TicketRef` | Ticket references from the ticket subsystem |
//! | `agents` | `agent_id` | `AgentWorkload` | Per-agent workload counters |
//! | `assignments` | `assignment_id` | `TicketAssignment` | Assignment ledger (history included) |
//! | `current_assignments` | `ticket_id` | `assignment_id` | The single CURRENT record per ticket |
//! | `sla_rules` | `PRIORITY\|category` | `SlaRule` | SLA rules (configured or synthesized) |
//! | `sla_tracking` | `ticket_id` | `SlaTracking` | Per-ticket SLA timers |
//! | `open_trackers` | `ticket_id` | `resolution_due_at` | Unresolved trackers scanned by the sweeper |
//!
//! Every value table stores JSON. Writers receive the caller's `WriteTransaction`, so
//! a ledger operation and the counter updates it implies commit or roll back together.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{AgentWorkload, SlaRule, SlaTracking, TicketAssignment, TicketRef};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const TICKETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tickets");

const AGENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("agents");

const ASSIGNMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("assignments");

/// ticket_id -> assignment_id of the CURRENT record
const CURRENT_ASSIGNMENTS_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("current_assignments");

const SLA_RULES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sla_rules");

const SLA_TRACKING_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sla_tracking");

/// ticket_id -> resolution_due_at, only while resolved_at is unset
const OPEN_TRACKERS_TABLE: TableDefinition<&str, i64> = TableDefinition::new("open_trackers");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Desk storage backed by redb
#[derive(Clone)]
pub struct DeskStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for DeskStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeskStorage").finish_non_exhaustive()
    }
}

impl DeskStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: a commit is persistent
    /// once `commit()` returns and the file is always in a consistent state.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init_tables(&db)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init_tables(&db)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn init_tables(db: &Database) -> StorageResult<()> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TICKETS_TABLE)?;
            let _ = write_txn.open_table(AGENTS_TABLE)?;
            let _ = write_txn.open_table(ASSIGNMENTS_TABLE)?;
            let _ = write_txn.open_table(CURRENT_ASSIGNMENTS_TABLE)?;
            let _ = write_txn.open_table(SLA_RULES_TABLE)?;
            let _ = write_txn.open_table(SLA_TRACKING_TABLE)?;
            let _ = write_txn.open_table(OPEN_TRACKERS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction
    ///
    /// redb allows a single writer at a time; concurrent callers block here, which
    /// serializes every counter update.
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Tickets ==========

    pub fn store_ticket(&self, txn: &WriteTransaction, ticket: &TicketRef) -> StorageResult<()> {
        let mut table = txn.open_table(TICKETS_TABLE)?;
        let value = serde_json::to_vec(ticket)?;
        table.insert(ticket.ticket_id.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_ticket(&self, ticket_id: &str) -> StorageResult<Option<TicketRef>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TICKETS_TABLE)?;
        match table.get(ticket_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_ticket_txn(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
    ) -> StorageResult<Option<TicketRef>> {
        let table = txn.open_table(TICKETS_TABLE)?;
        match table.get(ticket_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // ========== Agents ==========

    pub fn store_agent(&self, txn: &WriteTransaction, agent: &AgentWorkload) -> StorageResult<()> {
        let mut table = txn.open_table(AGENTS_TABLE)?;
        let value = serde_json::to_vec(agent)?;
        table.insert(agent.agent_id.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_agent(&self, agent_id: &str) -> StorageResult<Option<AgentWorkload>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AGENTS_TABLE)?;
        match table.get(agent_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_agent_txn(
        &self,
        txn: &WriteTransaction,
        agent_id: &str,
    ) -> StorageResult<Option<AgentWorkload>> {
        let table = txn.open_table(AGENTS_TABLE)?;
        match table.get(agent_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_agents(&self) -> StorageResult<Vec<AgentWorkload>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AGENTS_TABLE)?;

        let mut agents = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            agents.push(serde_json::from_slice(value.value())?);
        }
        Ok(agents)
    }

    /// All agents, read inside a write transaction (candidate selection)
    pub fn list_agents_txn(&self, txn: &WriteTransaction) -> StorageResult<Vec<AgentWorkload>> {
        let table = txn.open_table(AGENTS_TABLE)?;

        let mut agents = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            agents.push(serde_json::from_slice(value.value())?);
        }
        Ok(agents)
    }

    // ========== Assignments ==========

    pub fn store_assignment(
        &self,
        txn: &WriteTransaction,
        record: &TicketAssignment,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(ASSIGNMENTS_TABLE)?;
        let value = serde_json::to_vec(record)?;
        table.insert(record.assignment_id.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_assignment(&self, assignment_id: &str) -> StorageResult<Option<TicketAssignment>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ASSIGNMENTS_TABLE)?;
        match table.get(assignment_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_assignment_txn(
        &self,
        txn: &WriteTransaction,
        assignment_id: &str,
    ) -> StorageResult<Option<TicketAssignment>> {
        let table = txn.open_table(ASSIGNMENTS_TABLE)?;
        match table.get(assignment_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn remove_assignment(&self, txn: &WriteTransaction, assignment_id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(ASSIGNMENTS_TABLE)?;
        table.remove(assignment_id)?;
        Ok(())
    }

    /// Every assignment record, history included
    pub fn list_assignments(&self) -> StorageResult<Vec<TicketAssignment>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ASSIGNMENTS_TABLE)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    // ========== Current Assignment Index ==========

    pub fn set_current_assignment(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
        assignment_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(CURRENT_ASSIGNMENTS_TABLE)?;
        table.insert(ticket_id, assignment_id)?;
        Ok(())
    }

    pub fn clear_current_assignment(&self, txn: &WriteTransaction, ticket_id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(CURRENT_ASSIGNMENTS_TABLE)?;
        table.remove(ticket_id)?;
        Ok(())
    }

    pub fn get_current_assignment_id(&self, ticket_id: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CURRENT_ASSIGNMENTS_TABLE)?;
        Ok(table.get(ticket_id)?.map(|guard| guard.value().to_string()))
    }

    pub fn get_current_assignment_id_txn(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(CURRENT_ASSIGNMENTS_TABLE)?;
        Ok(table.get(ticket_id)?.map(|guard| guard.value().to_string()))
    }

    /// CURRENT records held by an agent
    pub fn current_assignments_for_agent(&self, agent_id: &str) -> StorageResult<Vec<TicketAssignment>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(CURRENT_ASSIGNMENTS_TABLE)?;
        let records = read_txn.open_table(ASSIGNMENTS_TABLE)?;

        let mut current = Vec::new();
        for result in index.iter()? {
            let (_ticket, assignment_id) = result?;
            if let Some(value) = records.get(assignment_id.value())? {
                let record: TicketAssignment = serde_json::from_slice(value.value())?;
                if record.agent_id == agent_id {
                    current.push(record);
                }
            }
        }
        current.sort_by_key(|r| r.assigned_at);
        Ok(current)
    }

    // ========== SLA Rules ==========

    pub fn store_rule(&self, txn: &WriteTransaction, key: &str, rule: &SlaRule) -> StorageResult<()> {
        let mut table = txn.open_table(SLA_RULES_TABLE)?;
        let value = serde_json::to_vec(rule)?;
        table.insert(key, value.as_slice())?;
        Ok(())
    }

    pub fn get_rule_txn(&self, txn: &WriteTransaction, key: &str) -> StorageResult<Option<SlaRule>> {
        let table = txn.open_table(SLA_RULES_TABLE)?;
        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_rules(&self) -> StorageResult<Vec<SlaRule>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SLA_RULES_TABLE)?;

        let mut rules = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            rules.push(serde_json::from_slice(value.value())?);
        }
        Ok(rules)
    }

    // ========== SLA Tracking ==========

    /// Store a tracker and keep the open-tracker index in step with `resolved_at`
    pub fn store_tracking(&self, txn: &WriteTransaction, tracking: &SlaTracking) -> StorageResult<()> {
        let mut table = txn.open_table(SLA_TRACKING_TABLE)?;
        let value = serde_json::to_vec(tracking)?;
        table.insert(tracking.ticket_id.as_str(), value.as_slice())?;

        let mut open = txn.open_table(OPEN_TRACKERS_TABLE)?;
        if tracking.is_resolved() {
            open.remove(tracking.ticket_id.as_str())?;
        } else {
            open.insert(tracking.ticket_id.as_str(), tracking.resolution_due_at)?;
        }
        Ok(())
    }

    pub fn get_tracking(&self, ticket_id: &str) -> StorageResult<Option<SlaTracking>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SLA_TRACKING_TABLE)?;
        match table.get(ticket_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_tracking_txn(
        &self,
        txn: &WriteTransaction,
        ticket_id: &str,
    ) -> StorageResult<Option<SlaTracking>> {
        let table = txn.open_table(SLA_TRACKING_TABLE)?;
        match table.get(ticket_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_trackings(&self) -> StorageResult<Vec<SlaTracking>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SLA_TRACKING_TABLE)?;

        let mut trackings = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            trackings.push(serde_json::from_slice(value.value())?);
        }
        Ok(trackings)
    }

    /// Ticket ids of unresolved trackers, nearest resolution due time first
    pub fn get_open_tracker_ids(&self) -> StorageResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OPEN_TRACKERS_TABLE)?;

        let mut open: Vec<(i64, String)> = Vec::new();
        for result in table.iter()? {
            let (key, due) = result?;
            open.push((due.value(), key.value().to_string()));
        }
        open.sort();
        Ok(open.into_iter().map(|(_, id)| id).collect())
    }

    // ========== Stats ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        Ok(StorageStats {
            ticket_count: read_txn.open_table(TICKETS_TABLE)?.len()?,
            agent_count: read_txn.open_table(AGENTS_TABLE)?.len()?,
            assignment_count: read_txn.open_table(ASSIGNMENTS_TABLE)?.len()?,
            current_assignment_count: read_txn.open_table(CURRENT_ASSIGNMENTS_TABLE)?.len()?,
            tracking_count: read_txn.open_table(SLA_TRACKING_TABLE)?.len()?,
            open_tracker_count: read_txn.open_table(OPEN_TRACKERS_TABLE)?.len()?,
        })
    }
}

#[cfg(test)]
impl DeskStorage {
    /// Write an arbitrary tracker row and index it as open
    pub(crate) fn insert_raw_tracking(
        &self,
        ticket_id: &str,
        raw: &[u8],
        due_at: i64,
    ) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(SLA_TRACKING_TABLE)?;
            table.insert(ticket_id, raw)?;
            let mut open = txn.open_table(OPEN_TRACKERS_TABLE)?;
            open.insert(ticket_id, due_at)?;
        }
        txn.commit()?;
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStats {
    pub ticket_count: u64,
    pub agent_count: u64,
    pub assignment_count: u64,
    pub current_assignment_count: u64,
    pub tracking_count: u64,
    pub open_tracker_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{SlaStatus, TicketPriority};
    use shared::util::{HOUR_MS, MINUTE_MS};

    fn tracking(ticket_id: &str, due: i64) -> SlaTracking {
        SlaTracking {
            tracking_id: format!("trk-{ticket_id}"),
            ticket_id: ticket_id.to_string(),
            priority: TicketPriority::High,
            category: None,
            sla_start_time: 0,
            response_due_at: 60 * MINUTE_MS,
            resolution_due_at: due,
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
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_agent_roundtrip_in_txn() {
        let storage = DeskStorage::open_in_memory().unwrap();
        let agent = AgentWorkload::new("a1", "alice", 10);

        let txn = storage.begin_write().unwrap();
        storage.store_agent(&txn, &agent).unwrap();
        assert_eq!(storage.get_agent_txn(&txn, "a1").unwrap(), Some(agent.clone()));
        txn.commit().unwrap();

        assert_eq!(storage.get_agent("a1").unwrap(), Some(agent));
        assert!(storage.get_agent("missing").unwrap().is_none());
    }

    #[test]
    fn test_aborted_txn_leaves_nothing() {
        let storage = DeskStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        storage
            .store_agent(&txn, &AgentWorkload::new("a1", "alice", 0))
            .unwrap();
        drop(txn);

        assert!(storage.get_agent("a1").unwrap().is_none());
    }

    #[test]
    fn test_open_tracker_index_follows_resolution() {
        let storage = DeskStorage::open_in_memory().unwrap();
        let late = tracking("t-late", 8 * HOUR_MS);
        let soon = tracking("t-soon", 4 * HOUR_MS);

        let txn = storage.begin_write().unwrap();
        storage.store_tracking(&txn, &late).unwrap();
        storage.store_tracking(&txn, &soon).unwrap();
        txn.commit().unwrap();

        assert_eq!(
            storage.get_open_tracker_ids().unwrap(),
            vec!["t-soon".to_string(), "t-late".to_string()]
        );

        let mut resolved = soon.clone();
        resolved.resolved_at = Some(HOUR_MS);
        let txn = storage.begin_write().unwrap();
        storage.store_tracking(&txn, &resolved).unwrap();
        txn.commit().unwrap();

        assert_eq!(storage.get_open_tracker_ids().unwrap(), vec!["t-late".to_string()]);
        assert_eq!(storage.get_stats().unwrap().tracking_count, 2);
    }

    #[test]
    fn test_current_assignment_index() {
        let storage = DeskStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        storage.set_current_assignment(&txn, "t1", "as-1").unwrap();
        txn.commit().unwrap();
        assert_eq!(
            storage.get_current_assignment_id("t1").unwrap().as_deref(),
            Some("as-1")
        );

        let txn = storage.begin_write().unwrap();
        storage.clear_current_assignment(&txn, "t1").unwrap();
        txn.commit().unwrap();
        assert!(storage.get_current_assignment_id("t1").unwrap().is_none());
    }
}
