//! Agent Workload Model (坐席负载)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Agent availability status
///
/// BUSY is derived from the active ticket count; OFFLINE is only ever set by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    #[default]
    Available,
    Busy,
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Busy => "BUSY",
            Self::Offline => "OFFLINE",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVAILABLE" => Ok(Self::Available),
            "BUSY" => Ok(Self::Busy),
            "OFFLINE" => Ok(Self::Offline),
            other => Err(format!("unknown agent status: {other}")),
        }
    }
}

/// Per-agent workload counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentWorkload {
    pub agent_id: String,
    pub username: String,
    /// Number of CURRENT assignments held by this agent
    pub active_tickets: u32,
    /// Lifetime number of assignments received
    pub total_assigned_tickets: u64,
    pub completed_tickets: u64,
    pub status: AgentStatus,
    pub last_assigned_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AgentWorkload {
    pub fn new(agent_id: impl Into<String>, username: impl Into<String>, now: i64) -> Self {
        Self {
            agent_id: agent_id.into(),
            username: username.into(),
            active_tickets: 0,
            total_assigned_tickets: 0,
            completed_tickets: 0,
            status: AgentStatus::Available,
            last_assigned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remaining_capacity(&self, capacity: u32) -> u32 {
        capacity.saturating_sub(self.active_tickets)
    }
}

/// Register agent payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegister {
    pub agent_id: String,
    pub username: String,
}

/// Update agent status payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusUpdate {
    pub status: AgentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_uppercase() {
        let json = serde_json::to_string(&AgentStatus::Offline).unwrap();
        assert_eq!(json, "\"OFFLINE\"");
        assert_eq!("busy".parse::<AgentStatus>().unwrap(), AgentStatus::Busy);
        assert!("away".parse::<AgentStatus>().is_err());
    }

    #[test]
    fn test_remaining_capacity() {
        let mut agent = AgentWorkload::new("a1", "alice", 0);
        assert_eq!(agent.remaining_capacity(2), 2);

        agent.active_tickets = 2;
        assert_eq!(agent.remaining_capacity(2), 0);

        // 超出容量时不下溢
        agent.active_tickets = 3;
        assert_eq!(agent.remaining_capacity(2), 0);
    }
}
