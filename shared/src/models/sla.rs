//! SLA Model (服务等级协议)

use crate::util::{HOUR_MS, MINUTE_MS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ticket priority, most urgent first. Missing priority resolves as MEDIUM for rule lookup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Built-in (response minutes, resolution hours) used when no rule is configured
    pub fn default_budget(&self) -> (i64, i64) {
        match self {
            Self::Critical => (15, 4),
            Self::High => (60, 8),
            Self::Medium => (240, 24),
            Self::Low => (480, 48),
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Self::Critical),
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaStatus {
    #[default]
    OnTime,
    Warning,
    Breached,
    Met,
    Paused,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnTime => "ON_TIME",
            Self::Warning => "WARNING",
            Self::Breached => "BREACHED",
            Self::Met => "MET",
            Self::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which SLA timer a warning or breach refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaAxis {
    Response,
    Resolution,
}

impl SlaAxis {
    pub fn breach_reason(&self) -> &'static str {
        match self {
            Self::Response => "Response SLA exceeded",
            Self::Resolution => "Resolution SLA exceeded",
        }
    }
}

impl fmt::Display for SlaAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response => f.write_str("response"),
            Self::Resolution => f.write_str("resolution"),
        }
    }
}

/// Time budget for a (priority, category) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaRule {
    pub rule_id: String,
    pub priority: TicketPriority,
    /// None = applies to any category of this priority
    pub category: Option<String>,
    pub response_time_minutes: i64,
    pub resolution_time_hours: i64,
    #[serde(default)]
    pub business_hours_only: bool,
    pub escalation_time_minutes: Option<i64>,
    /// Synthesized from the built-in table rather than configured
    #[serde(default)]
    pub is_default: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SlaRule {
    pub fn response_window_ms(&self) -> i64 {
        self.response_time_minutes * MINUTE_MS
    }

    pub fn resolution_window_ms(&self) -> i64 {
        self.resolution_time_hours * HOUR_MS
    }
}

/// Create or replace an SLA rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaRuleUpsert {
    pub priority: TicketPriority,
    pub category: Option<String>,
    pub response_time_minutes: i64,
    pub resolution_time_hours: i64,
    #[serde(default)]
    pub business_hours_only: bool,
    pub escalation_time_minutes: Option<i64>,
}

/// Per-ticket SLA timers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaTracking {
    pub tracking_id: String,
    pub ticket_id: String,
    pub priority: TicketPriority,
    pub category: Option<String>,
    pub sla_start_time: i64,
    pub response_due_at: i64,
    pub resolution_due_at: i64,
    pub first_response_at: Option<i64>,
    #[serde(default)]
    pub response_breached: bool,
    /// Elapsed minutes until first response
    pub response_time_minutes: Option<i64>,
    pub resolved_at: Option<i64>,
    #[serde(default)]
    pub resolution_breached: bool,
    /// Elapsed hours until resolution, 2 decimals
    pub resolution_time_hours: Option<f64>,
    pub status: SlaStatus,
    pub breach_reason: Option<String>,
    pub breached_at: Option<i64>,
    pub assigned_agent_id: Option<String>,
    pub assigned_agent_username: Option<String>,
    pub paused_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SlaTracking {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// The due time of the timer still running: resolution while unresolved, else response
    pub fn open_due_at(&self) -> i64 {
        if self.resolved_at.is_none() {
            self.resolution_due_at
        } else {
            self.response_due_at
        }
    }

    /// Fraction of the window `[sla_start_time, due_at]` consumed at `now`
    pub fn elapsed_fraction(&self, due_at: i64, now: i64) -> f64 {
        let total = due_at - self.sla_start_time;
        if total <= 0 {
            return 1.0;
        }
        (now - self.sla_start_time) as f64 / total as f64
    }

    /// Mark breached on `axis`. Keeps the first breach time and reason.
    pub fn mark_breached(&mut self, axis: SlaAxis, now: i64) {
        match axis {
            SlaAxis::Response => self.response_breached = true,
            SlaAxis::Resolution => self.resolution_breached = true,
        }
        self.status = SlaStatus::Breached;
        if self.breached_at.is_none() {
            self.breached_at = Some(now);
        }
        self.breach_reason = Some(axis.breach_reason().to_string());
        self.updated_at = now;
    }
}

/// Aggregate SLA compliance across all trackers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaComplianceSummary {
    pub total: usize,
    pub on_time: usize,
    pub warning: usize,
    pub breached: usize,
    pub met: usize,
    pub paused: usize,
    pub response_breaches: usize,
    pub resolution_breaches: usize,
    /// met / (met + resolved breached) as a percentage, 100 when nothing has closed yet
    pub compliance_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking() -> SlaTracking {
        SlaTracking {
            tracking_id: "trk".into(),
            ticket_id: "t1".into(),
            priority: TicketPriority::Critical,
            category: None,
            sla_start_time: 0,
            response_due_at: 15 * MINUTE_MS,
            resolution_due_at: 4 * HOUR_MS,
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
    fn test_default_budget_table() {
        assert_eq!(TicketPriority::Critical.default_budget(), (15, 4));
        assert_eq!(TicketPriority::High.default_budget(), (60, 8));
        assert_eq!(TicketPriority::Medium.default_budget(), (240, 24));
        assert_eq!(TicketPriority::Low.default_budget(), (480, 48));
        assert_eq!(TicketPriority::default(), TicketPriority::Medium);
    }

    #[test]
    fn test_elapsed_fraction() {
        let t = tracking();
        let at = 3 * HOUR_MS + 13 * MINUTE_MS;
        let fraction = t.elapsed_fraction(t.resolution_due_at, at);
        assert!(fraction > 0.8 && fraction < 0.81);
    }

    #[test]
    fn test_mark_breached_keeps_first_breach_time() {
        let mut t = tracking();
        t.mark_breached(SlaAxis::Response, 100);
        t.mark_breached(SlaAxis::Resolution, 200);

        assert!(t.response_breached && t.resolution_breached);
        assert_eq!(t.breached_at, Some(100));
        assert_eq!(t.breach_reason.as_deref(), Some("Resolution SLA exceeded"));
        assert_eq!(t.status, SlaStatus::Breached);
    }

    #[test]
    fn test_axis_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SlaAxis::Response).unwrap(), "\"response\"");
    }
}
