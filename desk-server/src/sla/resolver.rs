//! SlaRuleResolver - (priority, category) → time budget
//!
//! Lookup order:
//! 1. exact `(priority, category)` rule
//! 2. category-agnostic `(priority, none)` rule
//! 3. synthesize the built-in default for the priority, persist it, reuse it afterwards
//!
//! A missing priority resolves as MEDIUM.

use crate::error::{DeskError, DeskResult};
use crate::storage::{DeskStorage, StorageError};
use parking_lot::RwLock;
use redb::WriteTransaction;
use shared::models::{SlaRule, SlaRuleUpsert, TicketPriority};
use shared::util::{new_id, now_millis};
use std::collections::HashMap;
use std::sync::Arc;

/// Storage key of a rule
pub fn rule_key(priority: TicketPriority, category: Option<&str>) -> String {
    format!("{}|{}", priority.as_str(), category.unwrap_or(""))
}

#[derive(Debug, Clone)]
pub struct SlaRuleResolver {
    storage: DeskStorage,
    /// Rules already read from storage
    cache: Arc<RwLock<HashMap<String, SlaRule>>>,
}

impl SlaRuleResolver {
    pub fn new(storage: DeskStorage) -> Self {
        Self {
            storage,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn resolve(
        &self,
        priority: Option<TicketPriority>,
        category: Option<&str>,
    ) -> DeskResult<SlaRule> {
        let txn = self.storage.begin_write()?;
        let rule = self.resolve_in(&txn, priority, category, now_millis())?;
        txn.commit().map_err(StorageError::from)?;
        Ok(rule)
    }

    /// Resolve inside the caller's transaction; a synthesized default commits with it
    pub fn resolve_in(
        &self,
        txn: &WriteTransaction,
        priority: Option<TicketPriority>,
        category: Option<&str>,
        now: i64,
    ) -> DeskResult<SlaRule> {
        let priority = priority.unwrap_or_default();
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        if let Some(cat) = category
            && let Some(rule) = self.lookup(txn, &rule_key(priority, Some(cat)))?
        {
            return Ok(rule);
        }

        let fallback_key = rule_key(priority, None);
        if let Some(rule) = self.lookup(txn, &fallback_key)? {
            return Ok(rule);
        }

        let (response_minutes, resolution_hours) = priority.default_budget();
        let rule = SlaRule {
            rule_id: new_id(),
            priority,
            category: None,
            response_time_minutes: response_minutes,
            resolution_time_hours: resolution_hours,
            business_hours_only: false,
            escalation_time_minutes: None,
            is_default: true,
            created_at: now,
            updated_at: now,
        };
        self.storage.store_rule(txn, &fallback_key, &rule)?;
        tracing::info!(
            priority = %priority,
            response_minutes,
            resolution_hours,
            "Synthesized default SLA rule"
        );
        Ok(rule)
    }

    fn lookup(&self, txn: &WriteTransaction, key: &str) -> DeskResult<Option<SlaRule>> {
        if let Some(rule) = self.cache.read().get(key) {
            return Ok(Some(rule.clone()));
        }
        let rule = self.storage.get_rule_txn(txn, key)?;
        if let Some(rule) = &rule {
            self.cache.write().insert(key.to_string(), rule.clone());
        }
        Ok(rule)
    }

    /// Create or replace the rule for `(priority, category)`
    pub fn upsert_rule(&self, req: SlaRuleUpsert) -> DeskResult<SlaRule> {
        if req.response_time_minutes <= 0 || req.resolution_time_hours <= 0 {
            return Err(DeskError::Validation(
                "response and resolution times must be positive".into(),
            ));
        }
        if req.response_time_minutes > req.resolution_time_hours * 60 {
            return Err(DeskError::Validation(
                "response time must not exceed resolution time".into(),
            ));
        }
        if let Some(escalation) = req.escalation_time_minutes
            && escalation <= 0
        {
            return Err(DeskError::Validation(
                "escalation time must be positive".into(),
            ));
        }

        let category = req
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let key = rule_key(req.priority, category.as_deref());
        let now = now_millis();

        let txn = self.storage.begin_write()?;
        let existing = self.storage.get_rule_txn(&txn, &key)?;
        let rule = SlaRule {
            rule_id: existing
                .as_ref()
                .map(|r| r.rule_id.clone())
                .unwrap_or_else(new_id),
            priority: req.priority,
            category,
            response_time_minutes: req.response_time_minutes,
            resolution_time_hours: req.resolution_time_hours,
            business_hours_only: req.business_hours_only,
            escalation_time_minutes: req.escalation_time_minutes,
            is_default: false,
            created_at: existing.as_ref().map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.storage.store_rule(&txn, &key, &rule)?;
        txn.commit().map_err(StorageError::from)?;

        self.cache.write().remove(&key);
        tracing::info!(key = %key, rule_id = %rule.rule_id, "SLA rule saved");
        Ok(rule)
    }

    pub fn list_rules(&self) -> DeskResult<Vec<SlaRule>> {
        let mut rules = self.storage.list_rules()?;
        rules.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.category.cmp(&b.category))
        });
        Ok(rules)
    }
}
