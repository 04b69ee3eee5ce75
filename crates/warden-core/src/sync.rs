//! Rule synchronization
//!
//! Reconciles the browser's live rule table with a compiled batch using
//! full-replace semantics: remove everything installed, then add the new
//! batch. No diffing; rule sets are small. The table is briefly empty
//! between the two calls — the navigation fallback check covers that
//! window. Computing a remove/keep diff would shrink it, noted as an open
//! improvement.

use std::sync::{Arc, Mutex};
use tracing::debug;
use warden_browser_api::{BrowserResult, CompiledRule, RuleTable};

/// Reconciles desired rule batches against the live rule table.
pub struct RuleSynchronizer {
    table: Arc<dyn RuleTable>,
    /// What the last completed synchronize installed. Diagnostic only;
    /// every pass recompiles from the store, never from this.
    last_installed: Mutex<Vec<CompiledRule>>,
}

impl RuleSynchronizer {
    pub fn new(table: Arc<dyn RuleTable>) -> Self {
        Self {
            table,
            last_installed: Mutex::new(Vec::new()),
        }
    }

    /// Replace the installed rule set with `desired`.
    pub async fn synchronize(&self, desired: Vec<CompiledRule>) -> BrowserResult<()> {
        let existing = self.table.list_rules().await?;
        if !existing.is_empty() {
            let ids: Vec<u32> = existing.iter().map(|rule| rule.id).collect();
            self.table.remove_rules(ids).await?;
            debug!(removed = existing.len(), "Removed existing rules");
        }

        if !desired.is_empty() {
            self.table.add_rules(desired.clone()).await?;
            debug!(added = desired.len(), "Installed rules");
        }

        *self.last_installed.lock().unwrap() = desired;
        Ok(())
    }

    /// Snapshot of the last installed batch
    pub fn last_installed(&self) -> Vec<CompiledRule> {
        self.last_installed.lock().unwrap().clone()
    }

    /// Number of rules installed by the last completed synchronize
    pub fn active_rule_count(&self) -> usize {
        self.last_installed.lock().unwrap().len()
    }
}
