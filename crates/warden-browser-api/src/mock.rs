//! Mock rule table for testing

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::{
    BrowserError, BrowserEvent, BrowserResult, CompiledRule, InstalledRule, RuleTable, TabId,
};

/// In-memory rule table for unit/integration testing.
///
/// Records everything the service does to it and can inject failures and
/// navigation events.
pub struct MockRuleTable {
    rules: Arc<Mutex<Vec<InstalledRule>>>,
    redirects: Arc<Mutex<Vec<(TabId, String)>>>,
    event_tx: mpsc::UnboundedSender<BrowserEvent>,
    event_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<BrowserEvent>>>>,

    /// Configure list_rules to fail
    pub fail_list: Arc<Mutex<bool>>,

    /// Configure remove_rules to fail
    pub fail_remove: Arc<Mutex<bool>>,

    /// Configure add_rules to fail
    pub fail_add: Arc<Mutex<bool>>,
}

impl MockRuleTable {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            rules: Arc::new(Mutex::new(Vec::new())),
            redirects: Arc::new(Mutex::new(Vec::new())),
            event_tx: tx,
            event_rx: Arc::new(Mutex::new(Some(rx))),
            fail_list: Arc::new(Mutex::new(false)),
            fail_remove: Arc::new(Mutex::new(false)),
            fail_add: Arc::new(Mutex::new(false)),
        }
    }

    /// Snapshot of the currently installed rules
    pub fn installed_rules(&self) -> Vec<InstalledRule> {
        self.rules.lock().unwrap().clone()
    }

    /// Redirects issued through the fallback path, in call order
    pub fn recorded_redirects(&self) -> Vec<(TabId, String)> {
        self.redirects.lock().unwrap().clone()
    }

    /// Pre-install rules, as if left over from an earlier run
    pub fn preinstall(&self, rules: Vec<InstalledRule>) {
        *self.rules.lock().unwrap() = rules;
    }

    /// Emit a navigation-started event
    pub fn simulate_navigation(&self, tab: TabId, url: impl Into<String>) {
        let _ = self.event_tx.send(BrowserEvent::NavigationStarted {
            tab,
            url: url.into(),
        });
    }
}

impl Default for MockRuleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleTable for MockRuleTable {
    async fn list_rules(&self) -> BrowserResult<Vec<InstalledRule>> {
        if *self.fail_list.lock().unwrap() {
            return Err(BrowserError::Internal("mock list failure".into()));
        }
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn remove_rules(&self, ids: Vec<u32>) -> BrowserResult<()> {
        if *self.fail_remove.lock().unwrap() {
            return Err(BrowserError::Internal("mock remove failure".into()));
        }
        self.rules.lock().unwrap().retain(|r| !ids.contains(&r.id));
        Ok(())
    }

    async fn add_rules(&self, rules: Vec<CompiledRule>) -> BrowserResult<()> {
        if *self.fail_add.lock().unwrap() {
            return Err(BrowserError::Internal("mock add failure".into()));
        }
        self.rules.lock().unwrap().extend(rules);
        Ok(())
    }

    async fn redirect_navigation(&self, tab: TabId, target: String) -> BrowserResult<()> {
        self.redirects.lock().unwrap().push((tab, target));
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<BrowserEvent> {
        self.event_rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe() can only be called once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_list_remove_round_trip() {
        let table = MockRuleTable::new();

        table
            .add_rules(vec![
                CompiledRule::redirect(1, "*://*a.com*"),
                CompiledRule::redirect(2, "*://*b.com*"),
            ])
            .await
            .unwrap();

        assert_eq!(table.list_rules().await.unwrap().len(), 2);

        table.remove_rules(vec![1]).await.unwrap();
        let remaining = table.list_rules().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
    }

    #[tokio::test]
    async fn failure_injection() {
        let table = MockRuleTable::new();
        *table.fail_add.lock().unwrap() = true;

        let result = table
            .add_rules(vec![CompiledRule::redirect(1, "*://*a.com*")])
            .await;
        assert!(result.is_err());
        assert!(table.installed_rules().is_empty());
    }

    #[tokio::test]
    async fn navigation_events_are_delivered() {
        let table = MockRuleTable::new();
        let mut rx = table.subscribe();

        table.simulate_navigation(TabId(4), "https://a.com/page");

        let BrowserEvent::NavigationStarted { tab, url } = rx.recv().await.unwrap();
        assert_eq!(tab, TabId(4));
        assert_eq!(url, "https://a.com/page");
    }
}
