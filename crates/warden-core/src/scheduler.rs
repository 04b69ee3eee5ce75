//! The live re-evaluation loop
//!
//! An explicitly owned scheduler with `start()`/`stop()`. The loop runs a
//! compile+synchronize pass on a fixed period and whenever the policy
//! collection changes; UI surfaces can additionally run an awaited pass
//! through `run_pass` so their acknowledgment means "completed".

use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_store::{Store, StoreChange};

use crate::{compile, EngineResult, RuleSynchronizer};

/// Default pass period. Bounds worst-case staleness after a window
/// boundary crossing to 30 seconds.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(30);

/// Periodic re-evaluation driver.
pub struct Scheduler {
    store: Arc<dyn Store>,
    sync: Arc<RuleSynchronizer>,
    period: Duration,
    /// Held for the duration of a pass. Timer/notification ticks skip when
    /// it is taken; explicit passes queue on it.
    pass_lock: tokio::sync::Mutex<()>,
    last_pass_at: Mutex<Option<DateTime<Local>>>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, sync: Arc<RuleSynchronizer>, period: Duration) -> Self {
        Self {
            store,
            sync,
            period,
            pass_lock: tokio::sync::Mutex::new(()),
            last_pass_at: Mutex::new(None),
            loop_task: Mutex::new(None),
        }
    }

    /// Start the periodic loop. Restarting cancels any prior loop, so
    /// there is never more than one timer per scheduler. The first pass
    /// runs immediately.
    pub fn start(self: &Arc<Self>) {
        self.stop();

        let scheduler = self.clone();
        let mut changes = self.store.subscribe_changes();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            info!(period_secs = scheduler.period.as_secs(), "Scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.opportunistic_pass().await;
                    }

                    change = changes.recv() => match change {
                        Ok(StoreChange::Policies) => {
                            debug!("Policy collection changed, refreshing rules");
                            scheduler.opportunistic_pass().await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            debug!(missed, "Change notifications lagged, refreshing rules");
                            scheduler.opportunistic_pass().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        *self.loop_task.lock().unwrap() = Some(handle);
    }

    /// Stop the periodic loop. In-flight passes complete on their own.
    pub fn stop(&self) {
        if let Some(handle) = self.loop_task.lock().unwrap().take() {
            handle.abort();
            debug!("Scheduler stopped");
        }
    }

    /// Run one awaited compile+synchronize pass. Returns the number of
    /// installed rules. Queues behind an in-flight pass.
    pub async fn run_pass(&self) -> EngineResult<usize> {
        let _guard = self.pass_lock.lock().await;
        self.pass().await
    }

    /// Timer/notification path: skip if a pass is already running; the
    /// running pass installs a fresh compilation anyway. Failures are
    /// logged and swallowed, leaving the previously installed rules in
    /// place.
    async fn opportunistic_pass(&self) {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            debug!("Pass already in flight, skipping");
            return;
        };

        if let Err(e) = self.pass().await {
            warn!(error = %e, "Rule refresh failed, keeping previously installed rules");
        }
    }

    async fn pass(&self) -> EngineResult<usize> {
        let policies = self.store.list_policies()?;
        let now = warden_util::now();

        let rules = compile(&policies, &now);
        let count = rules.len();
        debug!(
            policies = policies.len(),
            rules = count,
            "Compiled rule set"
        );

        self.sync.synchronize(rules).await?;
        *self.last_pass_at.lock().unwrap() = Some(now);

        debug!(active_rules = count, "Rules synchronized");
        Ok(count)
    }

    /// When the last pass completed, if any
    pub fn last_pass_at(&self) -> Option<DateTime<Local>> {
        *self.last_pass_at.lock().unwrap()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.loop_task.lock().unwrap().take() {
            handle.abort();
        }
    }
}
