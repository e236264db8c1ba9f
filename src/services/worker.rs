use crate::services::job_store::JobStatusStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodically evicts finished job records so the status store stays bounded.
pub struct JobReaper {
    store: Arc<JobStatusStore>,
    retention: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl JobReaper {
    pub fn new(
        store: Arc<JobStatusStore>,
        retention: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            retention,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Job reaper started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Job reaper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep();
                }
            }
        }
    }

    pub fn sweep(&self) -> usize {
        let evicted = self.store.evict_finished(self.retention);
        if evicted > 0 {
            tracing::info!(
                "🧹 Evicted {} finished job record(s), {} still tracked",
                evicted,
                self.store.len()
            );
        }
        evicted
    }
}
