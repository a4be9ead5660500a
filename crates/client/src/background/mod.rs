//! Jobs that run outside any request: the expiry sweep and event sync.
//!
//! Each job is its own task. They share nothing but the store, and both stop
//! on the same cancellation token. Sync also wakes on an explicit trigger so a
//! host that regains connectivity need not wait for the next tick.

mod expiry;
mod sync;

use std::sync::Arc;
use std::time::Duration;

use edgecache_core::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use expiry::ExpirySweep;
pub use sync::{EventQueue, EventSink, EventSync, HttpEventSink};

/// Scheduling for [`BackgroundTasks`].
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    pub sweep_interval: Duration,
    pub sync_interval: Duration,
    /// How long `shutdown` waits for each job to wind down.
    pub join_timeout: Duration,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(86_400),
            sync_interval: Duration::from_secs(300),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&edgecache_core::AppConfig> for BackgroundConfig {
    fn from(config: &edgecache_core::AppConfig) -> Self {
        Self { sweep_interval: config.sweep_interval(), sync_interval: config.sync_interval(), ..Default::default() }
    }
}

/// Cloneable handle that wakes the sync job by tag.
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    tag: Option<String>,
    wake: Arc<Notify>,
}

impl SyncTrigger {
    /// Wake the job registered under `tag`. Returns false for unknown tags.
    pub fn fire(&self, tag: &str) -> bool {
        match &self.tag {
            Some(sync_tag) if sync_tag == tag => {
                tracing::debug!(tag, "sync triggered");
                self.wake.notify_one();
                true
            }
            _ => {
                tracing::warn!(tag, "ignoring trigger for unknown tag");
                false
            }
        }
    }
}

/// Handle to the running background jobs.
pub struct BackgroundTasks {
    cancel: CancellationToken,
    trigger: SyncTrigger,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    join_timeout: Duration,
}

impl BackgroundTasks {
    /// Spawn the sweep and, when a sink is configured, the sync job.
    pub fn start(sweep: ExpirySweep, sync: Option<EventSync>, config: BackgroundConfig) -> Self {
        let cancel = CancellationToken::new();
        let sync_now = Arc::new(Notify::new());
        let mut handles = vec![("expiry_sweep", tokio::spawn(sweep_loop(sweep, config.sweep_interval, cancel.clone())))];

        let trigger = SyncTrigger { tag: sync.as_ref().map(|s| s.tag().to_string()), wake: sync_now.clone() };
        if let Some(sync) = sync {
            let handle = tokio::spawn(sync_loop(sync, config.sync_interval, sync_now, cancel.clone()));
            handles.push(("event_sync", handle));
        } else {
            tracing::info!("no event sink configured, event sync disabled");
        }

        tracing::info!(jobs = handles.len(), "background tasks started");
        Self { cancel, trigger, handles, join_timeout: config.join_timeout }
    }

    pub fn trigger(&self, tag: &str) -> bool {
        self.trigger.fire(tag)
    }

    pub fn sync_trigger(&self) -> SyncTrigger {
        self.trigger.clone()
    }

    /// Cancel every job and wait for each to finish, bounded by the join
    /// timeout. Returns true if all of them stopped cleanly.
    pub async fn shutdown(self) -> bool {
        self.cancel.cancel();
        let mut clean = true;
        for (name, handle) in self.handles {
            match tokio::time::timeout(self.join_timeout, handle).await {
                Ok(Ok(())) => tracing::debug!(job = name, "background job stopped"),
                Ok(Err(e)) => {
                    tracing::warn!(job = name, error = %e, "background job panicked");
                    clean = false;
                }
                Err(_) => {
                    tracing::warn!(job = name, "background job did not stop within timeout");
                    clean = false;
                }
            }
        }
        tracing::info!(clean, "background tasks stopped");
        clean
    }
}

impl std::fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTasks")
            .field("sync_tag", &self.trigger.tag)
            .field("jobs", &self.handles.len())
            .finish_non_exhaustive()
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn sweep_loop(sweep: ExpirySweep, period: Duration, cancel: CancellationToken) {
    let mut ticks = ticker(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => {
                if let Err(e) = sweep.run().await {
                    tracing::error!(error = %e, "expiry sweep failed");
                }
            }
        }
    }
}

async fn sync_loop(sync: EventSync, period: Duration, wake: Arc<Notify>, cancel: CancellationToken) {
    let mut ticks = ticker(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => {}
            _ = wake.notified() => {}
        }
        sync_round(&sync).await;
    }
}

async fn sync_round(sync: &EventSync) {
    match sync.run().await {
        Ok(_) => {}
        // logged by `run`; the buffer is kept for the next round
        Err(Error::SyncFailed(_)) => {}
        Err(e) => tracing::error!(tag = sync.tag(), error = %e, "event sync failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeOrigin, RecordingSink, proxy};
    use serde_json::json;

    const LONG: Duration = Duration::from_secs(3600);

    fn config() -> BackgroundConfig {
        BackgroundConfig { sweep_interval: LONG, sync_interval: LONG, join_timeout: Duration::from_secs(1) }
    }

    #[tokio::test]
    async fn test_trigger_runs_sync() {
        let (state, _origin) = proxy(FakeOrigin::new()).await;
        let queue = EventQueue::new(state.db().clone());
        queue.enqueue(&json!({"n": 1})).await.unwrap();

        let sink = Arc::new(RecordingSink::default());
        let sync = EventSync::new(state.db().clone(), sink.clone(), "sync-events");
        let sweep = ExpirySweep::new(&state, chrono::Duration::days(7));
        let tasks = BackgroundTasks::start(sweep, Some(sync), config());

        assert!(tasks.trigger("sync-events"));
        tokio::time::timeout(Duration::from_secs(5), async {
            while !queue.pending().await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(sink.batches().len(), 1);
        assert!(tasks.shutdown().await);
    }

    #[tokio::test]
    async fn test_sync_recovers_after_failed_round() {
        let (state, _origin) = proxy(FakeOrigin::new()).await;
        let queue = EventQueue::new(state.db().clone());
        queue.enqueue(&json!({"n": 1})).await.unwrap();

        let sink = Arc::new(RecordingSink::default());
        sink.fail(true);
        let sync = EventSync::new(state.db().clone(), sink.clone(), "sync-events");
        let tasks = BackgroundTasks::start(ExpirySweep::new(&state, chrono::Duration::days(7)), Some(sync), config());

        assert!(tasks.trigger("sync-events"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.pending().await.unwrap().len(), 1);

        sink.fail(false);
        assert!(tasks.trigger("sync-events"));
        tokio::time::timeout(Duration::from_secs(5), async {
            while !queue.pending().await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(sink.batches().len(), 1);
        assert!(tasks.shutdown().await);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_ignored() {
        let (state, _origin) = proxy(FakeOrigin::new()).await;
        let sync = EventSync::new(state.db().clone(), Arc::new(RecordingSink::default()), "sync-events");
        let tasks = BackgroundTasks::start(ExpirySweep::new(&state, chrono::Duration::days(7)), Some(sync), config());

        assert!(!tasks.trigger("something-else"));
        assert!(tasks.sync_trigger().fire("sync-events"));
        assert!(tasks.shutdown().await);
    }

    #[tokio::test]
    async fn test_sync_disabled_without_sink() {
        let (state, _origin) = proxy(FakeOrigin::new()).await;
        let tasks = BackgroundTasks::start(ExpirySweep::new(&state, chrono::Duration::days(7)), None, config());

        assert!(!tasks.trigger("sync-events"));
        assert!(tasks.shutdown().await);
    }

    #[tokio::test]
    async fn test_sync_runs_on_interval() {
        let (state, _origin) = proxy(FakeOrigin::new()).await;
        let queue = EventQueue::new(state.db().clone());
        queue.enqueue(&json!({"n": 1})).await.unwrap();

        let sink = Arc::new(RecordingSink::default());
        let sync = EventSync::new(state.db().clone(), sink.clone(), "sync-events");
        let config = BackgroundConfig { sync_interval: Duration::from_millis(20), ..config() };
        let tasks = BackgroundTasks::start(ExpirySweep::new(&state, chrono::Duration::days(7)), Some(sync), config);

        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.batches().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(tasks.shutdown().await);
        assert!(queue.pending().await.unwrap().is_empty());
    }
}
