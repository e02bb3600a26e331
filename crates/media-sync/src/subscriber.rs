//! Projection-side subscriber.
//!
//! Reads the shared slot on a fixed poll and on external-change
//! notifications, filters stale records against a watermark, and hands fresh
//! ones to the [`Reconciler`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChangeListener, ReadOutcome, SharedChannel};
use crate::config::SyncConfig;
use crate::player::Player;
use crate::reconcile::{ReconcileReport, Reconciler};

/// What one sync pass did.
#[derive(Debug, PartialEq)]
pub enum SyncOutcome {
    /// Nothing published under the key yet.
    Absent,
    /// The channel could not be read.
    Unavailable,
    /// The payload failed to decode or validate.
    Malformed,
    /// Already applied a record at least this new.
    Stale { last_updated: u64 },
    /// Record applied; watermark moved to its `lastUpdated`.
    Applied(ReconcileReport),
}

/// `lastUpdated` of the newest applied record, 0 before the first.
#[derive(Clone, Debug, Default)]
pub struct Watermark(Arc<AtomicU64>);

impl Watermark {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn is_fresh(&self, last_updated: u64) -> bool {
        last_updated > self.get()
    }

    fn advance(&self, last_updated: u64) {
        self.0.store(last_updated, Ordering::Release);
    }
}

pub struct SyncSubscriber {
    channel: SharedChannel,
    key: String,
    reconciler: Reconciler,
    watermark: Watermark,
    degraded: bool,
}

impl SyncSubscriber {
    pub fn new(channel: SharedChannel, config: &SyncConfig) -> Self {
        Self {
            channel,
            key: config.channel_key(),
            reconciler: Reconciler::new(config.thresholds.clone()),
            watermark: Watermark::default(),
            degraded: false,
        }
    }

    /// `lastUpdated` of the newest applied record, 0 if none yet.
    pub fn last_synced(&self) -> u64 {
        self.watermark.get()
    }

    /// Read the slot once and reconcile `player` if the record is fresh.
    pub fn sync_once(&mut self, player: &dyn Player) -> SyncOutcome {
        let record = match self.channel.read(&self.key) {
            ReadOutcome::Absent => {
                self.degraded = false;
                return SyncOutcome::Absent;
            }
            ReadOutcome::Record(record) => {
                self.degraded = false;
                record
            }
            ReadOutcome::Malformed(e) => {
                self.report_degraded(&e, "malformed sync record ignored");
                return SyncOutcome::Malformed;
            }
            ReadOutcome::Unavailable(e) => {
                self.report_degraded(&e, "sync channel read failed");
                return SyncOutcome::Unavailable;
            }
        };

        if !self.watermark.is_fresh(record.last_updated) {
            tracing::trace!(key = %self.key, last_updated = record.last_updated, "stale sync record");
            return SyncOutcome::Stale {
                last_updated: record.last_updated,
            };
        }

        let report = self.reconciler.reconcile(player, &record);
        self.watermark.advance(record.last_updated);
        if !report.is_noop() {
            tracing::debug!(
                key = %self.key,
                last_updated = record.last_updated,
                issued = report.issued.len(),
                failed = report.failed.len(),
                "sync record applied"
            );
        }
        SyncOutcome::Applied(report)
    }

    /// First failure in a run warns; repeats drop to debug until a good read.
    fn report_degraded(&mut self, error: &dyn std::fmt::Display, message: &str) {
        if self.degraded {
            tracing::debug!(key = %self.key, error = %error, "{message}");
        } else {
            tracing::warn!(key = %self.key, error = %error, "{message}");
            self.degraded = true;
        }
    }

    /// Run the subscriber on the current tokio runtime.
    ///
    /// Polls every `poll_interval` and also wakes on external-change
    /// notifications. If the notification source closes the loop keeps
    /// polling. Stops when the handle is shut down or dropped.
    pub fn spawn(mut self, player: Arc<dyn Player>, poll_interval: Duration) -> SubscriberHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let watermark = self.watermark.clone();

        let join = tokio::spawn(async move {
            let mut listener = self.channel.subscribe_to_external_changes(&self.key);
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                key = %self.key,
                poll_ms = poll_interval.as_millis() as u64,
                notifications = listener.is_some(),
                "sync subscriber started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    changed = next_change(&mut listener) => {
                        if changed {
                            self.sync_once(player.as_ref());
                        } else {
                            tracing::info!(key = %self.key, "change notifications closed; polling only");
                            listener = None;
                        }
                    }
                    _ = ticker.tick() => {
                        self.sync_once(player.as_ref());
                    }
                }
            }

            drop(listener);
            tracing::info!(key = %self.key, "sync subscriber stopped");
        });

        SubscriberHandle {
            cancel,
            watermark,
            join: Some(join),
        }
    }
}

async fn next_change(listener: &mut Option<ChangeListener>) -> bool {
    match listener {
        Some(listener) => listener.changed().await,
        None => std::future::pending().await,
    }
}

/// Owner of a running subscriber. Dropping it stops the loop.
pub struct SubscriberHandle {
    cancel: CancellationToken,
    watermark: Watermark,
    join: Option<JoinHandle<()>>,
}

impl SubscriberHandle {
    /// `lastUpdated` of the newest record applied so far, 0 if none yet.
    pub fn last_synced(&self) -> u64 {
        self.watermark.get()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Stop the loop and wait for it to release the timer and listener.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!(error = %e, "sync subscriber task failed");
            }
        }
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
