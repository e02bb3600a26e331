//! Controller-side publisher.
//!
//! Filters the local status stream down to meaningful changes and writes them
//! to the shared channel. Manual seeks go through a separate debounced path.

use std::sync::Arc;

use crate::channel::SharedChannel;
use crate::clock::Clock;
use crate::config::{SyncConfig, Thresholds};
use media_sync_types::{PlayerStatus, SyncRecord};

/// Decide whether `next` differs enough from `prev` to be published.
pub fn should_publish(prev: Option<&PlayerStatus>, next: &PlayerStatus, thresholds: &Thresholds) -> bool {
    let Some(prev) = prev else {
        return true;
    };
    prev.player_state != next.player_state
        || thresholds.rate_exceeded(prev.playback_rate, next.playback_rate)
        || thresholds.volume_exceeded(prev.volume, next.volume)
        || prev.is_muted != next.is_muted
        || thresholds.duration_exceeded(prev.duration, next.duration)
}

pub struct SyncPublisher {
    channel: SharedChannel,
    key: String,
    clock: Arc<dyn Clock>,
    thresholds: Thresholds,
    seek_debounce_ms: u64,
    video_id: String,
    previous: Option<PlayerStatus>,
    last_seek_ms: Option<u64>,
    last_stamp: u64,
}

impl SyncPublisher {
    pub fn new(channel: SharedChannel, clock: Arc<dyn Clock>, config: &SyncConfig) -> Self {
        Self {
            channel,
            key: config.channel_key(),
            clock,
            thresholds: config.thresholds.clone(),
            seek_debounce_ms: config.seek_debounce.as_millis() as u64,
            video_id: config.default_video_id.clone(),
            previous: None,
            last_seek_ms: None,
            last_stamp: 0,
        }
    }

    /// Set the media id carried by subsequent records.
    pub fn set_video_id(&mut self, video_id: impl Into<String>) {
        self.video_id = video_id.into();
    }

    /// Last status offered to [`SyncPublisher::on_status`].
    pub fn previous(&self) -> Option<&PlayerStatus> {
        self.previous.as_ref()
    }

    /// Offer a status update. Returns `true` if a record was written.
    ///
    /// The status becomes the new comparison baseline whether or not it was
    /// published.
    pub fn on_status(&mut self, status: &PlayerStatus, force: bool) -> bool {
        let publish = force || should_publish(self.previous.as_ref(), status, &self.thresholds);
        let written = if publish {
            let stamp = self.stamp(self.clock.now_ms());
            let record = SyncRecord::from_status(self.video_id.as_str(), status, stamp);
            self.channel.publish(&self.key, &record)
        } else {
            tracing::trace!(key = %self.key, "status unchanged; publish skipped");
            false
        };
        self.previous = Some(status.clone());
        written
    }

    /// Publish a manual seek to `seconds`.
    ///
    /// Dropped when it follows the previous seek by less than the debounce
    /// window, or when no status has been seen yet.
    pub fn publish_seek(&mut self, seconds: f64) -> bool {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_seek_ms {
            if now.saturating_sub(last) < self.seek_debounce_ms {
                tracing::debug!(key = %self.key, seconds, "seek publish debounced");
                return false;
            }
        }
        self.last_seek_ms = Some(now);

        let Some(previous) = self.previous.as_ref() else {
            tracing::debug!(key = %self.key, "seek before first status; not published");
            return false;
        };
        let mut snapshot = previous.clone();
        snapshot.current_time = seconds;
        let stamp = self.stamp(now);
        let record = SyncRecord::from_status(self.video_id.as_str(), &snapshot, stamp);
        self.channel.publish(&self.key, &record)
    }

    /// Next `lastUpdated`, strictly above the previous one.
    fn stamp(&mut self, now: u64) -> u64 {
        let stamp = now.max(self.last_stamp.saturating_add(1));
        self.last_stamp = stamp;
        stamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::{RecordingStore, paused_status};
    use media_sync_types::PlayerState;

    fn publisher() -> (SyncPublisher, Arc<RecordingStore>, Arc<ManualClock>) {
        let store = Arc::new(RecordingStore::default());
        let clock = Arc::new(ManualClock::new(10_000));
        let publisher = SyncPublisher::new(
            SharedChannel::new(store.clone()),
            clock.clone(),
            &SyncConfig::default(),
        );
        (publisher, store, clock)
    }

    #[test]
    fn first_status_is_always_published() {
        let (mut publisher, store, _) = publisher();
        assert!(publisher.on_status(&paused_status(), false));
        assert_eq!(store.write_count(), 1);
        let record = &store.written_records()[0];
        assert_eq!(record.video_id, crate::config::DEFAULT_VIDEO_ID);
        assert_eq!(record.last_updated, 10_000);
    }

    #[test]
    fn duration_change_must_exceed_one_second() {
        for (duration, expected) in [(121.0, false), (122.0, true)] {
            let (mut publisher, store, _) = publisher();
            publisher.on_status(&paused_status(), false);

            let next = PlayerStatus {
                duration,
                ..paused_status()
            };
            assert_eq!(publisher.on_status(&next, false), expected, "120 -> {duration}");
            assert_eq!(store.write_count(), 1 + usize::from(expected));
        }
    }

    #[test]
    fn duration_creep_below_threshold_is_never_published() {
        let (mut publisher, store, _) = publisher();
        publisher.on_status(&paused_status(), false);

        for duration in [121.0, 122.0, 123.0] {
            let next = PlayerStatus {
                duration,
                ..paused_status()
            };
            assert!(!publisher.on_status(&next, false));
        }
        assert_eq!(store.write_count(), 1);
        assert_eq!(publisher.previous().map(|s| s.duration), Some(123.0));
    }

    #[test]
    fn position_only_changes_are_not_published() {
        let (mut publisher, store, _) = publisher();
        let mut status = paused_status();
        status.player_state = PlayerState::Playing;
        publisher.on_status(&status, false);

        for t in 1..10 {
            status.current_time = t as f64;
            assert!(!publisher.on_status(&status, false));
        }
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn each_meaningful_axis_triggers_publish() {
        let t = Thresholds::default();
        let base = paused_status();

        let mut state = base.clone();
        state.player_state = PlayerState::Playing;
        assert!(should_publish(Some(&base), &state, &t));

        let mut volume = base.clone();
        volume.volume = 51;
        assert!(!should_publish(Some(&base), &volume, &t));
        volume.volume = 52;
        assert!(should_publish(Some(&base), &volume, &t));

        let mut rate = base.clone();
        rate.playback_rate = 1.01;
        assert!(!should_publish(Some(&base), &rate, &t));
        rate.playback_rate = 1.25;
        assert!(should_publish(Some(&base), &rate, &t));

        let mut muted = base.clone();
        muted.is_muted = true;
        assert!(should_publish(Some(&base), &muted, &t));

        assert!(!should_publish(Some(&base), &base, &t));
        assert!(should_publish(None, &base, &t));
    }

    #[test]
    fn force_publishes_identical_status() {
        let (mut publisher, store, _) = publisher();
        publisher.on_status(&paused_status(), false);
        assert!(publisher.on_status(&paused_status(), true));
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn baseline_moves_even_when_publish_is_skipped() {
        let (mut publisher, _, _) = publisher();
        publisher.on_status(&paused_status(), false);

        let mut drift = paused_status();
        drift.volume = 51;
        publisher.on_status(&drift, false);
        assert_eq!(publisher.previous().map(|s| s.volume), Some(51));

        // 50 -> 51 -> 52 never crosses the threshold step by step.
        let mut drift = paused_status();
        drift.volume = 52;
        assert!(!publisher.on_status(&drift, false));
    }

    #[test]
    fn seeks_within_debounce_window_collapse() {
        let (mut publisher, store, clock) = publisher();
        publisher.on_status(&paused_status(), false);

        assert!(publisher.publish_seek(30.0));
        clock.advance(50);
        assert!(!publisher.publish_seek(31.0));
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn seeks_outside_debounce_window_both_publish() {
        let (mut publisher, store, clock) = publisher();
        publisher.on_status(&paused_status(), false);

        assert!(publisher.publish_seek(30.0));
        clock.advance(150);
        assert!(publisher.publish_seek(45.0));

        let records = store.written_records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].current_time, 30.0);
        assert_eq!(records[2].current_time, 45.0);
        assert_eq!(records[2].player_state, PlayerState::Paused);
    }

    #[test]
    fn seek_before_any_status_is_dropped() {
        let (mut publisher, store, _) = publisher();
        assert!(!publisher.publish_seek(30.0));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn stamps_are_strictly_increasing_within_one_millisecond() {
        let (mut publisher, store, _) = publisher();
        publisher.on_status(&paused_status(), false);
        publisher.publish_seek(12.0);

        let records = store.written_records();
        assert_eq!(records[0].last_updated, 10_000);
        assert_eq!(records[1].last_updated, 10_001);
    }

    #[test]
    fn video_id_is_carried_into_records() {
        let (mut publisher, store, _) = publisher();
        publisher.set_video_id("dQw4w9WgXcQ");
        publisher.on_status(&paused_status(), false);
        assert_eq!(store.written_records()[0].video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn failed_write_is_reported_but_baseline_still_updates() {
        let (mut publisher, store, _) = publisher();
        store.set_failing(true);
        assert!(!publisher.on_status(&paused_status(), false));
        assert!(publisher.previous().is_some());

        store.set_failing(false);
        assert!(!publisher.on_status(&paused_status(), false));
        assert_eq!(store.write_count(), 0);
    }
}
