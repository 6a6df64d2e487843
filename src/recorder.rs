//! Snapshot recording
//!
//! Builds stored records from a verdict, a pose and a host-rendered thumbnail,
//! writes them to a [`RecordStore`], and periodically prunes records older
//! than the retention window. [`CaptureTimer`] decides when a capture is due.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::CaptureConfig;
use crate::error::MonitorError;
use crate::keypoints::reduce_for_storage;
use crate::store::RecordStore;
use crate::types::{Pose, StoredRecord, Verdict};

/// Writes snapshots to a store and keeps it within the retention window
pub struct SnapshotRecorder<S: RecordStore> {
    store: S,
    config: CaptureConfig,
    captures_since_prune: u32,
}

impl<S: RecordStore> SnapshotRecorder<S> {
    pub fn new(store: S, config: CaptureConfig) -> Self {
        Self {
            store,
            config,
            captures_since_prune: 0,
        }
    }

    /// Build and store a record, pruning every `prune_every` captures.
    ///
    /// A failed prune is logged and does not fail the capture.
    pub fn capture(
        &mut self,
        verdict: Verdict,
        pose: &Pose,
        thumbnail: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<StoredRecord, MonitorError> {
        let record = StoredRecord {
            id: Uuid::new_v4(),
            timestamp: now,
            verdict,
            thumbnail,
            keypoints: reduce_for_storage(pose, self.config.stored_landmarks),
        };

        self.store.insert(record.clone())?;
        log::info!("posture captured and stored: {}", verdict);

        self.captures_since_prune += 1;
        if self.captures_since_prune >= self.config.prune_every {
            self.captures_since_prune = 0;
            if let Err(e) = self.prune(now) {
                log::warn!("failed to prune old posture records: {}", e);
            }
        }

        Ok(record)
    }

    /// Remove records older than the retention window
    pub fn prune(&mut self, now: DateTime<Utc>) -> Result<usize, MonitorError> {
        let cutoff = now
            .checked_sub_signed(self.config.retention()?)
            .ok_or_else(|| {
                MonitorError::InvalidConfig(format!(
                    "retention window of {} days reaches before the supported date range",
                    self.config.retention_days
                ))
            })?;
        let removed = self.store.remove_older_than(cutoff)?;
        if removed > 0 {
            log::info!("pruned {} posture records older than {}", removed, cutoff);
        }
        Ok(removed)
    }

    /// Most recent records, newest first
    pub fn history(&self, limit: usize) -> Result<Vec<StoredRecord>, MonitorError> {
        self.store.recent(limit)
    }

    /// History with the configured default limit
    pub fn recent_history(&self) -> Result<Vec<StoredRecord>, MonitorError> {
        self.history(self.config.history_limit)
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Host-driven capture schedule.
///
/// After `start`, a first capture is due after the initial delay and regular
/// captures are due every interval measured from the start time. `poll`
/// reports at most one due capture per call, however many were missed.
#[derive(Debug, Clone)]
pub struct CaptureTimer {
    interval: Duration,
    initial_delay: Duration,
    initial_due: Option<DateTime<Utc>>,
    next_due: Option<DateTime<Utc>>,
}

impl CaptureTimer {
    pub fn new(config: &CaptureConfig) -> Result<Self, MonitorError> {
        Ok(Self {
            interval: config.interval()?,
            initial_delay: config.initial_delay()?,
            initial_due: None,
            next_due: None,
        })
    }

    /// Start (or restart) the schedule at `now`
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.initial_due = Some(now + self.initial_delay);
        self.next_due = Some(now + self.interval);
        log::info!(
            "automatic capture started (every {}s)",
            self.interval.num_seconds()
        );
    }

    /// Stop all future captures
    pub fn cancel(&mut self) {
        if self.is_active() {
            log::info!("automatic capture stopped");
        }
        self.initial_due = None;
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Whether a capture is due at `now`; advances the schedule if so
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        let Some(mut next_due) = self.next_due else {
            return false;
        };

        let mut due = false;

        if let Some(initial) = self.initial_due {
            if now >= initial {
                self.initial_due = None;
                due = true;
            }
        }

        if now >= next_due {
            // A non-positive interval is rejected by config validation
            if self.interval > Duration::zero() {
                while next_due <= now {
                    next_due += self.interval;
                }
            } else {
                next_due = now + Duration::seconds(1);
            }
            self.next_due = Some(next_due);
            due = true;
        }

        due
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        match (self.initial_due, self.next_due) {
            (Some(initial), Some(next)) => Some(initial.min(next)),
            (_, next) => next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use crate::types::{Keypoint, Landmark};
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    fn sample_pose() -> Pose {
        let keypoints = (0..Landmark::COUNT)
            .map(|i| Some(Keypoint::new(i as f64, i as f64, 0.9)))
            .collect();
        Pose::new(keypoints)
    }

    #[test]
    fn test_capture_stores_reduced_record() {
        let mut recorder = SnapshotRecorder::new(MemoryRecordStore::new(), CaptureConfig::default());
        let record = recorder
            .capture(Verdict::Regular, &sample_pose(), vec![1, 2, 3], base_time())
            .unwrap();

        assert_eq!(record.keypoints.len(), 17);
        assert_eq!(record.verdict, Verdict::Regular);
        assert_eq!(record.thumbnail, vec![1, 2, 3]);
        assert_eq!(recorder.history(10).unwrap(), vec![record]);
    }

    #[test]
    fn test_periodic_prune_drops_expired_records() {
        let config = CaptureConfig {
            prune_every: 3,
            retention_days: 30,
            ..Default::default()
        };
        let mut recorder = SnapshotRecorder::new(MemoryRecordStore::new(), config);
        let pose = sample_pose();
        let start = base_time();

        // Two old records, 40 days before the third capture
        recorder.capture(Verdict::Good, &pose, vec![], start).unwrap();
        recorder.capture(Verdict::Good, &pose, vec![], start).unwrap();
        assert_eq!(recorder.store().len().unwrap(), 2);

        recorder
            .capture(Verdict::Poor, &pose, vec![], start + Duration::days(40))
            .unwrap();

        let history = recorder.history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].verdict, Verdict::Poor);
    }

    #[test]
    fn test_prune_keeps_records_inside_window() {
        let mut recorder = SnapshotRecorder::new(MemoryRecordStore::new(), CaptureConfig::default());
        let pose = sample_pose();
        let now = base_time();

        recorder
            .capture(Verdict::Good, &pose, vec![], now - Duration::days(29))
            .unwrap();
        recorder
            .capture(Verdict::Good, &pose, vec![], now - Duration::days(31))
            .unwrap();

        assert_eq!(recorder.prune(now).unwrap(), 1);
        assert_eq!(recorder.store().len().unwrap(), 1);
    }

    #[test]
    fn test_prune_reports_unrepresentable_retention() {
        let config = CaptureConfig {
            retention_days: 4_000_000_000,
            ..Default::default()
        };
        let mut recorder = SnapshotRecorder::new(MemoryRecordStore::new(), config);
        recorder
            .capture(Verdict::Good, &sample_pose(), vec![], base_time())
            .unwrap();

        assert!(matches!(
            recorder.prune(base_time()),
            Err(MonitorError::InvalidConfig(_))
        ));
        assert_eq!(recorder.store().len().unwrap(), 1);
    }

    #[test]
    fn test_recent_history_uses_configured_limit() {
        let config = CaptureConfig {
            history_limit: 2,
            ..Default::default()
        };
        let mut recorder = SnapshotRecorder::new(MemoryRecordStore::new(), config);
        for minute in 0..5 {
            recorder
                .capture(
                    Verdict::Good,
                    &sample_pose(),
                    vec![],
                    base_time() + Duration::minutes(minute),
                )
                .unwrap();
        }
        assert_eq!(recorder.recent_history().unwrap().len(), 2);
    }

    #[test]
    fn test_timer_schedule() {
        let mut timer = CaptureTimer::new(&CaptureConfig::default()).unwrap();
        let start = base_time();
        assert!(!timer.poll(start));

        timer.start(start);
        assert!(timer.is_active());
        assert!(!timer.poll(start + Duration::seconds(4)));
        assert!(timer.poll(start + Duration::seconds(5)));
        assert!(!timer.poll(start + Duration::seconds(6)));
        assert!(!timer.poll(start + Duration::seconds(29)));
        assert!(timer.poll(start + Duration::seconds(30)));
        assert!(!timer.poll(start + Duration::seconds(45)));
        assert!(timer.poll(start + Duration::seconds(60)));
        assert_eq!(timer.next_due(), Some(start + Duration::seconds(90)));
    }

    #[test]
    fn test_timer_collapses_missed_ticks() {
        let mut timer = CaptureTimer::new(&CaptureConfig::default()).unwrap();
        let start = base_time();
        timer.start(start);

        assert!(timer.poll(start + Duration::seconds(125)));
        assert!(!timer.poll(start + Duration::seconds(126)));
        assert_eq!(timer.next_due(), Some(start + Duration::seconds(150)));
    }

    #[test]
    fn test_timer_rejects_out_of_range_interval() {
        let overflowing = CaptureConfig {
            interval_secs: 100_000_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(
            CaptureTimer::new(&overflowing),
            Err(MonitorError::InvalidConfig(_))
        ));

        // Would wrap negative under a plain cast and fire on every poll
        let wrapping = CaptureConfig {
            interval_secs: u64::MAX,
            ..Default::default()
        };
        assert!(CaptureTimer::new(&wrapping).is_err());
    }

    #[test]
    fn test_timer_cancel() {
        let mut timer = CaptureTimer::new(&CaptureConfig::default()).unwrap();
        let start = base_time();
        timer.start(start);
        timer.cancel();

        assert!(!timer.is_active());
        assert!(!timer.poll(start + Duration::seconds(5)));
        assert!(!timer.poll(start + Duration::seconds(300)));
        assert_eq!(timer.next_due(), None);
    }
}
