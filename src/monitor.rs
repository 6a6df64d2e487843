//! Monitor orchestration
//!
//! This module provides the public API for hosts. [`PostureMonitor`] owns the
//! classifier, the debouncer, the snapshot recorder and the capture timer, and
//! is driven by two host triggers:
//! 1. Render trigger - `on_frame` classifies and debounces the visible verdict
//! 2. Capture trigger - `on_capture_tick` classifies afresh and records a snapshot
//!
//! `tick` combines both for hosts with a single loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::PostureClassifier;
use crate::config::{MonitorConfig, ThumbnailSpec};
use crate::debounce::VerdictDebouncer;
use crate::error::MonitorError;
use crate::keypoints::{overlay_points, parse_pose};
use crate::recorder::{CaptureTimer, SnapshotRecorder};
use crate::store::RecordStore;
use crate::types::{DisplayState, OverlayPoint, Pose, StoredRecord, Verdict};

/// Source of pose estimates, typically a camera plus pose model
pub trait PoseSource {
    /// Zero or one pose for the current frame
    fn next_pose(&mut self) -> Result<Option<Pose>, MonitorError>;
}

/// Renders the current frame as an encoded thumbnail
pub trait Thumbnailer {
    fn render(&mut self, spec: &ThumbnailSpec) -> Result<Vec<u8>, MonitorError>;
}

/// Thumbnailer for hosts that do not store images
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThumbnail;

impl Thumbnailer for NoThumbnail {
    fn render(&mut self, _spec: &ThumbnailSpec) -> Result<Vec<u8>, MonitorError> {
        Ok(Vec::new())
    }
}

/// What the display should show for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Raw verdict for this frame
    pub verdict: Verdict,
    /// Debounced verdict to display
    pub visible: Verdict,
    /// Whether the visible verdict changed on this frame
    pub changed: bool,
    /// Status text for `visible`
    pub label: String,
    /// Keypoints to draw
    pub overlay: Vec<OverlayPoint>,
}

/// Result of one combined render + capture cycle
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub frame: FrameReport,
    pub captured: Option<StoredRecord>,
}

/// Classify a single pose JSON payload with default thresholds (stateless)
pub fn classify_pose_json(pose_json: &str) -> Result<Verdict, MonitorError> {
    let pose = parse_pose(pose_json)?;
    Ok(PostureClassifier::default().classify(Some(&pose)))
}

/// Stateful monitor owning every stage of the pipeline
pub struct PostureMonitor<S: RecordStore> {
    config: MonitorConfig,
    classifier: PostureClassifier,
    debouncer: VerdictDebouncer,
    recorder: SnapshotRecorder<S>,
    timer: CaptureTimer,
}

impl<S: RecordStore> PostureMonitor<S> {
    /// Create a monitor after validating its configuration
    pub fn new(config: MonitorConfig, store: S) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            classifier: PostureClassifier::new(config.thresholds.clone()),
            debouncer: VerdictDebouncer::new(&config.debounce),
            recorder: SnapshotRecorder::new(store, config.capture.clone()),
            timer: CaptureTimer::new(&config.capture)?,
            config,
        })
    }

    /// Create a monitor with the default configuration
    pub fn with_store(store: S) -> Result<Self, MonitorError> {
        Self::new(MonitorConfig::default(), store)
    }

    /// Render trigger: classify the frame's pose and debounce the result
    pub fn on_frame(&mut self, pose: Option<&Pose>, now: DateTime<Utc>) -> FrameReport {
        let verdict = self.classifier.classify(pose);
        let (visible, changed) = self.debouncer.update(verdict, now.timestamp_millis());

        let overlay = pose
            .map(|p| overlay_points(p, self.config.overlay.min_confidence))
            .unwrap_or_default();

        FrameReport {
            verdict,
            visible,
            changed,
            label: visible.label().to_string(),
            overlay,
        }
    }

    /// Capture trigger: record a snapshot of the given pose.
    ///
    /// Frames without a person are not recorded.
    pub fn on_capture_tick(
        &mut self,
        pose: Option<&Pose>,
        thumbnailer: &mut dyn Thumbnailer,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredRecord>, MonitorError> {
        let Some(pose) = pose else {
            log::debug!("capture skipped: no person detected");
            return Ok(None);
        };

        let verdict = self.classifier.classify(Some(pose));
        let thumbnail = thumbnailer.render(&self.config.capture.thumbnail)?;
        let record = self.recorder.capture(verdict, pose, thumbnail, now)?;
        Ok(Some(record))
    }

    /// One cycle: pull a pose, update the display, and capture if due.
    ///
    /// Capture failures are logged and do not affect the frame report.
    pub fn tick(
        &mut self,
        source: &mut dyn PoseSource,
        thumbnailer: &mut dyn Thumbnailer,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, MonitorError> {
        let pose = source.next_pose()?;
        let frame = self.on_frame(pose.as_ref(), now);

        let captured = if self.timer.poll(now) {
            match self.on_capture_tick(pose.as_ref(), thumbnailer, now) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("posture capture failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(TickOutcome { frame, captured })
    }

    /// Start periodic captures from `now`
    pub fn start_capture(&mut self, now: DateTime<Utc>) {
        self.timer.start(now);
    }

    /// Cancel periodic captures; a capture already in progress completes
    pub fn stop_capture(&mut self) {
        self.timer.cancel();
    }

    pub fn is_capturing(&self) -> bool {
        self.timer.is_active()
    }

    pub fn display_state(&self) -> &DisplayState {
        self.debouncer.state()
    }

    /// Most recent records, newest first
    pub fn history(&self, limit: usize) -> Result<Vec<StoredRecord>, MonitorError> {
        self.recorder.history(limit)
    }

    /// Drop records past the retention window
    pub fn prune(&mut self, now: DateTime<Utc>) -> Result<usize, MonitorError> {
        self.recorder.prune(now)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn recorder(&self) -> &SnapshotRecorder<S> {
        &self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use crate::types::{Keypoint, Landmark};
    use chrono::{Duration, TimeZone};
    use std::collections::VecDeque;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    fn pose_with_shoulders(left_y: f64, right_y: f64) -> Pose {
        let mut pose = Pose::new(vec![None; Landmark::COUNT]);
        pose.set(Landmark::LeftShoulder, Keypoint::new(100.0, left_y, 0.9));
        pose.set(Landmark::RightShoulder, Keypoint::new(200.0, right_y, 0.9));
        pose
    }

    struct ScriptedSource(VecDeque<Option<Pose>>);

    impl PoseSource for ScriptedSource {
        fn next_pose(&mut self) -> Result<Option<Pose>, MonitorError> {
            Ok(self.0.pop_front().flatten())
        }
    }

    struct FixedThumbnail;

    impl Thumbnailer for FixedThumbnail {
        fn render(&mut self, _spec: &ThumbnailSpec) -> Result<Vec<u8>, MonitorError> {
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        }
    }

    struct BrokenThumbnail;

    impl Thumbnailer for BrokenThumbnail {
        fn render(&mut self, _spec: &ThumbnailSpec) -> Result<Vec<u8>, MonitorError> {
            Err(MonitorError::ThumbnailError("canvas unavailable".to_string()))
        }
    }

    #[test]
    fn test_classify_pose_json() {
        let json = r#"{"keypoints": [
            null, null, null, null, null, null, null, null, null, null, null,
            {"x": 100, "y": 200, "score": 0.9},
            {"x": 200, "y": 200, "score": 0.9}
        ]}"#;
        assert_eq!(classify_pose_json(json).unwrap(), Verdict::Good);
        assert!(classify_pose_json("{").is_err());
    }

    #[test]
    fn test_on_frame_debounces() {
        let mut monitor = PostureMonitor::with_store(MemoryRecordStore::new()).unwrap();
        let t0 = base_time();
        let good = pose_with_shoulders(200.0, 200.0);
        let poor = pose_with_shoulders(180.0, 220.0);

        let report = monitor.on_frame(Some(&good), t0);
        assert_eq!(report.visible, Verdict::Good);
        assert!(report.changed);
        assert_eq!(report.label, Verdict::Good.label());
        assert_eq!(report.overlay.len(), 2);

        let report = monitor.on_frame(Some(&poor), t0 + Duration::seconds(1));
        assert_eq!(report.verdict, Verdict::Poor);
        assert_eq!(report.visible, Verdict::Good);
        assert!(!report.changed);

        let report = monitor.on_frame(Some(&poor), t0 + Duration::milliseconds(5001));
        assert_eq!(report.visible, Verdict::Poor);
        assert!(report.changed);
    }

    #[test]
    fn test_on_frame_without_person() {
        let mut monitor = PostureMonitor::with_store(MemoryRecordStore::new()).unwrap();
        let report = monitor.on_frame(None, base_time());
        assert_eq!(report.verdict, Verdict::NoPersonDetected);
        assert!(report.overlay.is_empty());
    }

    #[test]
    fn test_capture_tick_skips_missing_pose() {
        let mut monitor = PostureMonitor::with_store(MemoryRecordStore::new()).unwrap();
        let record = monitor
            .on_capture_tick(None, &mut FixedThumbnail, base_time())
            .unwrap();
        assert!(record.is_none());
        assert!(monitor.history(10).unwrap().is_empty());
    }

    #[test]
    fn test_capture_tick_uses_fresh_classification() {
        let mut monitor = PostureMonitor::with_store(MemoryRecordStore::new()).unwrap();
        let t0 = base_time();
        let poor = pose_with_shoulders(180.0, 220.0);

        // Visible verdict lags behind, the record does not
        monitor.on_frame(Some(&pose_with_shoulders(200.0, 200.0)), t0);
        monitor.on_frame(Some(&poor), t0 + Duration::seconds(1));

        let record = monitor
            .on_capture_tick(Some(&poor), &mut FixedThumbnail, t0 + Duration::seconds(1))
            .unwrap()
            .unwrap();
        assert_eq!(record.verdict, Verdict::Poor);
        assert_eq!(record.thumbnail, vec![0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(monitor.display_state().current_verdict, Verdict::Good);
    }

    #[test]
    fn test_tick_captures_on_schedule() {
        let mut monitor = PostureMonitor::with_store(MemoryRecordStore::new()).unwrap();
        let t0 = base_time();
        let frames: VecDeque<Option<Pose>> = (0..=60)
            .map(|_| Some(pose_with_shoulders(200.0, 200.0)))
            .collect();
        let mut source = ScriptedSource(frames);

        monitor.start_capture(t0);
        let mut captured = 0;
        for second in 0..=60 {
            let outcome = monitor
                .tick(&mut source, &mut FixedThumbnail, t0 + Duration::seconds(second))
                .unwrap();
            if outcome.captured.is_some() {
                captured += 1;
            }
        }

        // Initial capture at +5s, then +30s and +60s
        assert_eq!(captured, 3);
        assert_eq!(monitor.history(10).unwrap().len(), 3);

        monitor.stop_capture();
        assert!(!monitor.is_capturing());
    }

    #[test]
    fn test_capture_failure_does_not_break_frame() {
        let mut monitor = PostureMonitor::with_store(MemoryRecordStore::new()).unwrap();
        let t0 = base_time();
        let mut source = ScriptedSource(VecDeque::from(vec![Some(pose_with_shoulders(
            200.0, 200.0,
        ))]));

        monitor.start_capture(t0 - Duration::seconds(5));
        let outcome = monitor
            .tick(&mut source, &mut BrokenThumbnail, t0)
            .unwrap();
        assert_eq!(outcome.frame.visible, Verdict::Good);
        assert!(outcome.captured.is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = MonitorConfig::default();
        config.capture.interval_secs = 0;
        assert!(PostureMonitor::new(config, MemoryRecordStore::new()).is_err());
    }

    #[test]
    fn test_oversized_capture_settings_are_rejected() {
        let mut config = MonitorConfig::default();
        config.capture.interval_secs = u64::MAX;
        assert!(matches!(
            PostureMonitor::new(config, MemoryRecordStore::new()),
            Err(MonitorError::InvalidConfig(_))
        ));

        let mut config = MonitorConfig::default();
        config.capture.retention_days = 4_000_000_000;
        assert!(matches!(
            PostureMonitor::new(config, MemoryRecordStore::new()),
            Err(MonitorError::InvalidConfig(_))
        ));
    }
}
