//! Monitor configuration
//!
//! Every section deserializes with defaults, so a config file only needs the
//! values it overrides. Defaults reproduce the reference heuristic exactly.

use crate::error::MonitorError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Longest accepted capture interval or initial delay (one day)
pub const MAX_CAPTURE_SECS: u64 = 86_400;

/// Longest accepted retention window
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Thresholds of the posture heuristic. Distances are in input pixel units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Minimum confidence for either shoulder
    pub shoulder_min_confidence: f64,
    /// Shoulder spans at or below this are treated as degenerate
    pub min_shoulder_width: f64,
    pub severe_tilt_ratio: f64,
    pub severe_level_diff: f64,
    pub moderate_tilt_ratio: f64,
    pub moderate_level_diff: f64,
    /// The left ear must exceed this confidence to contribute
    pub ear_min_confidence: f64,
    pub ear_forward_strong: f64,
    pub ear_forward_mild: f64,
    pub ear_down_strong: f64,
    pub ear_down_mild: f64,
    pub severe_head_score: u8,
    pub moderate_head_score: u8,
    /// Both hips must exceed this confidence for the alignment bonus
    pub hip_min_confidence: f64,
    pub max_spine_offset: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            shoulder_min_confidence: 0.5,
            min_shoulder_width: 1e-6,
            severe_tilt_ratio: 0.15,
            severe_level_diff: 25.0,
            moderate_tilt_ratio: 0.08,
            moderate_level_diff: 12.0,
            ear_min_confidence: 0.5,
            ear_forward_strong: 12.0,
            ear_forward_mild: 6.0,
            ear_down_strong: 20.0,
            ear_down_mild: 10.0,
            severe_head_score: 3,
            moderate_head_score: 1,
            hip_min_confidence: 0.7,
            max_spine_offset: 15.0,
        }
    }
}

impl ClassifierThresholds {
    pub fn validate(&self) -> Result<(), MonitorError> {
        for (name, value) in [
            ("shoulder_min_confidence", self.shoulder_min_confidence),
            ("ear_min_confidence", self.ear_min_confidence),
            ("hip_min_confidence", self.hip_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MonitorError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if !(self.min_shoulder_width >= 0.0) {
            return Err(MonitorError::InvalidConfig(
                "min_shoulder_width must be non-negative".to_string(),
            ));
        }

        if self.moderate_tilt_ratio > self.severe_tilt_ratio
            || self.moderate_level_diff > self.severe_level_diff
        {
            return Err(MonitorError::InvalidConfig(
                "moderate tilt thresholds must not exceed severe ones".to_string(),
            ));
        }

        if self.ear_forward_mild > self.ear_forward_strong || self.ear_down_mild > self.ear_down_strong {
            return Err(MonitorError::InvalidConfig(
                "mild ear thresholds must not exceed strong ones".to_string(),
            ));
        }

        if self.moderate_head_score == 0 || self.moderate_head_score > self.severe_head_score {
            return Err(MonitorError::InvalidConfig(
                "head scores must satisfy 0 < moderate <= severe".to_string(),
            ));
        }

        Ok(())
    }
}

/// Debounce settings for the visible verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// A new verdict is shown only if strictly more than this has elapsed
    pub min_change_interval_ms: i64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            min_change_interval_ms: 5_000,
        }
    }
}

/// Size and quality the host should render snapshot thumbnails at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailSpec {
    pub width: u32,
    pub height: u32,
    /// JPEG quality (0-1)
    pub jpeg_quality: f64,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            jpeg_quality: 0.7,
        }
    }
}

/// Snapshot capture and retention settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub interval_secs: u64,
    /// Delay before the first capture after starting
    pub initial_delay_secs: u64,
    pub retention_days: u32,
    /// Prune once every this many captures
    pub prune_every: u32,
    /// Number of leading landmarks kept in stored records
    pub stored_landmarks: usize,
    /// Default number of records returned by history queries
    pub history_limit: usize,
    pub thumbnail: ThumbnailSpec,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            initial_delay_secs: 5,
            retention_days: 30,
            prune_every: 10,
            stored_landmarks: 17,
            history_limit: 10,
            thumbnail: ThumbnailSpec::default(),
        }
    }
}

impl CaptureConfig {
    pub fn interval(&self) -> Result<Duration, MonitorError> {
        seconds_to_duration("interval_secs", self.interval_secs)
    }

    pub fn initial_delay(&self) -> Result<Duration, MonitorError> {
        seconds_to_duration("initial_delay_secs", self.initial_delay_secs)
    }

    pub fn retention(&self) -> Result<Duration, MonitorError> {
        Duration::try_days(i64::from(self.retention_days)).ok_or_else(|| {
            MonitorError::InvalidConfig(format!(
                "retention_days {} is out of range",
                self.retention_days
            ))
        })
    }
}

fn seconds_to_duration(field: &str, secs: u64) -> Result<Duration, MonitorError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| MonitorError::InvalidConfig(format!("{} {} is out of range", field, secs)))
}

/// Overlay drawing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Keypoints above this confidence are drawn
    pub min_confidence: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub thresholds: ClassifierThresholds,
    pub debounce: DebounceConfig,
    pub capture: CaptureConfig,
    pub overlay: OverlayConfig,
}

impl MonitorConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.thresholds.validate()?;

        if self.debounce.min_change_interval_ms < 0 {
            return Err(MonitorError::InvalidConfig(
                "min_change_interval_ms must be non-negative".to_string(),
            ));
        }

        let capture = &self.capture;
        if capture.interval_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "capture interval must be at least one second".to_string(),
            ));
        }
        if capture.interval_secs > MAX_CAPTURE_SECS {
            return Err(MonitorError::InvalidConfig(format!(
                "capture interval must not exceed {} seconds",
                MAX_CAPTURE_SECS
            )));
        }
        if capture.initial_delay_secs > MAX_CAPTURE_SECS {
            return Err(MonitorError::InvalidConfig(format!(
                "initial capture delay must not exceed {} seconds",
                MAX_CAPTURE_SECS
            )));
        }
        if capture.retention_days == 0 || capture.retention_days > MAX_RETENTION_DAYS {
            return Err(MonitorError::InvalidConfig(format!(
                "retention_days must be within [1, {}]",
                MAX_RETENTION_DAYS
            )));
        }
        if capture.prune_every == 0 {
            return Err(MonitorError::InvalidConfig(
                "prune_every must be at least 1".to_string(),
            ));
        }
        if capture.stored_landmarks == 0 {
            return Err(MonitorError::InvalidConfig(
                "stored_landmarks must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&capture.thumbnail.jpeg_quality) {
            return Err(MonitorError::InvalidConfig(
                "thumbnail jpeg_quality must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.overlay.min_confidence) {
            return Err(MonitorError::InvalidConfig(
                "overlay min_confidence must be within [0, 1]".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = MonitorConfig::from_json(
            r#"{"thresholds": {"severe_level_diff": 30.0}, "capture": {"interval_secs": 120}}"#,
        )
        .unwrap();

        assert_eq!(config.thresholds.severe_level_diff, 30.0);
        assert_eq!(config.thresholds.moderate_level_diff, 12.0);
        assert_eq!(config.capture.interval_secs, 120);
        assert_eq!(config.capture.retention_days, 30);
        assert_eq!(config.debounce, DebounceConfig::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = MonitorConfig::default();
        let json = config.to_json().unwrap();
        let loaded = MonitorConfig::from_json(&json).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = MonitorConfig::from_json(r#"{"capture": {"interval_secs": 0}}"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_capture_interval_beyond_one_day() {
        let result =
            MonitorConfig::from_json(r#"{"capture": {"interval_secs": 100000000000000000}}"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));

        let result = MonitorConfig::from_json(r#"{"capture": {"interval_secs": 18446744073709551615}}"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));

        assert!(MonitorConfig::from_json(r#"{"capture": {"interval_secs": 86400}}"#).is_ok());
    }

    #[test]
    fn test_rejects_long_initial_delay() {
        let result = MonitorConfig::from_json(r#"{"capture": {"initial_delay_secs": 86401}}"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_retention_outside_range() {
        let result = MonitorConfig::from_json(r#"{"capture": {"retention_days": 4000000000}}"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));

        let result = MonitorConfig::from_json(r#"{"capture": {"retention_days": 0}}"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));

        assert!(MonitorConfig::from_json(r#"{"capture": {"retention_days": 36500}}"#).is_ok());
    }

    #[test]
    fn test_unchecked_capture_durations_are_errors() {
        let capture = CaptureConfig {
            interval_secs: u64::MAX,
            initial_delay_secs: 100_000_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(capture.interval(), Err(MonitorError::InvalidConfig(_))));
        assert!(matches!(capture.initial_delay(), Err(MonitorError::InvalidConfig(_))));

        let defaults = CaptureConfig::default();
        assert_eq!(defaults.interval().unwrap(), Duration::seconds(30));
        assert_eq!(defaults.initial_delay().unwrap(), Duration::seconds(5));
        assert_eq!(defaults.retention().unwrap(), Duration::days(30));
    }

    #[test]
    fn test_rejects_inverted_tilt_thresholds() {
        let result = MonitorConfig::from_json(r#"{"thresholds": {"moderate_level_diff": 40.0}}"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        let result = MonitorConfig::from_json(r#"{"thresholds": {"hip_min_confidence": 1.5}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"debounce": {"min_change_interval_ms": 2000}}"#).unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.debounce.min_change_interval_ms, 2000);
    }
}
