//! Core types for the posture monitor
//!
//! This module defines the data that flows through each stage: keypoints and
//! poses from the pose estimator, the classification verdict, the debounced
//! display state, and the records handed to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Milliseconds on the host's monotonic-enough clock (epoch millis in practice)
pub type Millis = i64;

/// Landmark indices of the 33-point BlazePose topology.
///
/// The discriminants are the estimator's output indices and must never be
/// reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum Landmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Landmark {
    /// Number of landmarks in the full topology
    pub const COUNT: usize = 33;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single detected keypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// Detection confidence (0-1). The estimator calls this `score`.
    #[serde(alias = "score", default)]
    pub confidence: f64,
    /// Depth, when the model provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Landmark name attached by some estimators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            confidence,
            z: None,
            name: None,
        }
    }

    /// Non-finite coordinates or confidence make a keypoint unusable; such
    /// points are treated exactly like absent ones.
    pub fn is_usable(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.confidence.is_finite()
    }
}

/// A detected pose: keypoints indexed by [`Landmark`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Entries may be `null` when the estimator omits an occluded landmark
    pub keypoints: Vec<Option<Keypoint>>,
    /// Overall pose score, if the estimator reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Pose {
    pub fn new(keypoints: Vec<Option<Keypoint>>) -> Self {
        Self {
            keypoints,
            score: None,
        }
    }

    /// Usable keypoint at a landmark, or `None` if missing or malformed
    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.keypoints
            .get(landmark.index())
            .and_then(|kp| kp.as_ref())
            .filter(|kp| kp.is_usable())
    }

    /// Set the keypoint at a landmark, growing the sequence with `None` as needed
    pub fn set(&mut self, landmark: Landmark, keypoint: Keypoint) {
        let index = landmark.index();
        if self.keypoints.len() <= index {
            self.keypoints.resize(index + 1, None);
        }
        self.keypoints[index] = Some(keypoint);
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// True when at least one keypoint is present and usable
    pub fn has_usable_keypoints(&self) -> bool {
        self.keypoints
            .iter()
            .flatten()
            .any(|kp| kp.is_usable())
    }
}

/// Posture verdict, ordered from best to worst for tie-breaking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NoPersonDetected,
    AwaitingDetection,
    ShouldersNotVisible,
    Good,
    Acceptable,
    Regular,
    Poor,
    Critical,
}

impl Verdict {
    pub const ALL: [Verdict; 8] = [
        Verdict::NoPersonDetected,
        Verdict::AwaitingDetection,
        Verdict::ShouldersNotVisible,
        Verdict::Good,
        Verdict::Acceptable,
        Verdict::Regular,
        Verdict::Poor,
        Verdict::Critical,
    ];

    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::NoPersonDetected => "no_person_detected",
            Verdict::AwaitingDetection => "awaiting_detection",
            Verdict::ShouldersNotVisible => "shoulders_not_visible",
            Verdict::Good => "good",
            Verdict::Acceptable => "acceptable",
            Verdict::Regular => "regular",
            Verdict::Poor => "poor",
            Verdict::Critical => "critical",
        }
    }

    /// Human-readable status line for on-screen display
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::NoPersonDetected => "No person detected.",
            Verdict::AwaitingDetection => "Waiting for pose detection...",
            Verdict::ShouldersNotVisible => {
                "Position yourself so the camera can see both shoulders."
            }
            Verdict::Good => "Good posture! Shoulders level and head well positioned.",
            Verdict::Acceptable => {
                "Acceptable posture. Small adjustments to shoulders or neck could help."
            }
            Verdict::Regular => {
                "Fair posture: try to level your shoulders and keep your head up."
            }
            Verdict::Poor => {
                "Poor posture: shoulders misaligned or head pushed forward. Adjust your position."
            }
            Verdict::Critical => {
                "Critical posture! Shoulders strongly tilted and head pushed forward. Straighten up now."
            }
        }
    }

    /// Severity rank, 0 = best
    pub fn severity(&self) -> u8 {
        *self as u8
    }

    /// Whether the verdict judges an actual posture rather than detection state
    pub fn is_assessment(&self) -> bool {
        *self >= Verdict::Good
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intermediate signals computed by the classifier
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostureSignals {
    /// Vertical shoulder offset in input pixel units
    pub shoulder_level_diff: f64,
    /// Horizontal shoulder span in input pixel units
    pub shoulder_width: f64,
    /// `level_diff / width`; `None` when the span is degenerate
    pub tilt_ratio: Option<f64>,
    /// Forward-head score (0-4), 0 when the left ear is not confidently seen
    pub head_forward_score: u8,
    /// Shoulder/hip centers are vertically aligned
    pub hip_bonus: bool,
    pub severe_tilt: bool,
    pub moderate_tilt: bool,
    pub severe_head: bool,
    pub moderate_head: bool,
}

/// Debounced state shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    pub current_verdict: Verdict,
    /// `None` until the first visible change
    pub last_changed_at: Option<Millis>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            current_verdict: Verdict::AwaitingDetection,
            last_changed_at: None,
        }
    }
}

/// Keypoint with everything but position and confidence stripped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReducedKeypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl From<&Keypoint> for ReducedKeypoint {
    fn from(kp: &Keypoint) -> Self {
        Self {
            x: kp.x,
            y: kp.y,
            confidence: kp.confidence,
        }
    }
}

/// A persisted posture snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub verdict: Verdict,
    /// Encoded thumbnail image (JPEG from the host renderer), base64 on the wire
    #[serde(default, with = "base64_bytes")]
    pub thumbnail: Vec<u8>,
    pub keypoints: Vec<Option<ReducedKeypoint>>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Keypoint position handed to the display overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub index: usize,
    pub x: f64,
    pub y: f64,
}
