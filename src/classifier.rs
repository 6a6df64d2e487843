//! Posture classification
//!
//! Turns the keypoints of a single pose into a [`Verdict`]. The rule set uses
//! three signals:
//! - Lateral shoulder tilt (absolute and relative to shoulder span)
//! - Forward head position, from the left ear relative to the shoulder center
//! - Shoulder/hip vertical alignment, which softens moderate verdicts
//!
//! Classification is pure: no hidden state, no I/O, and missing or malformed
//! data always degrades to a defined verdict.

use crate::config::ClassifierThresholds;
use crate::types::{Keypoint, Landmark, Pose, PostureSignals, Verdict};

/// Classify a pose with the default thresholds
pub fn classify(pose: Option<&Pose>) -> Verdict {
    PostureClassifier::default().classify(pose)
}

/// Rule-based posture classifier
#[derive(Debug, Clone, Default)]
pub struct PostureClassifier {
    thresholds: ClassifierThresholds,
}

#[derive(Debug, Clone, Copy)]
struct Point {
    x: f64,
    y: f64,
}

fn midpoint(a: &Keypoint, b: &Keypoint) -> Point {
    Point {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

impl PostureClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    /// Classify a pose, or its absence
    pub fn classify(&self, pose: Option<&Pose>) -> Verdict {
        let Some(pose) = pose else {
            return Verdict::NoPersonDetected;
        };

        if !pose.has_usable_keypoints() {
            return Verdict::AwaitingDetection;
        }

        match self.analyze(pose) {
            Some(signals) => Self::decide(&signals),
            None => Verdict::ShouldersNotVisible,
        }
    }

    /// Compute the intermediate signals for a pose.
    ///
    /// Returns `None` when either shoulder is missing or below the shoulder
    /// confidence threshold, since nothing else can be judged without them.
    pub fn analyze(&self, pose: &Pose) -> Option<PostureSignals> {
        let t = &self.thresholds;

        let left_shoulder = pose.get(Landmark::LeftShoulder)?;
        let right_shoulder = pose.get(Landmark::RightShoulder)?;
        if left_shoulder.confidence < t.shoulder_min_confidence
            || right_shoulder.confidence < t.shoulder_min_confidence
        {
            return None;
        }

        let shoulder_center = midpoint(left_shoulder, right_shoulder);

        let shoulder_level_diff = (left_shoulder.y - right_shoulder.y).abs();
        let shoulder_width = (left_shoulder.x - right_shoulder.x).abs();
        let tilt_ratio = if shoulder_width > t.min_shoulder_width {
            Some(shoulder_level_diff / shoulder_width)
        } else {
            None
        };
        let ratio = tilt_ratio.unwrap_or(0.0);

        let severe_tilt = ratio > t.severe_tilt_ratio || shoulder_level_diff > t.severe_level_diff;
        let moderate_tilt =
            ratio > t.moderate_tilt_ratio || shoulder_level_diff > t.moderate_level_diff;

        // Only the left ear is consulted
        let head_forward_score = pose
            .get(Landmark::LeftEar)
            .filter(|ear| ear.confidence > t.ear_min_confidence)
            .map(|ear| self.head_forward_score(ear, shoulder_center))
            .unwrap_or(0);

        let hip_bonus = self.hip_bonus(pose, shoulder_center);

        let signals = PostureSignals {
            shoulder_level_diff,
            shoulder_width,
            tilt_ratio,
            head_forward_score,
            hip_bonus,
            severe_tilt,
            moderate_tilt,
            severe_head: head_forward_score >= t.severe_head_score,
            moderate_head: head_forward_score >= t.moderate_head_score,
        };

        log::debug!("posture signals: {:?}", signals);

        Some(signals)
    }

    fn head_forward_score(&self, ear: &Keypoint, shoulder_center: Point) -> u8 {
        let t = &self.thresholds;
        let ear_forward_x = shoulder_center.x - ear.x;
        let ear_down_y = ear.y - shoulder_center.y;

        let mut score = 0;

        if ear_forward_x > t.ear_forward_strong {
            score += 2;
        } else if ear_forward_x > t.ear_forward_mild {
            score += 1;
        }

        if ear_down_y > t.ear_down_strong {
            score += 2;
        } else if ear_down_y > t.ear_down_mild {
            score += 1;
        }

        score
    }

    fn hip_bonus(&self, pose: &Pose, shoulder_center: Point) -> bool {
        let t = &self.thresholds;
        match (pose.get(Landmark::LeftHip), pose.get(Landmark::RightHip)) {
            (Some(left_hip), Some(right_hip))
                if left_hip.confidence > t.hip_min_confidence
                    && right_hip.confidence > t.hip_min_confidence =>
            {
                let hip_center = midpoint(left_hip, right_hip);
                (shoulder_center.x - hip_center.x).abs() < t.max_spine_offset
            }
            _ => false,
        }
    }

    /// Decision table, first match wins
    fn decide(signals: &PostureSignals) -> Verdict {
        if signals.severe_tilt && signals.severe_head {
            Verdict::Critical
        } else if signals.severe_tilt || signals.severe_head {
            Verdict::Poor
        } else if signals.moderate_tilt || signals.moderate_head {
            if signals.hip_bonus {
                Verdict::Acceptable
            } else {
                Verdict::Regular
            }
        } else {
            Verdict::Good
        }
    }
}
