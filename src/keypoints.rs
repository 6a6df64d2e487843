//! Keypoint handling at the crate boundaries
//!
//! - Parsing pose payloads produced by the estimator
//! - Reducing poses to the storage format
//! - Selecting keypoints for the display overlay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::types::{OverlayPoint, Pose, ReducedKeypoint};

/// Number of leading landmarks kept in stored records
pub const STORED_LANDMARKS: usize = 17;

/// Keep the first `limit` landmarks, each stripped to position and confidence.
///
/// Absent entries stay `None` so indices are preserved. Poses shorter than
/// `limit` are returned whole, without padding.
pub fn reduce_for_storage(pose: &Pose, limit: usize) -> Vec<Option<ReducedKeypoint>> {
    pose.keypoints
        .iter()
        .take(limit)
        .map(|kp| kp.as_ref().map(ReducedKeypoint::from))
        .collect()
}

/// Keypoints confident enough to draw
pub fn overlay_points(pose: &Pose, min_confidence: f64) -> Vec<OverlayPoint> {
    pose.keypoints
        .iter()
        .enumerate()
        .filter_map(|(index, kp)| {
            kp.as_ref()
                .filter(|kp| kp.is_usable() && kp.confidence > min_confidence)
                .map(|kp| OverlayPoint {
                    index,
                    x: kp.x,
                    y: kp.y,
                })
        })
        .collect()
}

/// Parse a single pose object
pub fn parse_pose(json: &str) -> Result<Pose, MonitorError> {
    serde_json::from_str(json).map_err(|e| MonitorError::ParseError(e.to_string()))
}

/// Parse the estimator's list of poses and keep the first one, if any
pub fn parse_poses(json: &str) -> Result<Option<Pose>, MonitorError> {
    let poses: Vec<Pose> =
        serde_json::from_str(json).map_err(|e| MonitorError::ParseError(e.to_string()))?;
    Ok(poses.into_iter().next())
}

/// A timestamped estimator output, as recorded for replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub timestamp: DateTime<Utc>,
    /// `null` when no person was detected in the frame
    #[serde(default)]
    pub pose: Option<Pose>,
}

/// Parse newline-delimited frames, skipping blank lines
pub fn parse_frames_ndjson(input: &str) -> Result<Vec<PoseFrame>, MonitorError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line_no, line)| {
            serde_json::from_str::<PoseFrame>(line.trim()).map_err(|e| {
                MonitorError::ParseError(format!("line {}: {}", line_no + 1, e))
            })
        })
        .collect()
}
