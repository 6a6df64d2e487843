//! Posture Monitor - keypoint-based sitting posture classification
//!
//! The monitor turns pose-estimator keypoints into a posture verdict through a
//! deterministic pipeline: keypoints → classification → debounced display
//! state, with a timer-driven path that records snapshots to a local store.
//!
//! ## Modules
//!
//! - **Classifier**: pure rule set over shoulders, left ear and hips
//! - **Debouncer**: suppresses visible verdict flicker
//! - **Recorder**: periodic snapshots with retention pruning
//! - **Monitor**: owns all of the above and is driven by host triggers

pub mod classifier;
pub mod config;
pub mod debounce;
pub mod error;
pub mod keypoints;
pub mod monitor;
pub mod recorder;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::{classify, PostureClassifier};
pub use config::MonitorConfig;
pub use debounce::VerdictDebouncer;
pub use error::MonitorError;
pub use keypoints::reduce_for_storage;
pub use monitor::{classify_pose_json, PoseSource, PostureMonitor, Thumbnailer};
pub use recorder::{CaptureTimer, SnapshotRecorder};
pub use store::{JsonlRecordStore, MemoryRecordStore, RecordStore};
pub use types::{Keypoint, Landmark, Pose, Verdict};

/// Library version
pub const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "posture-monitor";
