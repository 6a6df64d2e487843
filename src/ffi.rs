//! FFI bindings for the posture monitor
//!
//! This module provides C-compatible functions for driving the monitor from a
//! host (browser bridge, mobile app, desktop shell). All functions use C
//! strings (null-terminated) and return allocated memory that must be freed by
//! the caller using `posture_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, TimeZone, Utc};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::keypoints::parse_pose;
use crate::monitor::{classify_pose_json, NoThumbnail, PostureMonitor};
use crate::store::MemoryRecordStore;
use crate::types::Pose;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn millis_to_datetime(now_ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(now_ms).single()
}

/// A NULL pose pointer means "no person detected"
unsafe fn optional_pose(pose_json: *const c_char) -> Result<Option<Pose>, String> {
    if pose_json.is_null() {
        return Ok(None);
    }
    let json = cstr_to_string(pose_json).ok_or_else(|| "Invalid pose string".to_string())?;
    parse_pose(&json).map(Some).map_err(|e| e.to_string())
}

// ============================================================================
// Stateless API
// ============================================================================

/// Classify a pose JSON object and return the verdict name.
///
/// # Safety
/// - `pose_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_classify_json(pose_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json = match cstr_to_string(pose_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid pose string pointer");
            return ptr::null_mut();
        }
    };

    match classify_pose_json(&json) {
        Ok(verdict) => string_to_cstr(verdict.as_str()),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Monitor API
// ============================================================================

/// Opaque handle to a PostureMonitor with an in-memory record store
pub struct PostureMonitorHandle {
    monitor: PostureMonitor<MemoryRecordStore>,
}

/// Create a monitor from a JSON configuration (NULL for defaults).
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `posture_monitor_free`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_monitor_new(config_json: *const c_char) -> *mut PostureMonitorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        MonitorConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match MonitorConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match PostureMonitor::new(config, MemoryRecordStore::new()) {
        Ok(monitor) => Box::into_raw(Box::new(PostureMonitorHandle { monitor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a monitor.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `posture_monitor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn posture_monitor_free(monitor: *mut PostureMonitorHandle) {
    if !monitor.is_null() {
        drop(Box::from_raw(monitor));
    }
}

/// Feed one rendered frame and return the frame report as JSON.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `posture_monitor_new`.
/// - `pose_json` must be NULL (no person) or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_monitor_frame(
    monitor: *mut PostureMonitorHandle,
    pose_json: *const c_char,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *monitor;

    let pose = match optional_pose(pose_json) {
        Ok(pose) => pose,
        Err(msg) => {
            set_last_error(&msg);
            return ptr::null_mut();
        }
    };

    let Some(now) = millis_to_datetime(now_ms) else {
        set_last_error("Timestamp out of range");
        return ptr::null_mut();
    };

    let report = handle.monitor.on_frame(pose.as_ref(), now);
    match serde_json::to_string(&report) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Record a snapshot of a pose, returning the stored record as JSON
/// (`null` when no pose was given).
///
/// Thumbnails are not rendered through this API; hosts keep images alongside
/// the returned record id.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `posture_monitor_new`.
/// - `pose_json` must be NULL (no person) or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_monitor_capture(
    monitor: *mut PostureMonitorHandle,
    pose_json: *const c_char,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *monitor;

    let pose = match optional_pose(pose_json) {
        Ok(pose) => pose,
        Err(msg) => {
            set_last_error(&msg);
            return ptr::null_mut();
        }
    };

    let Some(now) = millis_to_datetime(now_ms) else {
        set_last_error("Timestamp out of range");
        return ptr::null_mut();
    };

    let result = handle
        .monitor
        .on_capture_tick(pose.as_ref(), &mut NoThumbnail, now)
        .and_then(|record| serde_json::to_string(&record).map_err(MonitorError::from));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return up to `limit` stored records, newest first, as a JSON array.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `posture_monitor_new`.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_monitor_history(
    monitor: *mut PostureMonitorHandle,
    limit: u32,
) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }

    let handle = &*monitor;

    let result = handle
        .monitor
        .history(limit as usize)
        .and_then(|records| serde_json::to_string(&records).map_err(MonitorError::from));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by posture functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a posture function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn posture_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next posture function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn posture_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn posture_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
