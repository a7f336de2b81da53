//! FFI bindings for TENSIO
//!
//! This module provides C-compatible functions so a presentation layer written
//! in another language can call the inference entry point. Strings returned to
//! the caller are allocated here and must be freed with `tensio_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;
use std::ptr;
use std::sync::Arc;

use crate::artifact::TrainedPipeline;
use crate::error::TensioError;
use crate::service::StressEstimator;
use crate::stress::cortisol_to_stress;
use crate::types::{FeatureVector, StressEstimate};

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

fn estimate_to_cstr(result: Result<StressEstimate, TensioError>) -> *mut c_char {
    match result.and_then(|estimate| Ok(serde_json::to_string(&estimate)?)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Estimator lifecycle
// ============================================================================

/// Opaque handle to a loaded StressEstimator
pub struct TensioEstimatorHandle {
    estimator: StressEstimator,
}

fn into_handle(result: Result<StressEstimator, TensioError>) -> *mut TensioEstimatorHandle {
    match result {
        Ok(estimator) => Box::into_raw(Box::new(TensioEstimatorHandle { estimator })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load a trained pipeline artifact from a file path.
///
/// # Safety
/// - `path` must be a valid null-terminated C string.
/// - Returns a handle that must be freed with `tensio_estimator_free`.
/// - Returns NULL on error; call `tensio_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tensio_estimator_load(path: *const c_char) -> *mut TensioEstimatorHandle {
    clear_last_error();

    let path_str = match cstr_to_string(path) {
        Some(s) => s,
        None => {
            set_last_error("Invalid path string pointer");
            return ptr::null_mut();
        }
    };

    into_handle(StressEstimator::load(Path::new(&path_str)))
}

/// Build an estimator from trained pipeline JSON held in memory.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a handle that must be freed with `tensio_estimator_free`.
/// - Returns NULL on error; call `tensio_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tensio_estimator_from_json(
    json: *const c_char,
) -> *mut TensioEstimatorHandle {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    into_handle(
        TrainedPipeline::from_json(&json_str)
            .and_then(|pipeline| StressEstimator::from_pipeline(Arc::new(pipeline))),
    )
}

/// Free an estimator handle.
///
/// # Safety
/// - `handle` must be a pointer returned by a `tensio_estimator_*` constructor, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn tensio_estimator_free(handle: *mut TensioEstimatorHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// ============================================================================
// Inference
// ============================================================================

/// Estimate cortisol, stress and advice; returns a JSON object.
///
/// Inputs are not range-checked.
///
/// # Safety
/// - `handle` must be a valid pointer returned by a `tensio_estimator_*` constructor.
/// - Returns a newly allocated string that must be freed with `tensio_free_string`.
/// - Returns NULL on error; call `tensio_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tensio_estimate(
    handle: *const TensioEstimatorHandle,
    sleep_hours: f64,
    exercise_hours: f64,
    event_score: i32,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null estimator pointer");
        return ptr::null_mut();
    }

    let handle = &*handle;
    let features = FeatureVector::new(sleep_hours, exercise_hours, event_score);
    estimate_to_cstr(Ok(handle.estimator.estimate(&features)))
}

/// Like `tensio_estimate`, but rejects inputs outside the documented ranges.
///
/// # Safety
/// - `handle` must be a valid pointer returned by a `tensio_estimator_*` constructor.
/// - Returns a newly allocated string that must be freed with `tensio_free_string`.
/// - Returns NULL on error; call `tensio_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tensio_estimate_checked(
    handle: *const TensioEstimatorHandle,
    sleep_hours: f64,
    exercise_hours: f64,
    event_score: i32,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null estimator pointer");
        return ptr::null_mut();
    }

    let handle = &*handle;
    let features = FeatureVector::new(sleep_hours, exercise_hours, event_score);
    estimate_to_cstr(handle.estimator.estimate_checked(&features))
}

/// Stateless logistic stress transform.
#[no_mangle]
pub extern "C" fn tensio_cortisol_to_stress(cortisol: f64) -> f64 {
    cortisol_to_stress(cortisol)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by TENSIO functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a TENSIO function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn tensio_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next TENSIO call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn tensio_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the TENSIO library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn tensio_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, SynthesisConfig, TrainingConfig};
    use crate::trainer::Trainer;

    fn pipeline_json() -> CString {
        let config = PipelineConfig {
            synthesis: SynthesisConfig {
                samples: 100,
                seed: 42,
            },
            training: TrainingConfig {
                epochs: 2,
                ..Default::default()
            },
        };
        let pipeline = Trainer::new(config).unwrap().run().unwrap();
        CString::new(pipeline.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_ffi_estimator_lifecycle() {
        let json = pipeline_json();

        unsafe {
            let handle = tensio_estimator_from_json(json.as_ptr());
            assert!(!handle.is_null());

            let result = tensio_estimate(handle, 4.5, 1.0, 0);
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert!(value["cortisol"].as_f64().unwrap() >= 0.0);
            assert!(value["advice"].is_string());

            tensio_free_string(result);
            tensio_estimator_free(handle);
        }
    }

    #[test]
    fn test_ffi_checked_rejects_out_of_range() {
        let json = pipeline_json();

        unsafe {
            let handle = tensio_estimator_from_json(json.as_ptr());
            let result = tensio_estimate_checked(handle, 12.0, 1.0, 0);
            assert!(result.is_null());

            let error = CStr::from_ptr(tensio_last_error()).to_str().unwrap();
            assert!(error.contains("sleep_hours"));

            tensio_estimator_free(handle);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid = CString::new("not json").unwrap();
            let handle = tensio_estimator_from_json(invalid.as_ptr());
            assert!(handle.is_null());

            let error = tensio_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            let missing = CString::new("/nonexistent/tensio_pipeline.json").unwrap();
            assert!(tensio_estimator_load(missing.as_ptr()).is_null());

            assert!(tensio_estimate(ptr::null(), 4.5, 1.0, 0).is_null());
        }
    }

    #[test]
    fn test_ffi_stress_transform() {
        assert_eq!(tensio_cortisol_to_stress(15.0), 5.0);
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = tensio_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
