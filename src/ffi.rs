//! C FFI Bindings for Mobile and Wearable Hosts
//!
//! This module exposes the strike coach to native shells via C ABI.
//! Phone and watch apps feed samples, drive the clock, and poll events.
//!
//! Memory Safety:
//! - All returned strings must be freed with `coach_free_string()`
//! - The coach instance must be freed with `coach_destroy()`
//! - NULL checks are performed on all inputs
//!
//! Thread Safety:
//! - A coach handle is NOT thread-safe. Call it from one thread or behind a
//!   mutex; samples, clock ticks and report ticks must all be serialized.

use std::collections::VecDeque;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use tracing::warn;

use crate::coach::{CoachNotification, RecordingListener, TrainingCoach};
use crate::config::{ClassifierConfig, CoachConfig, SessionMode};
use crate::report::ReportSnapshot;
use crate::session::SessionPhase;
use crate::types::{GoalKind, RoundSpec, Sample, SampleSource};

// ============================================================================
// OPAQUE HANDLE TYPES
// ============================================================================

/// Opaque handle to a strike coach. Notifications wait here until
/// `coach_poll_event()` hands them out.
pub struct CoachHandle {
    coach: TrainingCoach<RecordingListener>,
    pending: VecDeque<CoachNotification>,
}

/// Result status codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoachStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer provided.
    NullPointer = 1,
    /// Invalid parameter value.
    InvalidParameter = 2,
    /// Operation not possible in the current session phase.
    InvalidState = 3,
}

/// Configuration for the coach.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct CoachConfigFfi {
    /// Magnitude (g) that opens and validates a motion segment.
    pub acceleration_threshold: f64,
    /// Seconds after a strike during which samples are ignored.
    pub post_strike_cooldown_s: f64,
    /// Minimum segment duration in seconds.
    pub min_motion_duration_s: f64,
    /// Seconds before an unvalidated segment is discarded.
    pub idle_timeout_s: f64,
    /// Challenge mode (0 = training, 1 = challenge).
    pub challenge_mode: i32,
    /// Challenge active-time limit in seconds (0 = none).
    pub session_time_limit_s: u32,
    /// Seconds between challenge progress reports.
    pub report_interval_s: u32,
}

/// One round of a workout.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct RoundSpecFfi {
    /// Round name (null-terminated UTF-8).
    pub name: *const c_char,
    /// Goal kind (0=Force, 1=Reps, 2=Time, 3=Strikes).
    pub goal_kind: i32,
    pub goal_value: f64,
    /// Cutoff in seconds (0 = none).
    pub cutoff_time_seconds: u32,
    pub rest_time_seconds: u32,
}

/// Event kinds delivered through `coach_poll_event()`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoachEventKind {
    None = 0,
    Strike = 1,
    StrikeCountChanged = 2,
    RoundStarted = 3,
    RoundEnded = 4,
    RestStarted = 5,
    Disqualified = 6,
    SessionComplete = 7,
    SessionStopped = 8,
    Report = 9,
}

/// One polled event. Unused fields are zero.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CoachEventFfi {
    pub kind: CoachEventKind,
    /// Round index for round events, -1 otherwise.
    pub round_index: i32,
    /// Strike force in newtons, or report total force.
    pub value: f64,
    /// Strike count, rest seconds, or strike timestamp in ms.
    pub count: u64,
}

impl CoachEventFfi {
    fn empty() -> Self {
        Self {
            kind: CoachEventKind::None,
            round_index: -1,
            value: 0.0,
            count: 0,
        }
    }
}

/// Challenge progress snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ReportSnapshotFfi {
    pub total_force: f64,
    pub total_strikes: u64,
    /// One-based round number.
    pub round_number: u32,
    pub round_progress_fraction: f64,
}

impl From<&ReportSnapshot> for ReportSnapshotFfi {
    fn from(snapshot: &ReportSnapshot) -> Self {
        Self {
            total_force: snapshot.total_force,
            total_strikes: snapshot.total_strikes,
            round_number: snapshot.round_number as u32,
            round_progress_fraction: snapshot.round_progress_fraction,
        }
    }
}

// ============================================================================
// COACH LIFECYCLE
// ============================================================================

/// Create a new coach instance.
///
/// # Safety
/// - `config` must be a valid pointer to CoachConfigFfi.
/// - The returned pointer must be freed with `coach_destroy()`.
///
/// # Returns
/// - Pointer to CoachHandle on success.
/// - NULL on a null pointer or an invalid configuration.
#[no_mangle]
pub unsafe extern "C" fn coach_create(config: *const CoachConfigFfi) -> *mut CoachHandle {
    if config.is_null() {
        return ptr::null_mut();
    }
    let config = &*config;

    let mode = if config.challenge_mode != 0 {
        SessionMode::Challenge {
            session_time_limit_s: Some(config.session_time_limit_s).filter(|s| *s > 0),
        }
    } else {
        SessionMode::Training
    };
    let coach_config = CoachConfig {
        classifier: ClassifierConfig {
            acceleration_threshold: config.acceleration_threshold,
            post_strike_cooldown_s: config.post_strike_cooldown_s,
            min_motion_duration_s: config.min_motion_duration_s,
            idle_timeout_s: config.idle_timeout_s,
        },
        mode,
        report_interval_s: config.report_interval_s,
        ..CoachConfig::default()
    };

    match TrainingCoach::new(coach_config, RecordingListener::new()) {
        Ok(coach) => Box::into_raw(Box::new(CoachHandle {
            coach,
            pending: VecDeque::new(),
        })),
        Err(e) => {
            warn!(error = %e, "coach_create rejected configuration");
            ptr::null_mut()
        }
    }
}

/// Destroy a coach instance.
///
/// # Safety
/// - `handle` must be a valid pointer from `coach_create()`.
/// - Must not be called more than once for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn coach_destroy(handle: *mut CoachHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// ============================================================================
// SESSION CONTROL
// ============================================================================

/// Start a session with `count` rounds, force-stopping any active session.
///
/// # Safety
/// - `handle` must be a valid pointer.
/// - `rounds` must point to `count` RoundSpecFfi values (may be NULL when `count` is 0).
#[no_mangle]
pub unsafe extern "C" fn coach_start_session(
    handle: *mut CoachHandle,
    rounds: *const RoundSpecFfi,
    count: usize,
) -> CoachStatus {
    if handle.is_null() || (rounds.is_null() && count > 0) {
        return CoachStatus::NullPointer;
    }
    let handle = &mut *handle;

    let raw = if count == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(rounds, count)
    };
    let mut specs = Vec::with_capacity(count);
    for round in raw {
        match round_from_ffi(round) {
            Some(spec) => specs.push(spec),
            None => return CoachStatus::InvalidParameter,
        }
    }

    handle.coach.start_session(specs);
    CoachStatus::Ok
}

/// Stop the active session. Calling it again is harmless.
///
/// # Safety
/// - `handle` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn coach_stop_session(handle: *mut CoachHandle) -> CoachStatus {
    if handle.is_null() {
        return CoachStatus::NullPointer;
    }
    (*handle).coach.stop_session();
    CoachStatus::Ok
}

/// Advance the session clock by one second.
///
/// # Safety
/// - `handle` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn coach_tick(handle: *mut CoachHandle) -> CoachStatus {
    if handle.is_null() {
        return CoachStatus::NullPointer;
    }
    (*handle).coach.tick();
    CoachStatus::Ok
}

/// Produce a challenge progress report.
///
/// # Safety
/// - `handle` must be a valid pointer.
/// - `out` must be a valid pointer to ReportSnapshotFfi.
///
/// # Returns
/// - InvalidState outside an active challenge session.
#[no_mangle]
pub unsafe extern "C" fn coach_report_tick(
    handle: *mut CoachHandle,
    out: *mut ReportSnapshotFfi,
) -> CoachStatus {
    if handle.is_null() || out.is_null() {
        return CoachStatus::NullPointer;
    }
    match (*handle).coach.report_tick() {
        Some(snapshot) => {
            *out = ReportSnapshotFfi::from(&snapshot);
            CoachStatus::Ok
        }
        None => CoachStatus::InvalidState,
    }
}

// ============================================================================
// SAMPLE PROCESSING
// ============================================================================

/// Feed one accelerometer sample (in g).
///
/// # Safety
/// - `handle` must be a valid pointer.
/// - `strike_force_out` may be NULL; otherwise it receives the strike force,
///   or 0.0 when this sample completed no strike.
///
/// # Parameters
/// - `source`: 0=Local, 1=Peripheral, 2=Companion.
#[no_mangle]
pub unsafe extern "C" fn coach_push_sample(
    handle: *mut CoachHandle,
    source: i32,
    timestamp_ms: u64,
    x: f64,
    y: f64,
    z: f64,
    strike_force_out: *mut f64,
) -> CoachStatus {
    if handle.is_null() {
        return CoachStatus::NullPointer;
    }
    let Some(source) = usize::try_from(source).ok().and_then(SampleSource::from_index) else {
        return CoachStatus::InvalidParameter;
    };

    let handle = &mut *handle;
    let outcome = handle
        .coach
        .on_sample(source, &Sample::from_axes(x, y, z, timestamp_ms));

    if !strike_force_out.is_null() {
        *strike_force_out = outcome.strike.map_or(0.0, |s| s.estimated_force_n);
    }
    CoachStatus::Ok
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Apply one `key = value` setting, e.g. `accelerationThreshold = 1.8` or
/// `rounds[1].goalValue = 20`.
///
/// # Safety
/// - `handle` must be a valid pointer.
/// - `key` and `value` must be valid null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn coach_apply_setting(
    handle: *mut CoachHandle,
    key: *const c_char,
    value: *const c_char,
) -> CoachStatus {
    if handle.is_null() || key.is_null() || value.is_null() {
        return CoachStatus::NullPointer;
    }
    let (Ok(key), Ok(value)) = (CStr::from_ptr(key).to_str(), CStr::from_ptr(value).to_str())
    else {
        return CoachStatus::InvalidParameter;
    };

    match (*handle).coach.apply_key_value(key, value) {
        Ok(_) => CoachStatus::Ok,
        Err(_) => CoachStatus::InvalidParameter,
    }
}

// ============================================================================
// EVENTS & STATUS QUERIES
// ============================================================================

/// Pop the oldest pending event.
///
/// Events queue inside the handle until polled, one strike count event per
/// strike included. Hosts must poll until this returns 0 on every clock tick
/// or report tick, or the queue grows for the whole session.
///
/// # Safety
/// - `handle` must be a valid pointer.
/// - `out` must be a valid pointer to CoachEventFfi.
///
/// # Returns
/// - 1 if an event was written, 0 if none is pending, -1 on NULL input.
#[no_mangle]
pub unsafe extern "C" fn coach_poll_event(handle: *mut CoachHandle, out: *mut CoachEventFfi) -> i32 {
    if handle.is_null() || out.is_null() {
        return -1;
    }
    let handle = &mut *handle;
    if handle.pending.is_empty() {
        let drained = handle.coach.listener_mut().drain();
        handle.pending.extend(drained);
    }

    match handle.pending.pop_front() {
        Some(notification) => {
            *out = event_from_notification(&notification);
            1
        }
        None => {
            *out = CoachEventFfi::empty();
            0
        }
    }
}

/// Current session phase.
///
/// # Returns
/// - 0=Inactive, 1=RoundActive, 2=Resting, -1 on NULL input.
///
/// # Safety
/// - `handle` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn coach_phase(handle: *const CoachHandle) -> i32 {
    if handle.is_null() {
        return -1;
    }
    match (*handle).coach.phase() {
        SessionPhase::Inactive => 0,
        SessionPhase::RoundActive => 1,
        SessionPhase::Resting => 2,
    }
}

/// Total strikes in the running session, or -1 on NULL input. Reads 0 once
/// the session ends; the finished totals stay in `coach_summary_json()`.
///
/// # Safety
/// - `handle` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn coach_total_strikes(handle: *const CoachHandle) -> i64 {
    if handle.is_null() {
        return -1;
    }
    (*handle).coach.metrics().total_strikes() as i64
}

/// Progress toward the current round goal in [0.0, 1.0], or -1.0 on NULL input.
///
/// # Safety
/// - `handle` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn coach_round_progress(handle: *const CoachHandle) -> f64 {
    if handle.is_null() {
        return -1.0;
    }
    (*handle).coach.round_progress_fraction()
}

/// Summary of the running session, or of the last finished one, as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer.
///
/// # Returns
/// - JSON string (MUST be freed with `coach_free_string()`).
/// - NULL on error.
#[no_mangle]
pub unsafe extern "C" fn coach_summary_json(handle: *const CoachHandle) -> *mut c_char {
    if handle.is_null() {
        return ptr::null_mut();
    }
    match CString::new((*handle).coach.summary().to_json()) {
        Ok(cstring) => cstring.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a string returned by `coach_summary_json()`.
///
/// # Safety
/// - `ptr` must be a string returned by this library.
/// - Must not be called more than once for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn coach_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Library version.
///
/// # Returns
/// - Static string, do NOT free.
#[no_mangle]
pub extern "C" fn coach_version() -> *const c_char {
    static VERSION: &[u8] = b"strike-coach/0.1.0\0";
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// HELPERS
// ============================================================================

unsafe fn round_from_ffi(round: &RoundSpecFfi) -> Option<RoundSpec> {
    let goal_kind = match round.goal_kind {
        0 => GoalKind::Force,
        1 => GoalKind::Reps,
        2 => GoalKind::Time,
        3 => GoalKind::Strikes,
        _ => return None,
    };
    if !(round.goal_value.is_finite() && round.goal_value > 0.0) {
        return None;
    }
    let name = if round.name.is_null() {
        String::new()
    } else {
        CStr::from_ptr(round.name).to_str().ok()?.to_string()
    };

    let mut spec = RoundSpec::new(name, goal_kind, round.goal_value).with_rest(round.rest_time_seconds);
    if round.cutoff_time_seconds > 0 {
        spec = spec.with_cutoff(round.cutoff_time_seconds);
    }
    Some(spec)
}

fn event_from_notification(notification: &CoachNotification) -> CoachEventFfi {
    let mut event = CoachEventFfi::empty();
    match notification {
        CoachNotification::Strike {
            force_n,
            timestamp_ms,
            ..
        } => {
            event.kind = CoachEventKind::Strike;
            event.value = *force_n;
            event.count = *timestamp_ms;
        }
        CoachNotification::StrikeCountChanged { total } => {
            event.kind = CoachEventKind::StrikeCountChanged;
            event.count = *total;
        }
        CoachNotification::RoundStarted { index, .. } => {
            event.kind = CoachEventKind::RoundStarted;
            event.round_index = *index as i32;
        }
        CoachNotification::RoundEnded { index, .. } => {
            event.kind = CoachEventKind::RoundEnded;
            event.round_index = *index as i32;
        }
        CoachNotification::RestStarted { seconds } => {
            event.kind = CoachEventKind::RestStarted;
            event.count = u64::from(*seconds);
        }
        CoachNotification::Disqualified => event.kind = CoachEventKind::Disqualified,
        CoachNotification::SessionComplete => event.kind = CoachEventKind::SessionComplete,
        CoachNotification::SessionStopped => event.kind = CoachEventKind::SessionStopped,
        CoachNotification::Report(snapshot) => {
            event.kind = CoachEventKind::Report;
            event.round_index = snapshot.round_number as i32 - 1;
            event.value = snapshot.total_force;
            event.count = snapshot.total_strikes;
        }
    }
    event
}

// ============================================================================
// TESTS
// ============================================================================
