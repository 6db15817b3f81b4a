//! Strike Coach Engine Library
//!
//! Turns a stream of three-axis accelerometer samples into classified strikes
//! and drives a round-based training session from them.
//!
//! # Design Philosophy
//!
//! - **One execution context**: samples, clock ticks and report ticks are
//!   serialized through a single [`TrainingCoach`]. [`SharedCoach`] provides
//!   that serialization when producers live on different threads.
//! - **Explicit state machines**: the classifier and the session orchestrator
//!   are small enum-driven machines whose transitions are testable without
//!   timers or callbacks.
//! - **Effects, not callbacks**: the orchestrator returns the effects a
//!   transition requires; the coach applies them in order.
//! - **Same core on every host**: handheld and wrist hosts differ only in
//!   their [`ClassifierProfile`].
//!
//! # Example
//!
//! ```
//! use strike_coach::{GoalKind, RoundSpec, Sample, SampleSource, TrainingCoach};
//!
//! let mut coach = TrainingCoach::recording();
//! coach.start_session(vec![RoundSpec::new("Jab", GoalKind::Reps, 1.0)]);
//!
//! for (i, g) in [1.4, 1.8, 2.0, 1.9].iter().enumerate() {
//!     coach.on_sample(SampleSource::Local, &Sample::new(i as u64 * 50, [*g, 0.0, 0.0]));
//! }
//! // The round goal ends the session; its totals live on in the summary
//! assert_eq!(coach.summary().total_strikes, 1);
//! assert_eq!(coach.metrics().total_strikes(), 0);
//! ```

pub mod classifier;
pub mod coach;
pub mod config;
pub mod ffi;
pub mod metrics;
pub mod report;
pub mod runtime;
pub mod session;
pub mod types;

#[cfg(test)]
mod integration_tests;

// Re-export commonly used types
pub use classifier::{estimate_force, ClassifierPhase, ClassifierProfile, StrikeClassifier};
pub use coach::{
    CoachListener, CoachNotification, NullListener, RecordingListener, SampleOutcome,
    TrainingCoach,
};
pub use config::{
    ClassifierConfig, ClassifierSetting, CoachConfig, ConfigError, RoundSetting, SessionMode,
    Setting, WorkoutPlan,
};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use report::{ReportSnapshot, SessionSummary};
pub use runtime::{SessionClock, SharedCoach};
pub use session::{
    DisqualifyReason, SessionEffect, SessionEvent, SessionOrchestrator, SessionOutcome,
    SessionPhase, SessionState, TimerKind,
};
pub use types::{GoalKind, RoundSpec, Sample, SampleSource, Strike, STANDARD_GRAVITY};
