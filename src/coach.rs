//! Complete strike coach integrating every engine stage.
//!
//! This module owns the data flow from raw samples to session feedback:
//! 1. **Classification**: one [`StrikeClassifier`] per sample source turns
//!    samples into strikes
//! 2. **Aggregation**: strikes accumulate in the [`MetricsAggregator`]
//! 3. **Orchestration**: strike-driven goals and clock ticks advance the
//!    [`SessionOrchestrator`]
//! 4. **Feedback**: orchestrator effects and strike counts reach the host
//!    through a [`CoachListener`]
//!
//! A [`TrainingCoach`] is a single execution context: it is not internally
//! synchronized, and every producer (samples, clock, reports) must call into
//! it from the same owner. [`crate::runtime::SharedCoach`] provides that
//! owner when producers live on different threads.

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::classifier::StrikeClassifier;
use crate::config::{ClassifierConfig, CoachConfig, ConfigError, SessionMode, Setting};
use crate::metrics::MetricsAggregator;
use crate::report::{ReportSnapshot, SessionSummary};
use crate::session::{SessionEffect, SessionOrchestrator, SessionPhase};
use crate::types::{GoalKind, RoundSpec, Sample, SampleSource, Strike};

/// Receiver of fire-and-forget coach notifications.
///
/// Every method has an empty default so hosts implement only what they
/// announce.
pub trait CoachListener {
    fn on_strike(&mut self, _strike: &Strike) {}
    fn on_strike_count_changed(&mut self, _total: u64) {}
    fn on_round_started(&mut self, _round: &RoundSpec, _index: usize) {}
    fn on_round_ended(&mut self, _round: &RoundSpec, _index: usize) {}
    fn on_rest_started(&mut self, _seconds: u32) {}
    fn on_disqualified(&mut self) {}
    fn on_session_complete(&mut self) {}
    fn on_session_stopped(&mut self) {}
    fn on_report(&mut self, _snapshot: &ReportSnapshot) {}
}

impl<T: CoachListener + ?Sized> CoachListener for Box<T> {
    fn on_strike(&mut self, strike: &Strike) {
        (**self).on_strike(strike)
    }
    fn on_strike_count_changed(&mut self, total: u64) {
        (**self).on_strike_count_changed(total)
    }
    fn on_round_started(&mut self, round: &RoundSpec, index: usize) {
        (**self).on_round_started(round, index)
    }
    fn on_round_ended(&mut self, round: &RoundSpec, index: usize) {
        (**self).on_round_ended(round, index)
    }
    fn on_rest_started(&mut self, seconds: u32) {
        (**self).on_rest_started(seconds)
    }
    fn on_disqualified(&mut self) {
        (**self).on_disqualified()
    }
    fn on_session_complete(&mut self) {
        (**self).on_session_complete()
    }
    fn on_session_stopped(&mut self) {
        (**self).on_session_stopped()
    }
    fn on_report(&mut self, snapshot: &ReportSnapshot) {
        (**self).on_report(snapshot)
    }
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl CoachListener for NullListener {}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoachNotification {
    Strike {
        force_n: f64,
        timestamp_ms: u64,
        source: SampleSource,
    },
    StrikeCountChanged {
        total: u64,
    },
    RoundStarted {
        index: usize,
        name: String,
        goal: String,
    },
    RoundEnded {
        index: usize,
        name: String,
    },
    RestStarted {
        seconds: u32,
    },
    Disqualified,
    SessionComplete,
    SessionStopped,
    Report(ReportSnapshot),
}

impl CoachNotification {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CoachNotification::Disqualified
                | CoachNotification::SessionComplete
                | CoachNotification::SessionStopped
        )
    }
}

/// Listener that keeps every notification in arrival order.
///
/// Nothing is dropped: callers own the notifications and release them with
/// [`RecordingListener::drain`].
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    notifications: Vec<CoachNotification>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> &[CoachNotification] {
        &self.notifications
    }

    /// Take every notification recorded so far.
    pub fn drain(&mut self) -> Vec<CoachNotification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn count_where(&self, predicate: impl Fn(&CoachNotification) -> bool) -> usize {
        self.notifications.iter().filter(|n| predicate(n)).count()
    }

    pub fn terminal_count(&self) -> usize {
        self.count_where(CoachNotification::is_terminal)
    }
}

impl CoachListener for RecordingListener {
    fn on_strike(&mut self, strike: &Strike) {
        self.notifications.push(CoachNotification::Strike {
            force_n: strike.estimated_force_n,
            timestamp_ms: strike.timestamp_ms,
            source: strike.source,
        });
    }

    fn on_strike_count_changed(&mut self, total: u64) {
        self.notifications
            .push(CoachNotification::StrikeCountChanged { total });
    }

    fn on_round_started(&mut self, round: &RoundSpec, index: usize) {
        self.notifications.push(CoachNotification::RoundStarted {
            index,
            name: round.name.clone(),
            goal: round.goal_description(),
        });
    }

    fn on_round_ended(&mut self, round: &RoundSpec, index: usize) {
        self.notifications.push(CoachNotification::RoundEnded {
            index,
            name: round.name.clone(),
        });
    }

    fn on_rest_started(&mut self, seconds: u32) {
        self.notifications
            .push(CoachNotification::RestStarted { seconds });
    }

    fn on_disqualified(&mut self) {
        self.notifications.push(CoachNotification::Disqualified);
    }

    fn on_session_complete(&mut self) {
        self.notifications.push(CoachNotification::SessionComplete);
    }

    fn on_session_stopped(&mut self) {
        self.notifications.push(CoachNotification::SessionStopped);
    }

    fn on_report(&mut self, snapshot: &ReportSnapshot) {
        self.notifications
            .push(CoachNotification::Report(snapshot.clone()));
    }
}

/// Result of feeding one sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleOutcome {
    /// Strike validated by this sample, if any.
    pub strike: Option<Strike>,
    /// Session effects the strike caused (goal met, round change).
    pub effects: Vec<SessionEffect>,
}

/// Sample-to-feedback engine for one training session at a time.
pub struct TrainingCoach<L: CoachListener = RecordingListener> {
    config: CoachConfig,
    classifiers: [Option<StrikeClassifier>; SampleSource::COUNT],
    metrics: MetricsAggregator,
    orchestrator: SessionOrchestrator,
    last_summary: Option<SessionSummary>,
    listener: L,
}

impl<L: CoachListener> TrainingCoach<L> {
    /// Creates a coach with a validated configuration.
    pub fn new(config: CoachConfig, listener: L) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            classifiers: [None, None, None],
            metrics: MetricsAggregator::new(),
            orchestrator: SessionOrchestrator::new(config.mode),
            last_summary: None,
            listener,
        })
    }

    // =========================================================================
    // SESSION LIFECYCLE
    // =========================================================================

    /// Start a session, force-stopping any active one.
    pub fn start_session(&mut self, rounds: Vec<RoundSpec>) -> Vec<SessionEffect> {
        // The running session ends before the new rounds replace its state
        let mut effects = if self.orchestrator.is_active() {
            warn!("starting a new session while one is active; stopping it first");
            self.stop_session()
        } else {
            Vec::new()
        };
        let started = self.orchestrator.start_session(rounds);
        self.apply_effects(&started);
        effects.extend(started);
        // Classifiers start clean for the new session
        self.stop_classifiers();
        effects
    }

    /// Start a session with the rounds previously loaded.
    pub fn start_loaded_session(&mut self) -> Vec<SessionEffect> {
        let rounds = self.orchestrator.state().rounds.clone();
        self.start_session(rounds)
    }

    /// Load rounds for a later [`TrainingCoach::start_loaded_session`].
    pub fn load_rounds(&mut self, rounds: Vec<RoundSpec>) -> bool {
        self.orchestrator.load_rounds(rounds)
    }

    /// Stop the session and reset its metrics. Safe from any state; a second
    /// call does nothing.
    pub fn stop_session(&mut self) -> Vec<SessionEffect> {
        let effects = self.orchestrator.stop_session();
        self.apply_effects(&effects);
        self.stop_classifiers();
        effects
    }

    /// One second of session clock.
    pub fn tick(&mut self) -> Vec<SessionEffect> {
        let effects = self.orchestrator.tick_once();
        self.apply_effects(&effects);
        effects
    }

    /// Challenge-mode progress snapshot, delivered to the listener as well.
    pub fn report_tick(&mut self) -> Option<ReportSnapshot> {
        if !self.config.mode.is_challenge() || !self.orchestrator.is_active() {
            return None;
        }
        let state = self.orchestrator.state();
        let index = state.current_round_index;
        let round_name = self
            .orchestrator
            .current_round()
            .map(|r| r.name.clone())
            .unwrap_or_default();
        let snapshot = ReportSnapshot {
            total_force: self.metrics.total_force(),
            total_strikes: self.metrics.total_strikes(),
            round_name,
            round_number: index + 1,
            round_progress_fraction: self.round_progress_fraction(),
        };
        trace!(?snapshot, "report snapshot");
        self.listener.on_report(&snapshot);
        Some(snapshot)
    }

    // =========================================================================
    // SAMPLE INGRESS
    // =========================================================================

    /// Feed one sample from `source`.
    pub fn on_sample(&mut self, source: SampleSource, sample: &Sample) -> SampleOutcome {
        if !self.orchestrator.is_active() {
            trace!(source = source.as_str(), "sample ignored, no active session");
            return SampleOutcome::default();
        }

        let config = self.config.classifier;
        let classifier = self.classifiers[source.index()]
            .get_or_insert_with(|| StrikeClassifier::for_source(config, source));

        let Some(strike) = classifier.process_sample(sample) else {
            return SampleOutcome::default();
        };

        self.metrics.record_strike(strike.estimated_force_n);
        self.listener.on_strike(&strike);
        self.listener
            .on_strike_count_changed(self.metrics.total_strikes());

        let effects = self.evaluate_goal();
        SampleOutcome {
            strike: Some(strike),
            effects,
        }
    }

    /// Convenience for hosts pushing raw axis readings.
    pub fn on_sample_axes(
        &mut self,
        source: SampleSource,
        x: f64,
        y: f64,
        z: f64,
        timestamp_ms: u64,
    ) -> SampleOutcome {
        self.on_sample(source, &Sample::from_axes(x, y, z, timestamp_ms))
    }

    // =========================================================================
    // CONFIGURATION INGRESS
    // =========================================================================

    /// Replace the classifier threshold snapshot for every source.
    pub fn update_classifier_config(&mut self, config: ClassifierConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config.classifier = config;
        for classifier in self.classifiers.iter_mut().flatten() {
            classifier.update_config(config)?;
        }
        Ok(())
    }

    /// Apply one key-value setting.
    pub fn apply_setting(&mut self, setting: Setting) -> Result<Vec<SessionEffect>, ConfigError> {
        match setting {
            Setting::Classifier(change) => {
                let next = self.config.classifier.with_setting(change)?;
                self.update_classifier_config(next)?;
                Ok(Vec::new())
            }
            Setting::Round { index, change } => {
                self.orchestrator.update_round(index, change)?;
                if index == self.orchestrator.state().current_round_index {
                    Ok(self.evaluate_goal())
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Parse and apply `key = value`.
    pub fn apply_key_value(&mut self, key: &str, value: &str) -> Result<Vec<SessionEffect>, ConfigError> {
        Setting::parse(key, value)
            .and_then(|setting| self.apply_setting(setting))
            .map_err(|e| {
                warn!(key, value, error = %e, "setting refused");
                e
            })
    }

    /// Change the scoring mode. Refused while a session is active.
    pub fn set_mode(&mut self, mode: SessionMode) -> bool {
        if !self.orchestrator.set_mode(mode) {
            return false;
        }
        self.config.mode = mode;
        true
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Progress toward the current round goal in [0.0, 1.0].
    pub fn round_progress_fraction(&self) -> f64 {
        match self.orchestrator.phase() {
            SessionPhase::Inactive => return 0.0,
            SessionPhase::Resting => return 1.0,
            SessionPhase::RoundActive => {}
        }
        let Some(round) = self.orchestrator.current_round() else {
            return 0.0;
        };
        let percentage = match round.goal_kind {
            GoalKind::Force => self.metrics.round_progress_percentage(round.goal_value),
            GoalKind::Reps | GoalKind::Strikes => {
                self.metrics.round_count_percentage(round.goal_value)
            }
            GoalKind::Time => {
                let elapsed = self.orchestrator.state().active_elapsed_in_round_s as f64;
                if round.goal_value <= 0.0 {
                    0.0
                } else {
                    (elapsed / round.goal_value).min(1.0) * 100.0
                }
            }
        };
        percentage / 100.0
    }

    /// Totals of the running session, or of the last finished one.
    pub fn summary(&self) -> SessionSummary {
        if self.orchestrator.is_active() {
            return self.live_summary();
        }
        self.last_summary
            .clone()
            .unwrap_or_else(|| self.live_summary())
    }

    /// Totals captured when the last session ended.
    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.orchestrator.phase()
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    pub fn orchestrator(&self) -> &SessionOrchestrator {
        &self.orchestrator
    }

    pub fn classifier(&self, source: SampleSource) -> Option<&StrikeClassifier> {
        self.classifiers[source.index()].as_ref()
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    /// Signal goal-met when the active round's strike-driven goal is reached.
    fn evaluate_goal(&mut self) -> Vec<SessionEffect> {
        if self.orchestrator.phase() != SessionPhase::RoundActive {
            return Vec::new();
        }
        let Some(round) = self.orchestrator.current_round() else {
            return Vec::new();
        };
        let reached = match round.goal_kind {
            GoalKind::Force => self.metrics.sum_force_in_current_round() >= round.goal_value,
            GoalKind::Reps | GoalKind::Strikes => {
                self.metrics.strike_count_in_current_round() as f64 >= round.goal_value
            }
            GoalKind::Time => false,
        };
        if !reached {
            return Vec::new();
        }

        debug!(name = %round.name, "round goal reached");
        let effects = self.orchestrator.report_goal_met();
        self.apply_effects(&effects);
        effects
    }

    fn apply_effects(&mut self, effects: &[SessionEffect]) {
        for effect in effects {
            match effect {
                // Timers belong to whoever drives this coach
                SessionEffect::StartTimer(_) | SessionEffect::CancelTimer(_) => {}
                SessionEffect::ResetSessionMetrics => {
                    let had_strikes = self.metrics.total_strikes() > 0;
                    self.metrics.reset_session();
                    if had_strikes {
                        self.listener.on_strike_count_changed(0);
                    }
                }
                SessionEffect::ResetRoundMetrics => self.metrics.reset_round(),
                SessionEffect::RoundStarted { index, round, .. } => {
                    self.listener.on_round_started(round, *index)
                }
                SessionEffect::RoundEnded { index, round } => {
                    self.listener.on_round_ended(round, *index)
                }
                SessionEffect::RestStarted { seconds } => self.listener.on_rest_started(*seconds),
                SessionEffect::Disqualified { .. } => {
                    self.finish_session();
                    self.listener.on_disqualified();
                }
                SessionEffect::SessionComplete => {
                    self.finish_session();
                    self.listener.on_session_complete();
                }
                SessionEffect::SessionStopped => {
                    self.finish_session();
                    self.listener.on_session_stopped();
                }
            }
        }
    }

    fn live_summary(&self) -> SessionSummary {
        let state = self.orchestrator.state();
        SessionSummary::new(
            self.orchestrator.outcome(),
            self.orchestrator.rounds_completed(),
            state.rounds.len(),
            &self.metrics.snapshot(),
            state.active_elapsed_s,
        )
    }

    /// Freeze the ending session's totals before its metrics are reset.
    fn finish_session(&mut self) {
        let summary = self.live_summary();
        debug!(
            outcome = ?summary.outcome,
            strikes = summary.total_strikes,
            "session summary captured"
        );
        self.last_summary = Some(summary);
        self.stop_classifiers();
    }

    fn stop_classifiers(&mut self) {
        for classifier in self.classifiers.iter_mut().flatten() {
            classifier.stop();
        }
    }
}

impl TrainingCoach<RecordingListener> {
    /// Coach with default configuration that records its notifications.
    pub fn recording() -> Self {
        Self {
            config: CoachConfig::default(),
            classifiers: [None, None, None],
            metrics: MetricsAggregator::new(),
            orchestrator: SessionOrchestrator::new(SessionMode::Training),
            last_summary: None,
            listener: RecordingListener::new(),
        }
    }
}
