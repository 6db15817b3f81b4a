//! Round-based training session state machine.
//!
//! The orchestrator sequences rounds, enforces per-round cutoffs, schedules
//! rest periods and decides when a session ends. It never sees raw samples:
//! its inputs are clock ticks and goal-met signals, and its outputs are
//! [`SessionEffect`] values describing what the caller must do (notify the
//! announcer, reset round metrics, start or cancel a timer).
//!
//! # States
//! ```text
//! Inactive ──start──▶ RoundActive ──goal met──▶ Resting ──rest over──▶ RoundActive[next]
//!                         │    └──goal met, no rest──────────────────▶ RoundActive[next]
//!                         │                                             or Inactive (complete)
//!                         └──cutoff──▶ Inactive (disqualified)
//! ```

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, RoundSetting, SessionMode};
use crate::types::{GoalKind, RoundSpec};

/// Timers the session asks its host to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// The 1 Hz session clock.
    Clock,
    /// The challenge-mode progress report timer.
    Report,
}

/// Mutually exclusive session phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Inactive,
    RoundActive,
    Resting,
}

/// How the last session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every round was completed.
    Completed,
    /// A cutoff elapsed before the round goal was met.
    Disqualified,
    /// Stopped by the host.
    Stopped,
}

/// Why a session was disqualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisqualifyReason {
    /// The round's own cutoff elapsed.
    RoundCutoff { cutoff_s: u32 },
    /// The challenge-wide active time limit elapsed.
    SessionTimeLimit { limit_s: u32 },
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Begin a session with the given rounds, force-stopping any active one.
    Start(Vec<RoundSpec>),
    /// One second of session clock.
    Tick,
    /// The current round's strike-driven goal has been reached.
    GoalMet,
    /// Stop the session. Idempotent.
    Stop,
}

/// Outputs of the state machine, in the order they must be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    StartTimer(TimerKind),
    CancelTimer(TimerKind),
    ResetSessionMetrics,
    ResetRoundMetrics,
    RoundStarted {
        index: usize,
        round: RoundSpec,
        goal: String,
    },
    RoundEnded {
        index: usize,
        round: RoundSpec,
    },
    RestStarted {
        seconds: u32,
    },
    Disqualified {
        index: usize,
        reason: DisqualifyReason,
    },
    SessionComplete,
    SessionStopped,
}

impl SessionEffect {
    /// True for the effects that end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEffect::Disqualified { .. }
                | SessionEffect::SessionComplete
                | SessionEffect::SessionStopped
        )
    }
}

/// Mutable session bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub rounds: Vec<RoundSpec>,
    /// In `[0, rounds.len()]`; equals `rounds.len()` only once all rounds are done.
    pub current_round_index: usize,
    pub active_elapsed_s: u32,
    pub active_elapsed_in_round_s: u32,
    pub is_resting: bool,
    pub rest_remaining_s: u32,
    pub is_session_active: bool,
}

/// Round sequencing state machine.
pub struct SessionOrchestrator {
    mode: SessionMode,
    state: SessionState,
    outcome: Option<SessionOutcome>,
    rounds_completed: usize,
}

impl SessionOrchestrator {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            state: SessionState::default(),
            outcome: None,
            rounds_completed: 0,
        }
    }

    /// Single entry point for every input.
    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        match event {
            SessionEvent::Start(rounds) => self.start(rounds, &mut effects),
            SessionEvent::Tick => self.tick(&mut effects),
            SessionEvent::GoalMet => self.goal_met(&mut effects),
            SessionEvent::Stop => {
                if self.state.is_session_active {
                    info!(round = self.state.current_round_index, "session stopped");
                    self.terminate(
                        SessionOutcome::Stopped,
                        SessionEffect::SessionStopped,
                        &mut effects,
                    );
                }
            }
        }
        effects
    }

    pub fn start_session(&mut self, rounds: Vec<RoundSpec>) -> Vec<SessionEffect> {
        self.handle_event(SessionEvent::Start(rounds))
    }

    pub fn tick_once(&mut self) -> Vec<SessionEffect> {
        self.handle_event(SessionEvent::Tick)
    }

    pub fn report_goal_met(&mut self) -> Vec<SessionEffect> {
        self.handle_event(SessionEvent::GoalMet)
    }

    pub fn stop_session(&mut self) -> Vec<SessionEffect> {
        self.handle_event(SessionEvent::Stop)
    }

    /// Replace the rounds of an inactive orchestrator. Refused while active.
    pub fn load_rounds(&mut self, rounds: Vec<RoundSpec>) -> bool {
        if self.state.is_session_active {
            return false;
        }
        self.state.rounds = rounds;
        self.state.current_round_index = 0;
        true
    }

    /// Change one field of a loaded round. Takes effect at its next evaluation.
    pub fn update_round(&mut self, index: usize, change: RoundSetting) -> Result<(), ConfigError> {
        let rounds = self.state.rounds.len();
        let round = self
            .state
            .rounds
            .get_mut(index)
            .ok_or(ConfigError::UnknownRound { index, rounds })?;
        change.apply_to(round);
        debug!(index, ?change, "round updated");
        Ok(())
    }

    /// Change the scoring mode. Refused while a session is active.
    pub fn set_mode(&mut self, mode: SessionMode) -> bool {
        if self.state.is_session_active {
            return false;
        }
        self.mode = mode;
        true
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.state.is_session_active {
            SessionPhase::Inactive
        } else if self.state.is_resting {
            SessionPhase::Resting
        } else {
            SessionPhase::RoundActive
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.state.is_session_active
    }

    /// The round being played, or None once past the last round.
    pub fn current_round(&self) -> Option<&RoundSpec> {
        self.state.rounds.get(self.state.current_round_index)
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    pub fn rounds_completed(&self) -> usize {
        self.rounds_completed
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    fn start(&mut self, rounds: Vec<RoundSpec>, effects: &mut Vec<SessionEffect>) {
        if self.state.is_session_active {
            warn!(
                round = self.state.current_round_index,
                "starting a new session while one is active; stopping it first"
            );
            self.terminate(SessionOutcome::Stopped, SessionEffect::SessionStopped, effects);
        }

        info!(rounds = rounds.len(), mode = ?self.mode, "session started");
        self.state = SessionState {
            rounds,
            is_session_active: true,
            ..SessionState::default()
        };
        self.outcome = None;
        self.rounds_completed = 0;
        effects.push(SessionEffect::ResetSessionMetrics);

        if self.state.rounds.is_empty() {
            self.terminate(SessionOutcome::Completed, SessionEffect::SessionComplete, effects);
            return;
        }

        effects.push(SessionEffect::StartTimer(TimerKind::Clock));
        if self.mode.is_challenge() {
            effects.push(SessionEffect::StartTimer(TimerKind::Report));
        }
        self.enter_round(effects);
    }

    fn tick(&mut self, effects: &mut Vec<SessionEffect>) {
        if !self.state.is_session_active {
            trace!("tick ignored, no active session");
            return;
        }

        if self.state.is_resting {
            self.state.rest_remaining_s = self.state.rest_remaining_s.saturating_sub(1);
            if self.state.rest_remaining_s == 0 {
                self.state.is_resting = false;
                self.advance(effects);
            }
            return;
        }

        self.state.active_elapsed_s += 1;
        self.state.active_elapsed_in_round_s += 1;

        let Some(round) = self.current_round() else {
            return;
        };
        let elapsed = self.state.active_elapsed_in_round_s;

        if round.goal_kind == GoalKind::Time && elapsed as f64 >= round.goal_value {
            self.complete_round(effects);
            return;
        }

        if let Some(cutoff_s) = round.cutoff() {
            if elapsed >= cutoff_s {
                self.disqualify(DisqualifyReason::RoundCutoff { cutoff_s }, effects);
                return;
            }
        }

        if let Some(limit_s) = self.mode.session_time_limit() {
            if self.state.active_elapsed_s >= limit_s {
                self.disqualify(DisqualifyReason::SessionTimeLimit { limit_s }, effects);
            }
        }
    }

    fn goal_met(&mut self, effects: &mut Vec<SessionEffect>) {
        if self.phase() != SessionPhase::RoundActive {
            trace!(phase = ?self.phase(), "goal-met signal ignored");
            return;
        }
        self.complete_round(effects);
    }

    fn enter_round(&mut self, effects: &mut Vec<SessionEffect>) {
        self.state.active_elapsed_in_round_s = 0;
        self.state.is_resting = false;
        self.state.rest_remaining_s = 0;
        effects.push(SessionEffect::ResetRoundMetrics);

        let index = self.state.current_round_index;
        if let Some(round) = self.current_round() {
            let round = round.clone();
            let goal = round.goal_description();
            info!(index, name = %round.name, %goal, "round started");
            effects.push(SessionEffect::RoundStarted { index, round, goal });
        }
    }

    fn complete_round(&mut self, effects: &mut Vec<SessionEffect>) {
        let index = self.state.current_round_index;
        let Some(round) = self.current_round().cloned() else {
            return;
        };
        info!(
            index,
            name = %round.name,
            elapsed_s = self.state.active_elapsed_in_round_s,
            "round ended"
        );
        self.rounds_completed += 1;
        let rest = round.rest_time_seconds;
        effects.push(SessionEffect::RoundEnded { index, round });
        effects.push(SessionEffect::ResetRoundMetrics);

        if rest > 0 {
            self.state.is_resting = true;
            self.state.rest_remaining_s = rest;
            info!(seconds = rest, "rest started");
            effects.push(SessionEffect::RestStarted { seconds: rest });
        } else {
            self.advance(effects);
        }
    }

    fn advance(&mut self, effects: &mut Vec<SessionEffect>) {
        self.state.current_round_index += 1;
        if self.state.current_round_index >= self.state.rounds.len() {
            self.state.current_round_index = self.state.rounds.len();
            info!(
                active_elapsed_s = self.state.active_elapsed_s,
                "all rounds complete"
            );
            self.terminate(SessionOutcome::Completed, SessionEffect::SessionComplete, effects);
        } else {
            self.enter_round(effects);
        }
    }

    fn disqualify(&mut self, reason: DisqualifyReason, effects: &mut Vec<SessionEffect>) {
        let index = self.state.current_round_index;
        warn!(index, ?reason, "session disqualified");
        self.terminate(
            SessionOutcome::Disqualified,
            SessionEffect::Disqualified { index, reason },
            effects,
        );
    }

    /// Cancel timers, mark the session inactive, announce `terminal`, then
    /// reset the session metrics. Hosts read the final totals when they apply
    /// the terminal effect.
    fn terminate(
        &mut self,
        outcome: SessionOutcome,
        terminal: SessionEffect,
        effects: &mut Vec<SessionEffect>,
    ) {
        self.state.is_session_active = false;
        self.state.is_resting = false;
        self.state.rest_remaining_s = 0;
        self.outcome = Some(outcome);
        effects.push(SessionEffect::CancelTimer(TimerKind::Clock));
        if self.mode.is_challenge() {
            effects.push(SessionEffect::CancelTimer(TimerKind::Report));
        }
        effects.push(terminal);
        effects.push(SessionEffect::ResetSessionMetrics);
    }
}

impl Default for SessionOrchestrator {
    fn default() -> Self {
        Self::new(SessionMode::Training)
    }
}
