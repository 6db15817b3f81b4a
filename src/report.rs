//! Outbound session data.
//!
//! Two shapes leave the engine:
//! - **ReportSnapshot**: periodic challenge-mode progress, handed to an
//!   external persistence/broadcast collaborator. Delivery is the
//!   collaborator's concern; the engine never retries.
//! - **SessionSummary**: end-of-session totals for the host to display or store.
//!
//! Both serialize to JSON through serde.

use serde::Serialize;

use crate::metrics::MetricsSnapshot;
use crate::session::SessionOutcome;

/// Challenge progress at one report tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSnapshot {
    pub total_force: f64,
    pub total_strikes: u64,
    pub round_name: String,
    /// One-based round number.
    pub round_number: usize,
    /// Progress toward the current round goal in [0.0, 1.0].
    pub round_progress_fraction: f64,
}

impl ReportSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Totals for a finished (or running) session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// None while the session is still running.
    pub outcome: Option<SessionOutcome>,
    pub rounds_completed: usize,
    pub rounds_total: usize,
    pub total_strikes: u64,
    pub total_force: f64,
    pub max_force: f64,
    pub average_force: f64,
    pub active_elapsed_s: u32,
}

impl SessionSummary {
    pub fn new(
        outcome: Option<SessionOutcome>,
        rounds_completed: usize,
        rounds_total: usize,
        metrics: &MetricsSnapshot,
        active_elapsed_s: u32,
    ) -> Self {
        Self {
            outcome,
            rounds_completed,
            rounds_total,
            total_strikes: metrics.total_strikes,
            total_force: metrics.total_force,
            max_force: metrics.max_force,
            average_force: metrics.average_force,
            active_elapsed_s,
        }
    }

    /// Fraction of rounds completed.
    pub fn completion_fraction(&self) -> f64 {
        if self.rounds_total == 0 {
            return 0.0;
        }
        self.rounds_completed as f64 / self.rounds_total as f64
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
