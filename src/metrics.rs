//! Running strike statistics for a training session.
//!
//! Aggregation is append-only: strikes are added, never revised. Session-wide
//! totals live for the whole session; the two round-scoped counters are zeroed
//! by the orchestrator at every round transition.

use serde::Serialize;

/// Point-in-time copy of the aggregated metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total_strikes: u64,
    pub total_force: f64,
    pub max_force: f64,
    pub average_force: f64,
    pub sum_force_in_current_round: f64,
    pub strike_count_in_current_round: u64,
}

/// Strike statistics, global and per round.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    metrics: MetricsSnapshot,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one strike's force to every counter.
    pub fn record_strike(&mut self, force: f64) {
        let m = &mut self.metrics;
        m.total_strikes += 1;
        m.total_force += force;
        m.sum_force_in_current_round += force;
        m.strike_count_in_current_round += 1;
        m.max_force = m.max_force.max(force);
        m.average_force = m.total_force / m.total_strikes as f64;
    }

    /// Round force progress toward `goal`, in percent, capped at 100.
    pub fn round_progress_percentage(&self, goal: f64) -> f64 {
        percentage(self.metrics.sum_force_in_current_round, goal)
    }

    /// Session force progress toward `total_goal`, in percent, capped at 100.
    pub fn session_progress_percentage(&self, total_goal: f64) -> f64 {
        percentage(self.metrics.total_force, total_goal)
    }

    /// Round strike-count progress toward `goal`, in percent, capped at 100.
    pub fn round_count_percentage(&self, goal: f64) -> f64 {
        percentage(self.metrics.strike_count_in_current_round as f64, goal)
    }

    pub fn reset_round(&mut self) {
        self.metrics.sum_force_in_current_round = 0.0;
        self.metrics.strike_count_in_current_round = 0;
    }

    pub fn reset_session(&mut self) {
        self.metrics = MetricsSnapshot::default();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics
    }

    pub fn total_strikes(&self) -> u64 {
        self.metrics.total_strikes
    }

    pub fn total_force(&self) -> f64 {
        self.metrics.total_force
    }

    pub fn max_force(&self) -> f64 {
        self.metrics.max_force
    }

    pub fn average_force(&self) -> f64 {
        self.metrics.average_force
    }

    pub fn sum_force_in_current_round(&self) -> f64 {
        self.metrics.sum_force_in_current_round
    }

    pub fn strike_count_in_current_round(&self) -> u64 {
        self.metrics.strike_count_in_current_round
    }
}

fn percentage(value: f64, goal: f64) -> f64 {
    if goal <= 0.0 || !goal.is_finite() {
        return 0.0;
    }
    (value / goal).min(1.0) * 100.0
}
