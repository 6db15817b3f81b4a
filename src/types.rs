//! Core data types for the strike coach engine.
//!
//! This module defines the values that flow between the engine stages:
//! raw acceleration samples in, validated strikes out, and the round
//! definitions that drive a training session.
//!
//! Design principle: Types should make intent obvious. If a concept exists,
//! it gets a type. Never pass raw tuples or untyped collections across boundaries.

use serde::{Deserialize, Serialize};

/// Standard gravity in m/s², used to turn normalized acceleration into force.
pub const STANDARD_GRAVITY: f64 = 9.81;

// ============================================================================
// SAMPLE TYPES
// ============================================================================

/// A single three-axis acceleration sample.
///
/// Acceleration is expressed in g (user acceleration, gravity removed by the
/// host). Samples are ephemeral: the classifier reads them once and keeps at
/// most their magnitude while a candidate motion is being tracked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,

    /// Acceleration [x, y, z] in g.
    pub accel: [f64; 3],
}

impl Sample {
    /// Creates a new sample.
    pub fn new(timestamp_ms: u64, accel: [f64; 3]) -> Self {
        Self {
            timestamp_ms,
            accel,
        }
    }

    /// Creates a sample from separate axis readings.
    pub fn from_axes(x: f64, y: f64, z: f64, timestamp_ms: u64) -> Self {
        Self::new(timestamp_ms, [x, y, z])
    }

    /// Euclidean magnitude of the acceleration vector.
    pub fn magnitude(&self) -> f64 {
        let [x, y, z] = self.accel;
        (x * x + y * y + z * z).sqrt()
    }

    /// True when every axis carries a finite reading.
    pub fn is_well_formed(&self) -> bool {
        self.accel.iter().all(|v| v.is_finite())
    }

    /// Unit vector along the acceleration, or None for a zero vector.
    pub fn unit_vector(&self) -> Option<[f64; 3]> {
        let mag = self.magnitude();
        if mag <= f64::EPSILON || !mag.is_finite() {
            return None;
        }
        Some([
            self.accel[0] / mag,
            self.accel[1] / mag,
            self.accel[2] / mag,
        ])
    }
}

/// Physical origin of a sample stream.
///
/// All three sources feed the same classifier logic; they differ only in the
/// classifier profile they are paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSource {
    /// The handheld device's own accelerometer.
    Local,
    /// An external wireless peripheral streaming to the handheld device.
    Peripheral,
    /// The paired wrist-worn companion device.
    Companion,
}

impl SampleSource {
    /// Number of distinct sources.
    pub const COUNT: usize = 3;

    /// Every source, in index order.
    pub const ALL: [SampleSource; Self::COUNT] = [
        SampleSource::Local,
        SampleSource::Peripheral,
        SampleSource::Companion,
    ];

    /// Stable index for per-source storage.
    pub fn index(&self) -> usize {
        match self {
            SampleSource::Local => 0,
            SampleSource::Peripheral => 1,
            SampleSource::Companion => 2,
        }
    }

    /// Inverse of [`SampleSource::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleSource::Local => "local",
            SampleSource::Peripheral => "peripheral",
            SampleSource::Companion => "companion",
        }
    }

    /// Parses the lowercase source name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

// ============================================================================
// STRIKE TYPES
// ============================================================================

/// A single validated impact with its estimated force.
///
/// Strikes are immutable once emitted and are never revised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Strike {
    /// Estimated force in newtons.
    pub estimated_force_n: f64,
    /// Timestamp of the sample that validated the strike.
    pub timestamp_ms: u64,
    /// Segment duration in seconds.
    pub duration_s: f64,
    /// Mean acceleration magnitude over the segment (g).
    pub avg_magnitude: f64,
    /// Peak acceleration magnitude over the segment (g).
    pub peak_magnitude: f64,
    /// Stream that produced the strike.
    pub source: SampleSource,
}

// ============================================================================
// ROUND TYPES
// ============================================================================

/// What a round's goal value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    /// Accumulated force in newtons within the round.
    Force,
    /// Number of repetitions (one strike each) within the round.
    Reps,
    /// Seconds of active time in the round.
    Time,
    /// Number of strikes within the round.
    Strikes,
}

impl GoalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalKind::Force => "force",
            GoalKind::Reps => "reps",
            GoalKind::Time => "time",
            GoalKind::Strikes => "strikes",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "force" => Some(GoalKind::Force),
            "reps" => Some(GoalKind::Reps),
            "time" => Some(GoalKind::Time),
            "strikes" => Some(GoalKind::Strikes),
            _ => None,
        }
    }

    /// True for goals met by strike arrival rather than by the clock.
    pub fn is_strike_driven(&self) -> bool {
        !matches!(self, GoalKind::Time)
    }
}

/// One scored segment of a training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSpec {
    /// Display name of the round.
    pub name: String,
    /// What the goal measures.
    pub goal_kind: GoalKind,
    /// Target value in the unit of `goal_kind`.
    pub goal_value: f64,
    /// Seconds after which an unfinished round disqualifies the session.
    #[serde(default)]
    pub cutoff_time_seconds: Option<u32>,
    /// Rest period after the round, in seconds. Zero skips the rest.
    #[serde(default)]
    pub rest_time_seconds: u32,
}

impl RoundSpec {
    /// Creates a round with no cutoff and no rest.
    pub fn new(name: impl Into<String>, goal_kind: GoalKind, goal_value: f64) -> Self {
        Self {
            name: name.into(),
            goal_kind,
            goal_value,
            cutoff_time_seconds: None,
            rest_time_seconds: 0,
        }
    }

    pub fn with_cutoff(mut self, seconds: u32) -> Self {
        self.cutoff_time_seconds = Some(seconds);
        self
    }

    pub fn with_rest(mut self, seconds: u32) -> Self {
        self.rest_time_seconds = seconds;
        self
    }

    /// Active cutoff in seconds, if the round declares a positive one.
    pub fn cutoff(&self) -> Option<u32> {
        self.cutoff_time_seconds.filter(|s| *s > 0)
    }

    /// Short description of what the round asks for.
    pub fn goal_description(&self) -> String {
        let value = self.goal_value.max(0.0);
        let base = match self.goal_kind {
            GoalKind::Force => format!("Deliver {:.0} N of total force", value),
            GoalKind::Reps => format!("Complete {} reps", value.round() as u64),
            GoalKind::Time => format!("Keep striking for {} seconds", value.round() as u64),
            GoalKind::Strikes => format!("Land {} strikes", value.round() as u64),
        };
        match self.cutoff() {
            Some(cutoff) => format!("{} within {} seconds", base, cutoff),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let sample = Sample::new(0, [3.0, 4.0, 0.0]);
        assert_eq!(sample.magnitude(), 5.0);
    }

    #[test]
    fn test_malformed_sample_detection() {
        assert!(Sample::from_axes(0.1, 0.2, 0.3, 10).is_well_formed());
        assert!(!Sample::from_axes(f64::NAN, 0.2, 0.3, 10).is_well_formed());
        assert!(!Sample::from_axes(0.1, f64::INFINITY, 0.3, 10).is_well_formed());
    }

    #[test]
    fn test_unit_vector() {
        let unit = Sample::new(0, [0.0, 2.0, 0.0]).unit_vector().unwrap();
        assert_eq!(unit, [0.0, 1.0, 0.0]);
        assert!(Sample::new(0, [0.0, 0.0, 0.0]).unit_vector().is_none());
    }

    #[test]
    fn test_source_index_roundtrip() {
        for source in SampleSource::ALL {
            assert_eq!(SampleSource::from_index(source.index()), Some(source));
            assert_eq!(SampleSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(SampleSource::from_index(3), None);
    }

    #[test]
    fn test_goal_kind_parse() {
        assert_eq!(GoalKind::parse("Force"), Some(GoalKind::Force));
        assert_eq!(GoalKind::parse(" time "), Some(GoalKind::Time));
        assert_eq!(GoalKind::parse("laps"), None);
        assert!(!GoalKind::Time.is_strike_driven());
        assert!(GoalKind::Reps.is_strike_driven());
    }

    #[test]
    fn test_goal_description_per_kind() {
        assert_eq!(
            RoundSpec::new("Power", GoalKind::Force, 500.0).goal_description(),
            "Deliver 500 N of total force"
        );
        assert_eq!(
            RoundSpec::new("Speed", GoalKind::Strikes, 30.0)
                .with_cutoff(45)
                .goal_description(),
            "Land 30 strikes within 45 seconds"
        );
        assert_eq!(
            RoundSpec::new("Endurance", GoalKind::Time, 60.0).goal_description(),
            "Keep striking for 60 seconds"
        );
    }

    #[test]
    fn test_zero_cutoff_is_no_cutoff() {
        let round = RoundSpec::new("R", GoalKind::Reps, 10.0).with_cutoff(0);
        assert_eq!(round.cutoff(), None);
    }

    #[test]
    fn test_round_spec_deserializes_with_defaults() {
        let round: RoundSpec =
            serde_json::from_str(r#"{"name":"Jab","goal_kind":"reps","goal_value":20}"#).unwrap();
        assert_eq!(round.goal_kind, GoalKind::Reps);
        assert_eq!(round.cutoff_time_seconds, None);
        assert_eq!(round.rest_time_seconds, 0);
    }
}
