//! Configuration boundary for the strike coach.
//!
//! Everything the engine is tuned by enters through here: classifier
//! thresholds, session mode, timer periods, and the flat key-value settings
//! the host UI can change before or during a session. Values are validated at
//! this boundary so the classifier and orchestrator can assume well-formed,
//! non-negative thresholds.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{GoalKind, RoundSpec};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },
    #[error("unknown setting key: {0}")]
    UnknownKey(String),
    #[error("round {index} does not exist (session has {rounds} rounds)")]
    UnknownRound { index: usize, rounds: usize },
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(key: &str, value: impl ToString, reason: &'static str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

// ============================================================================
// CLASSIFIER CONFIGURATION
// ============================================================================

/// Threshold snapshot read by a classifier for each sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Peak magnitude (g) a segment must reach to count as motion.
    pub acceleration_threshold: f64,
    /// Seconds after a strike during which samples are dropped.
    pub post_strike_cooldown_s: f64,
    /// Minimum segment duration (seconds) before a strike can validate.
    pub min_motion_duration_s: f64,
    /// Seconds after which a segment that never reached the threshold is dropped.
    pub idle_timeout_s: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            acceleration_threshold: 1.5,
            post_strike_cooldown_s: 0.2,
            min_motion_duration_s: 0.15,
            idle_timeout_s: 2.0,
        }
    }
}

impl ClassifierConfig {
    /// Refuses non-finite or negative values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("accelerationThreshold", self.acceleration_threshold)?;
        check_non_negative("postStrikeCooldown", self.post_strike_cooldown_s)?;
        check_non_negative("minMotionDuration", self.min_motion_duration_s)?;
        check_positive("idleTimeout", self.idle_timeout_s)?;
        Ok(())
    }

    /// Returns a validated copy with one setting changed.
    pub fn with_setting(&self, setting: ClassifierSetting) -> Result<Self, ConfigError> {
        let mut next = *self;
        match setting {
            ClassifierSetting::AccelerationThreshold(v) => next.acceleration_threshold = v,
            ClassifierSetting::PostStrikeCooldown(v) => next.post_strike_cooldown_s = v,
            ClassifierSetting::MinMotionDuration(v) => next.min_motion_duration_s = v,
            ClassifierSetting::IdleTimeout(v) => next.idle_timeout_s = v,
        }
        next.validate()?;
        Ok(next)
    }

    pub fn cooldown_ms(&self) -> u64 {
        seconds_to_ms(self.post_strike_cooldown_s)
    }

    pub fn min_motion_duration_ms(&self) -> u64 {
        seconds_to_ms(self.min_motion_duration_s)
    }

    pub fn idle_timeout_ms(&self) -> u64 {
        seconds_to_ms(self.idle_timeout_s)
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

fn check_positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(key, value, "must be finite"));
    }
    if value <= 0.0 {
        return Err(ConfigError::invalid(key, value, "must be greater than zero"));
    }
    Ok(())
}

fn check_non_negative(key: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(key, value, "must be finite"));
    }
    if value < 0.0 {
        return Err(ConfigError::invalid(key, value, "must not be negative"));
    }
    Ok(())
}

// ============================================================================
// SESSION CONFIGURATION
// ============================================================================

/// How a session is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionMode {
    /// Plain training: rounds, rests, per-round cutoffs.
    #[default]
    Training,
    /// Multiplayer challenge: periodic progress reports, optional session-wide
    /// time limit that disqualifies when reached.
    Challenge {
        #[serde(default)]
        session_time_limit_s: Option<u32>,
    },
}

impl SessionMode {
    pub fn is_challenge(&self) -> bool {
        matches!(self, SessionMode::Challenge { .. })
    }

    /// Session-wide active time limit, if one applies.
    pub fn session_time_limit(&self) -> Option<u32> {
        match self {
            SessionMode::Challenge {
                session_time_limit_s,
            } => session_time_limit_s.filter(|s| *s > 0),
            SessionMode::Training => None,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Classifier thresholds shared by every sample source.
    pub classifier: ClassifierConfig,
    /// Training or challenge scoring.
    pub mode: SessionMode,
    /// Seconds between challenge progress reports.
    pub report_interval_s: u32,
    /// Session clock period in milliseconds (nominally one second).
    pub clock_interval_ms: u64,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            mode: SessionMode::Training,
            report_interval_s: 5,
            clock_interval_ms: 1000,
        }
    }
}

impl CoachConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.classifier.validate()?;
        if self.report_interval_s == 0 {
            return Err(ConfigError::invalid(
                "reportInterval",
                self.report_interval_s,
                "must be greater than zero",
            ));
        }
        if self.clock_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "clockInterval",
                self.clock_interval_ms,
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: CoachConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

/// A configuration plus the ordered rounds of one workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    #[serde(default)]
    pub config: CoachConfig,
    pub rounds: Vec<RoundSpec>,
}

impl WorkoutPlan {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        for (index, round) in self.rounds.iter().enumerate() {
            let key = format!("rounds[{}].goalValue", index);
            check_positive(&key, round.goal_value)?;
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let plan: WorkoutPlan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

// ============================================================================
// KEY-VALUE SETTINGS
// ============================================================================

/// A classifier threshold change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifierSetting {
    AccelerationThreshold(f64),
    PostStrikeCooldown(f64),
    MinMotionDuration(f64),
    IdleTimeout(f64),
}

/// A change to one field of a round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundSetting {
    GoalKind(GoalKind),
    GoalValue(f64),
    CutoffTimeSeconds(Option<u32>),
    RestTimeSeconds(u32),
}

impl RoundSetting {
    pub fn apply_to(&self, round: &mut RoundSpec) {
        match *self {
            RoundSetting::GoalKind(kind) => round.goal_kind = kind,
            RoundSetting::GoalValue(value) => round.goal_value = value,
            RoundSetting::CutoffTimeSeconds(cutoff) => round.cutoff_time_seconds = cutoff,
            RoundSetting::RestTimeSeconds(rest) => round.rest_time_seconds = rest,
        }
    }
}

/// One entry of the flat key-value configuration set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting {
    Classifier(ClassifierSetting),
    Round { index: usize, change: RoundSetting },
}

impl Setting {
    /// Parses `key = value`.
    ///
    /// Classifier keys: `accelerationThreshold`, `postStrikeCooldown`,
    /// `minMotionDuration`, `idleTimeout`. Round keys take the form
    /// `rounds[<index>].<field>` with field one of `goalKind`, `goalValue`,
    /// `cutoffTimeSeconds`, `restTimeSeconds`.
    pub fn parse(key: &str, value: &str) -> Result<Self, ConfigError> {
        let key = key.trim();
        let setting = match key {
            "accelerationThreshold" => {
                let v = parse_f64(key, value)?;
                check_positive(key, v)?;
                Setting::Classifier(ClassifierSetting::AccelerationThreshold(v))
            }
            "postStrikeCooldown" => {
                let v = parse_f64(key, value)?;
                check_non_negative(key, v)?;
                Setting::Classifier(ClassifierSetting::PostStrikeCooldown(v))
            }
            "minMotionDuration" => {
                let v = parse_f64(key, value)?;
                check_non_negative(key, v)?;
                Setting::Classifier(ClassifierSetting::MinMotionDuration(v))
            }
            "idleTimeout" => {
                let v = parse_f64(key, value)?;
                check_positive(key, v)?;
                Setting::Classifier(ClassifierSetting::IdleTimeout(v))
            }
            _ => return Self::parse_round(key, value),
        };
        Ok(setting)
    }

    fn parse_round(key: &str, value: &str) -> Result<Self, ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let rest = key.strip_prefix("rounds[").ok_or_else(unknown)?;
        let (index, field) = rest.split_once("].").ok_or_else(unknown)?;
        let index: usize = index.trim().parse().map_err(|_| unknown())?;

        let change = match field {
            "goalKind" => {
                let kind = GoalKind::parse(value)
                    .ok_or_else(|| ConfigError::invalid(key, value, "expected force, reps, time or strikes"))?;
                RoundSetting::GoalKind(kind)
            }
            "goalValue" => {
                let v = parse_f64(key, value)?;
                check_positive(key, v)?;
                RoundSetting::GoalValue(v)
            }
            "cutoffTimeSeconds" => {
                let seconds = parse_seconds(key, value)?;
                RoundSetting::CutoffTimeSeconds(if seconds == 0 { None } else { Some(seconds) })
            }
            "restTimeSeconds" => RoundSetting::RestTimeSeconds(parse_seconds(key, value)?),
            _ => return Err(unknown()),
        };
        Ok(Setting::Round { index, change })
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::invalid(key, value, "expected a number"))
}

fn parse_seconds(key: &str, value: &str) -> Result<u32, ConfigError> {
    let v = parse_f64(key, value)?;
    check_non_negative(key, v)?;
    if v > u32::MAX as f64 {
        return Err(ConfigError::invalid(key, value, "out of range"));
    }
    Ok(v.round() as u32)
}
