//! Strike Classification Module.
//!
//! Turns a continuous three-axis acceleration stream into discrete strikes
//! with an estimated force:
//! - Threshold crossing opens a candidate motion segment
//! - The segment is validated once it is long enough and its peak is high enough
//! - Segments that never reach the threshold expire after the idle timeout
//! - A settling phase absorbs the post-impact rebound
//! - A cooldown after every strike drops samples outright
//!
//! The same state machine runs on every host. Hosts differ only in their
//! [`ClassifierProfile`], which scales the settling and validation thresholds
//! and switches the direction-consistency filter on or off.

use tracing::{debug, trace};

use crate::config::{ClassifierConfig, ConfigError};
use crate::types::{Sample, SampleSource, Strike, STANDARD_GRAVITY};

/// Empirical scale turning acceleration-seconds into an estimated newton figure.
pub const FORCE_SCALE: f64 = 3.0;

/// Minimum cosine between start and validation directions for a consistent strike.
pub const DEFAULT_DIRECTION_MIN_DOT: f64 = 0.8;

/// Host-dependent tuning of the classifier thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierProfile {
    /// Settling threshold as a fraction of the acceleration threshold.
    pub settling_factor: f64,
    /// Validation threshold as a multiple of the acceleration threshold.
    pub validation_factor: f64,
    /// Reject segments whose direction reverses before validation.
    pub use_direction_filter: bool,
    /// Minimum dot product between start and current unit vectors.
    pub direction_min_dot: f64,
}

impl ClassifierProfile {
    /// Profile for the handheld device and the peripherals it hosts.
    pub fn handheld() -> Self {
        Self {
            settling_factor: 0.9,
            validation_factor: 1.0,
            use_direction_filter: false,
            direction_min_dot: DEFAULT_DIRECTION_MIN_DOT,
        }
    }

    /// Profile for the wrist-worn companion device.
    pub fn wrist() -> Self {
        Self {
            settling_factor: 0.8,
            validation_factor: 1.1,
            use_direction_filter: true,
            direction_min_dot: DEFAULT_DIRECTION_MIN_DOT,
        }
    }

    /// The profile a given sample source runs with.
    pub fn for_source(source: SampleSource) -> Self {
        match source {
            SampleSource::Local | SampleSource::Peripheral => Self::handheld(),
            SampleSource::Companion => Self::wrist(),
        }
    }
}

impl Default for ClassifierProfile {
    fn default() -> Self {
        Self::handheld()
    }
}

/// Externally visible classifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierPhase {
    /// No candidate segment.
    Idle,
    /// Tracking a candidate segment.
    Active,
    /// Waiting for the post-strike rebound to die down.
    Settling,
}

/// Candidate motion currently being tracked.
#[derive(Debug, Clone)]
struct MotionSegment {
    start_ms: u64,
    magnitudes: Vec<f64>,
    start_vector: Option<[f64; 3]>,
}

impl MotionSegment {
    fn peak(&self) -> f64 {
        self.magnitudes.iter().copied().fold(0.0, f64::max)
    }

    fn mean(&self) -> f64 {
        if self.magnitudes.is_empty() {
            return 0.0;
        }
        self.magnitudes.iter().sum::<f64>() / self.magnitudes.len() as f64
    }
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Active(MotionSegment),
    Settling,
}

/// Force estimate for a segment with the given mean magnitude and duration.
pub fn estimate_force(avg_magnitude: f64, duration_s: f64) -> f64 {
    avg_magnitude * duration_s * STANDARD_GRAVITY * FORCE_SCALE
}

/// Streaming strike classifier for a single sample source.
pub struct StrikeClassifier {
    config: ClassifierConfig,
    profile: ClassifierProfile,
    source: SampleSource,

    state: State,

    // Timing
    last_strike_ms: Option<u64>,
    last_sample_ms: Option<u64>,

    // Statistics
    total_strikes: u64,
    discarded_segments: u64,
}

impl StrikeClassifier {
    /// Create a classifier with an explicit profile.
    pub fn new(config: ClassifierConfig, profile: ClassifierProfile, source: SampleSource) -> Self {
        Self {
            config,
            profile,
            source,
            state: State::Idle,
            last_strike_ms: None,
            last_sample_ms: None,
            total_strikes: 0,
            discarded_segments: 0,
        }
    }

    /// Create a classifier with the profile its source's host uses.
    pub fn for_source(config: ClassifierConfig, source: SampleSource) -> Self {
        Self::new(config, ClassifierProfile::for_source(source), source)
    }

    /// Process one sample. Returns a strike when this sample validates one.
    pub fn process_sample(&mut self, sample: &Sample) -> Option<Strike> {
        if !sample.is_well_formed() {
            trace!(source = self.source.as_str(), "dropping malformed sample");
            return None;
        }

        let now_ms = sample.timestamp_ms;
        if let Some(last) = self.last_sample_ms {
            if now_ms < last {
                trace!(now_ms, last, "dropping out-of-order sample");
                return None;
            }
        }
        self.last_sample_ms = Some(now_ms);

        // One threshold snapshot per sample
        let config = self.config;

        if self.in_cooldown(now_ms, &config) {
            return None;
        }

        let magnitude = sample.magnitude();
        let settling_threshold = config.acceleration_threshold * self.profile.settling_factor;

        match &mut self.state {
            State::Idle => {
                if magnitude >= settling_threshold {
                    let mut magnitudes = Vec::with_capacity(32);
                    magnitudes.push(magnitude);
                    self.state = State::Active(MotionSegment {
                        start_ms: now_ms,
                        magnitudes,
                        start_vector: sample.unit_vector(),
                    });
                    trace!(now_ms, magnitude, "segment started");
                }
                None
            }
            State::Active(segment) => {
                segment.magnitudes.push(magnitude);
                self.evaluate_segment(sample, &config)
            }
            State::Settling => {
                if magnitude < settling_threshold {
                    self.state = State::Idle;
                }
                None
            }
        }
    }

    /// Process a batch of samples and return all strikes.
    pub fn process_batch(&mut self, samples: &[Sample]) -> Vec<Strike> {
        samples
            .iter()
            .filter_map(|sample| self.process_sample(sample))
            .collect()
    }

    /// Replace the threshold snapshot; effective from the next sample.
    pub fn update_config(&mut self, config: ClassifierConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Return to Idle and forget the last strike.
    pub fn stop(&mut self) {
        self.state = State::Idle;
        self.last_strike_ms = None;
        self.last_sample_ms = None;
    }

    pub fn phase(&self) -> ClassifierPhase {
        match self.state {
            State::Idle => ClassifierPhase::Idle,
            State::Active(_) => ClassifierPhase::Active,
            State::Settling => ClassifierPhase::Settling,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn profile(&self) -> &ClassifierProfile {
        &self.profile
    }

    pub fn source(&self) -> SampleSource {
        self.source
    }

    pub fn total_strikes(&self) -> u64 {
        self.total_strikes
    }

    /// Segments dropped by timeout, direction reversal, or zero force.
    pub fn discarded_segments(&self) -> u64 {
        self.discarded_segments
    }

    /// Number of magnitudes held by the open segment.
    pub fn segment_len(&self) -> usize {
        match &self.state {
            State::Active(segment) => segment.magnitudes.len(),
            _ => 0,
        }
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn in_cooldown(&self, now_ms: u64, config: &ClassifierConfig) -> bool {
        match self.last_strike_ms {
            Some(last) => now_ms.saturating_sub(last) < config.cooldown_ms(),
            None => false,
        }
    }

    fn evaluate_segment(&mut self, sample: &Sample, config: &ClassifierConfig) -> Option<Strike> {
        let State::Active(segment) = &self.state else {
            return None;
        };

        let now_ms = sample.timestamp_ms;
        let duration_ms = now_ms.saturating_sub(segment.start_ms);
        let peak = segment.peak();
        let timed_out = duration_ms >= config.idle_timeout_ms();

        if timed_out && peak < config.acceleration_threshold {
            debug!(duration_ms, peak, "segment expired below threshold");
            self.discard_segment();
            return None;
        }

        let validation_threshold = config.acceleration_threshold * self.profile.validation_factor;
        if duration_ms >= config.min_motion_duration_ms() && peak >= validation_threshold {
            if self.profile.use_direction_filter && !self.direction_consistent(segment, sample) {
                debug!(duration_ms, "segment rejected as direction reversal");
                self.discard_segment();
                return None;
            }

            let duration_s = duration_ms as f64 / 1000.0;
            let avg_magnitude = segment.mean();
            let force = estimate_force(avg_magnitude, duration_s);
            if force <= 0.0 || !force.is_finite() {
                self.discard_segment();
                return None;
            }

            let strike = Strike {
                estimated_force_n: force,
                timestamp_ms: now_ms,
                duration_s,
                avg_magnitude,
                peak_magnitude: peak,
                source: self.source,
            };
            debug!(
                source = self.source.as_str(),
                force,
                duration_s,
                peak,
                "strike detected"
            );

            self.last_strike_ms = Some(now_ms);
            self.total_strikes += 1;
            self.state = State::Settling;
            return Some(strike);
        }

        // Never validated within the idle timeout
        if timed_out {
            debug!(duration_ms, peak, "segment expired without validating");
            self.discard_segment();
        }
        None
    }

    fn direction_consistent(&self, segment: &MotionSegment, sample: &Sample) -> bool {
        match (segment.start_vector, sample.unit_vector()) {
            (Some(start), Some(current)) => {
                let dot = start[0] * current[0] + start[1] * current[1] + start[2] * current[2];
                dot >= self.profile.direction_min_dot
            }
            _ => true,
        }
    }

    fn discard_segment(&mut self) {
        self.discarded_segments += 1;
        self.state = State::Idle;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: u64, mag: f64) -> Sample {
        Sample::new(t, [mag, 0.0, 0.0])
    }

    fn handheld() -> StrikeClassifier {
        StrikeClassifier::for_source(ClassifierConfig::default(), SampleSource::Local)
    }

    /// Quiet, ramp to 2.0 g, drop back to 0.3 g.
    fn punch(start_ms: u64) -> Vec<Sample> {
        vec![
            sample(start_ms, 0.2),
            sample(start_ms + 50, 1.4),
            sample(start_ms + 100, 1.8),
            sample(start_ms + 150, 2.0),
            sample(start_ms + 200, 1.9),
            sample(start_ms + 250, 0.3),
            sample(start_ms + 400, 0.3),
        ]
    }

    #[test]
    fn test_profiles_differ_per_host() {
        let hand = ClassifierProfile::for_source(SampleSource::Local);
        let wrist = ClassifierProfile::for_source(SampleSource::Companion);
        assert_eq!(hand, ClassifierProfile::handheld());
        assert_eq!(ClassifierProfile::for_source(SampleSource::Peripheral), hand);
        assert_eq!(wrist.settling_factor, 0.8);
        assert_eq!(wrist.validation_factor, 1.1);
        assert!(wrist.use_direction_filter);
        assert!(!hand.use_direction_filter);
    }

    #[test]
    fn test_single_punch_emits_one_strike() {
        let mut classifier = handheld();
        let strikes = classifier.process_batch(&punch(0));

        assert_eq!(strikes.len(), 1);
        let strike = strikes[0];
        assert_eq!(strike.timestamp_ms, 200);
        assert!((strike.duration_s - 0.15).abs() < 1e-9);
        let expected_avg = (1.4 + 1.8 + 2.0 + 1.9) / 4.0;
        assert!((strike.avg_magnitude - expected_avg).abs() < 1e-9);
        assert_eq!(strike.peak_magnitude, 2.0);
        assert!(
            (strike.estimated_force_n - expected_avg * 0.15 * 9.81 * 3.0).abs() < 1e-9
        );
        assert_eq!(classifier.phase(), ClassifierPhase::Idle);
        assert_eq!(classifier.total_strikes(), 1);
    }

    #[test]
    fn test_force_formula() {
        assert!((estimate_force(2.0, 0.5) - 29.43).abs() < 1e-9);
        assert_eq!(estimate_force(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_settling_absorbs_rebound() {
        let config = ClassifierConfig {
            post_strike_cooldown_s: 0.0,
            ..Default::default()
        };
        let mut classifier = StrikeClassifier::for_source(config, SampleSource::Local);
        let mut samples = punch(0);
        samples.truncate(5);
        // Rebound stays above the settling threshold, then decays
        samples.push(sample(250, 1.6));
        samples.push(sample(300, 1.7));
        samples.push(sample(350, 1.5));
        samples.push(sample(400, 0.5));

        let strikes = classifier.process_batch(&samples);
        assert_eq!(strikes.len(), 1);
        assert_eq!(classifier.phase(), ClassifierPhase::Idle);
    }

    #[test]
    fn test_sub_threshold_segment_expires() {
        let mut classifier = handheld();
        // 1.4 g: above settling (1.35) but never reaches 1.5
        for i in 0..=20 {
            let strike = classifier.process_sample(&sample(i * 100, 1.4));
            assert!(strike.is_none());
        }
        assert_eq!(classifier.phase(), ClassifierPhase::Idle);
        assert_eq!(classifier.discarded_segments(), 1);
        assert_eq!(classifier.total_strikes(), 0);
    }

    #[test]
    fn test_cooldown_drops_second_strike() {
        let config = ClassifierConfig {
            post_strike_cooldown_s: 0.5,
            min_motion_duration_s: 0.05,
            ..Default::default()
        };
        let mut classifier = StrikeClassifier::for_source(config, SampleSource::Local);
        let samples = vec![
            sample(0, 1.6),
            sample(50, 2.0), // strike at 50
            sample(100, 0.2),
            sample(150, 1.6), // would start a segment, inside cooldown
            sample(200, 2.0),
            sample(250, 2.0),
        ];
        let strikes = classifier.process_batch(&samples);
        assert_eq!(strikes.len(), 1);
        assert_eq!(strikes[0].timestamp_ms, 50);
    }

    #[test]
    fn test_direction_reversal_rejected_on_wrist() {
        let mut classifier =
            StrikeClassifier::for_source(ClassifierConfig::default(), SampleSource::Companion);
        let samples = vec![
            Sample::new(0, [1.3, 0.0, 0.0]),
            Sample::new(50, [2.0, 0.0, 0.0]),
            Sample::new(100, [-2.0, 0.0, 0.0]),
            Sample::new(150, [-1.8, 0.0, 0.0]),
        ];
        let strikes = classifier.process_batch(&samples);
        assert!(strikes.is_empty());
        assert_eq!(classifier.phase(), ClassifierPhase::Idle);
        assert_eq!(classifier.discarded_segments(), 1);
    }

    #[test]
    fn test_direction_reversal_accepted_on_handheld() {
        let mut classifier = handheld();
        let samples = vec![
            Sample::new(0, [1.4, 0.0, 0.0]),
            Sample::new(50, [2.0, 0.0, 0.0]),
            Sample::new(100, [-2.0, 0.0, 0.0]),
            Sample::new(150, [-1.8, 0.0, 0.0]),
        ];
        assert_eq!(classifier.process_batch(&samples).len(), 1);
    }

    #[test]
    fn test_consistent_direction_accepted_on_wrist() {
        let mut classifier =
            StrikeClassifier::for_source(ClassifierConfig::default(), SampleSource::Companion);
        let samples = vec![
            Sample::new(0, [1.3, 0.1, 0.0]),
            Sample::new(50, [1.9, 0.2, 0.0]),
            Sample::new(100, [2.1, 0.1, 0.0]),
            Sample::new(150, [1.8, 0.0, 0.1]),
        ];
        let strikes = classifier.process_batch(&samples);
        assert_eq!(strikes.len(), 1);
        assert_eq!(strikes[0].source, SampleSource::Companion);
    }

    #[test]
    fn test_wrist_validation_threshold_is_higher() {
        let mut classifier =
            StrikeClassifier::for_source(ClassifierConfig::default(), SampleSource::Companion);
        // Peak 1.6 g clears 1.5 but not the wrist's 1.65 validation threshold
        let samples = vec![
            sample(0, 1.3),
            sample(50, 1.6),
            sample(100, 1.6),
            sample(150, 1.6),
            sample(200, 1.6),
        ];
        assert!(classifier.process_batch(&samples).is_empty());
        assert_eq!(classifier.phase(), ClassifierPhase::Active);
    }

    #[test]
    fn test_malformed_and_out_of_order_samples_dropped() {
        let mut classifier = handheld();
        assert!(classifier
            .process_sample(&Sample::new(0, [f64::NAN, 0.0, 0.0]))
            .is_none());
        assert_eq!(classifier.phase(), ClassifierPhase::Idle);

        classifier.process_sample(&sample(100, 1.6));
        assert_eq!(classifier.phase(), ClassifierPhase::Active);
        classifier.process_sample(&sample(50, 2.5));
        assert_eq!(classifier.segment_len(), 1);
    }

    #[test]
    fn test_config_update_applies_to_next_sample() {
        let mut classifier = handheld();
        classifier.process_sample(&sample(0, 1.4));
        assert_eq!(classifier.phase(), ClassifierPhase::Active);

        let raised = ClassifierConfig {
            acceleration_threshold: 3.0,
            ..Default::default()
        };
        classifier.update_config(raised).unwrap();
        // 2.0 no longer validates under the raised threshold
        let strikes = classifier.process_batch(&[sample(50, 2.0), sample(150, 2.0), sample(200, 2.0)]);
        assert!(strikes.is_empty());
        assert_eq!(classifier.config().acceleration_threshold, 3.0);
    }

    #[test]
    fn test_invalid_config_update_refused() {
        let mut classifier = handheld();
        let bad = ClassifierConfig {
            acceleration_threshold: -2.0,
            ..Default::default()
        };
        assert!(classifier.update_config(bad).is_err());
        assert_eq!(classifier.config().acceleration_threshold, 1.5);
    }

    #[test]
    fn test_stop_resets_state() {
        let mut classifier = handheld();
        classifier.process_batch(&punch(0)[..5]);
        assert_eq!(classifier.phase(), ClassifierPhase::Settling);

        classifier.stop();
        assert_eq!(classifier.phase(), ClassifierPhase::Idle);
        // Cooldown forgotten: an immediate new segment can start
        classifier.process_sample(&sample(210, 1.6));
        assert_eq!(classifier.phase(), ClassifierPhase::Active);
    }

    #[test]
    fn test_segment_length_bounded_by_idle_timeout() {
        let mut classifier =
            StrikeClassifier::for_source(ClassifierConfig::default(), SampleSource::Companion);
        let mut longest = 0;
        // Peak above threshold but below wrist validation: times out anyway
        for i in 0..100 {
            classifier.process_sample(&sample(i * 100, 1.6));
            longest = longest.max(classifier.segment_len());
        }
        assert!(longest <= 21, "segment grew to {}", longest);
        assert_eq!(classifier.total_strikes(), 0);
    }
}
