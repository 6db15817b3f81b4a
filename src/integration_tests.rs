/// Integration tests for the complete strike coaching flow.
/// Drives realistic sample streams and clock ticks through the coach and
/// checks the notifications a host would announce.

#[cfg(test)]
mod integration_tests {
    use crate::classifier::{estimate_force, ClassifierPhase};
    use crate::coach::{CoachNotification, RecordingListener, TrainingCoach};
    use crate::config::{CoachConfig, SessionMode, WorkoutPlan};
    use crate::session::{SessionEffect, SessionOutcome, SessionPhase};
    use crate::types::*;

    /// Helper: samples along +x at the given offsets (ms) and magnitudes (g)
    fn stream(start_ms: u64, points: &[(u64, f64)]) -> Vec<Sample> {
        points
            .iter()
            .map(|(offset, g)| Sample::new(start_ms + offset, [*g, 0.0, 0.0]))
            .collect()
    }

    /// Helper: one punch validated 150ms after onset, followed by a quiet sample
    fn punch(start_ms: u64) -> Vec<Sample> {
        stream(
            start_ms,
            &[(0, 0.2), (50, 1.4), (100, 1.8), (150, 2.0), (200, 1.9), (500, 0.2)],
        )
    }

    /// Helper: feed samples and collect every effect they caused
    fn feed(
        coach: &mut TrainingCoach,
        source: SampleSource,
        samples: &[Sample],
    ) -> (Vec<Strike>, Vec<SessionEffect>) {
        let mut strikes = Vec::new();
        let mut effects = Vec::new();
        for sample in samples {
            let outcome = coach.on_sample(source, sample);
            strikes.extend(outcome.strike);
            effects.extend(outcome.effects);
        }
        (strikes, effects)
    }

    fn ticks(coach: &mut TrainingCoach, n: usize) -> Vec<SessionEffect> {
        (0..n).flat_map(|_| coach.tick()).collect()
    }

    fn without_counts(notifications: Vec<CoachNotification>) -> Vec<CoachNotification> {
        notifications
            .into_iter()
            .filter(|n| !matches!(n, CoachNotification::StrikeCountChanged { .. }))
            .collect()
    }

    #[test]
    fn test_ramp_produces_single_strike() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![RoundSpec::new("Open", GoalKind::Reps, 50.0)]);

        // Ramp up to 2.0 g over 0.2 s, then drop to 0.3 g within 0.05 s
        let samples = stream(
            1_000,
            &[(0, 1.4), (100, 1.7), (200, 2.0), (250, 0.3), (500, 0.3)],
        );
        let (strikes, _) = feed(&mut coach, SampleSource::Local, &samples);

        assert_eq!(strikes.len(), 1, "Ramp must yield exactly one strike");
        let strike = strikes[0];
        assert!((strike.duration_s - 0.2).abs() < 1e-9);
        assert!((strike.avg_magnitude - 1.7).abs() < 1e-9);
        assert_eq!(strike.peak_magnitude, 2.0);
        assert_eq!(strike.timestamp_ms, 1_200);
        assert!((strike.estimated_force_n - estimate_force(1.7, 0.2)).abs() < 1e-9);
        assert_eq!(
            coach.classifier(SampleSource::Local).unwrap().phase(),
            ClassifierPhase::Idle
        );
    }

    #[test]
    fn test_timed_round_rest_then_next_round() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![
            RoundSpec::new("Shadow", GoalKind::Time, 60.0).with_rest(10),
            RoundSpec::new("Finisher", GoalKind::Reps, 20.0),
        ]);
        coach.listener_mut().drain();

        ticks(&mut coach, 60);
        let notes = without_counts(coach.listener_mut().drain());
        assert_eq!(
            notes,
            vec![
                CoachNotification::RoundEnded {
                    index: 0,
                    name: "Shadow".to_string()
                },
                CoachNotification::RestStarted { seconds: 10 },
            ]
        );

        ticks(&mut coach, 9);
        assert!(coach.listener().notifications().is_empty());
        ticks(&mut coach, 1);
        let notes = coach.listener_mut().drain();
        assert!(matches!(
            notes.as_slice(),
            [CoachNotification::RoundStarted { index: 1, .. }]
        ));
        assert_eq!(coach.phase(), SessionPhase::RoundActive);
    }

    #[test]
    fn test_timed_last_round_completes_after_rest() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![RoundSpec::new("Only", GoalKind::Time, 60.0).with_rest(10)]);
        ticks(&mut coach, 70);

        assert_eq!(
            coach.listener().notifications().last(),
            Some(&CoachNotification::SessionComplete)
        );
        assert_eq!(coach.summary().outcome, Some(SessionOutcome::Completed));
    }

    #[test]
    fn test_cutoff_disqualifies_exactly_once() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![
            RoundSpec::new("Speed", GoalKind::Strikes, 100.0).with_cutoff(30)
        ]);
        feed(&mut coach, SampleSource::Local, &punch(0));

        ticks(&mut coach, 29);
        assert_eq!(coach.phase(), SessionPhase::RoundActive);
        let effects = ticks(&mut coach, 1);
        assert!(effects
            .iter()
            .any(|e| matches!(e, SessionEffect::Disqualified { index: 0, .. })));
        assert_eq!(coach.phase(), SessionPhase::Inactive);

        let state = coach.orchestrator().state().clone();
        assert!(ticks(&mut coach, 10).is_empty());
        assert_eq!(coach.orchestrator().state(), &state);
        assert_eq!(
            coach
                .listener()
                .count_where(|n| *n == CoachNotification::Disqualified),
            1
        );
        assert_eq!(coach.listener().terminal_count(), 1);

        // Samples after disqualification are ignored
        let (strikes, _) = feed(&mut coach, SampleSource::Local, &punch(10_000));
        assert!(strikes.is_empty());
        assert_eq!(coach.summary().total_strikes, 1);
    }

    #[test]
    fn test_strike_within_cooldown_dropped() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![RoundSpec::new("Combo", GoalKind::Reps, 10.0)]);

        let samples = stream(
            0,
            &[
                (0, 1.4),
                (50, 1.8),
                (100, 2.0),
                (150, 1.9),
                // Second punch entirely inside the 200ms cooldown
                (160, 0.2),
                (170, 1.4),
                (220, 1.8),
                (270, 2.4),
                (320, 2.2),
                (600, 0.2),
                (900, 0.2),
            ],
        );
        let (strikes, _) = feed(&mut coach, SampleSource::Local, &samples);

        assert_eq!(strikes.len(), 1);
        assert_eq!(strikes[0].timestamp_ms, 150);
        assert_eq!(strikes[0].peak_magnitude, 2.0, "Second punch must not merge");
        assert_eq!(coach.metrics().total_strikes(), 1);
        assert_eq!(
            coach.classifier(SampleSource::Local).unwrap().phase(),
            ClassifierPhase::Idle
        );
    }

    #[test]
    fn test_round_metrics_zero_right_after_round_end() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![
            RoundSpec::new("Power", GoalKind::Force, 20.0).with_rest(5),
            RoundSpec::new("Volume", GoalKind::Strikes, 3.0),
            RoundSpec::new("Reps", GoalKind::Reps, 2.0),
        ]);

        let mut start = 0;
        let mut guard = 0;
        let mut landed = 0;
        while coach.phase() != SessionPhase::Inactive && guard < 40 {
            let (strikes, effects) = feed(&mut coach, SampleSource::Local, &punch(start));
            landed += strikes.len() as u64;
            if effects
                .iter()
                .any(|e| matches!(e, SessionEffect::RoundEnded { .. }))
            {
                assert_eq!(coach.metrics().sum_force_in_current_round(), 0.0);
                assert_eq!(coach.metrics().strike_count_in_current_round(), 0);
            }
            if coach.phase() == SessionPhase::Resting {
                ticks(&mut coach, 5);
            }
            start += 1_000;
            guard += 1;
        }

        let summary = coach.summary();
        assert_eq!(summary.outcome, Some(SessionOutcome::Completed));
        assert_eq!(summary.rounds_completed, 3);
        assert_eq!(
            summary.total_strikes, landed,
            "Session totals survive round transitions"
        );
        assert!(summary.max_force >= summary.average_force);
        assert_eq!(coach.metrics().total_strikes(), 0);
    }

    #[test]
    fn test_terminal_notification_once_under_mixed_calls() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![RoundSpec::new("A", GoalKind::Reps, 1.0)]);
        feed(&mut coach, SampleSource::Local, &punch(0));
        coach.stop_session();
        coach.tick();
        feed(&mut coach, SampleSource::Local, &punch(1_000));
        coach.stop_session();

        assert_eq!(coach.listener().terminal_count(), 1);
        let notes = without_counts(coach.listener_mut().drain());
        assert_eq!(notes.last(), Some(&CoachNotification::SessionComplete));
    }

    #[test]
    fn test_stop_resets_metrics_but_keeps_summary() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![RoundSpec::new("Open", GoalKind::Reps, 10.0)]);
        let (strikes, _) = feed(&mut coach, SampleSource::Local, &punch(0));
        assert_eq!(strikes.len(), 1);

        coach.stop_session();
        assert_eq!(coach.metrics().total_strikes(), 0);
        assert_eq!(coach.metrics().total_force(), 0.0);
        assert_eq!(
            coach.listener().notifications().last(),
            Some(&CoachNotification::StrikeCountChanged { total: 0 })
        );

        let summary = coach.summary();
        assert_eq!(summary.outcome, Some(SessionOutcome::Stopped));
        assert_eq!(summary.total_strikes, 1);
        assert!((summary.total_force - strikes[0].estimated_force_n).abs() < 1e-9);
    }

    #[test]
    fn test_restart_announces_stop_then_new_round() {
        let mut coach = TrainingCoach::recording();
        coach.start_session(vec![RoundSpec::new("Old", GoalKind::Time, 60.0)]);
        feed(&mut coach, SampleSource::Local, &punch(0));
        coach.listener_mut().drain();

        coach.start_session(vec![RoundSpec::new("New", GoalKind::Reps, 5.0)]);
        let notes = without_counts(coach.listener_mut().drain());
        assert_eq!(notes[0], CoachNotification::SessionStopped);
        assert!(matches!(
            &notes[1],
            CoachNotification::RoundStarted { name, .. } if name == "New"
        ));
        assert_eq!(coach.metrics().total_strikes(), 0);
    }

    #[test]
    fn test_wrist_challenge_with_reports_and_time_limit() {
        let config = CoachConfig {
            mode: SessionMode::Challenge {
                session_time_limit_s: Some(20),
            },
            ..CoachConfig::default()
        };
        let mut coach = TrainingCoach::new(config, RecordingListener::new()).unwrap();
        coach.start_session(vec![
            RoundSpec::new("Blitz", GoalKind::Strikes, 2.0),
            RoundSpec::new("Endless", GoalKind::Strikes, 500.0),
        ]);

        feed(&mut coach, SampleSource::Companion, &punch(0));
        let first = coach.report_tick().unwrap();
        assert_eq!(first.round_number, 1);
        assert!((first.round_progress_fraction - 0.5).abs() < 1e-9);

        feed(&mut coach, SampleSource::Companion, &punch(1_000));
        let second = coach.report_tick().unwrap();
        assert_eq!(second.round_name, "Endless");
        assert_eq!(second.total_strikes, 2);

        let effects = ticks(&mut coach, 20);
        assert!(effects.iter().any(|e| matches!(e, SessionEffect::Disqualified { index: 1, .. })));
        assert!(coach.report_tick().is_none());
    }

    #[test]
    fn test_workout_plan_drives_coach() {
        let plan = WorkoutPlan::from_json_str(
            r#"{
                "config": {"classifier": {"acceleration_threshold": 1.5}},
                "rounds": [
                    {"name": "Jabs", "goal_kind": "reps", "goal_value": 2, "rest_time_seconds": 3},
                    {"name": "Hold", "goal_kind": "time", "goal_value": 5}
                ]
            }"#,
        )
        .unwrap();
        let mut coach = TrainingCoach::new(plan.config, RecordingListener::new()).unwrap();
        coach.start_session(plan.rounds);

        feed(&mut coach, SampleSource::Peripheral, &punch(0));
        feed(&mut coach, SampleSource::Peripheral, &punch(1_000));
        assert_eq!(coach.phase(), SessionPhase::Resting);
        ticks(&mut coach, 3 + 5);

        let summary = coach.summary();
        assert_eq!(summary.outcome, Some(SessionOutcome::Completed));
        assert_eq!(summary.rounds_completed, 2);
        assert_eq!(summary.active_elapsed_s, 5);
    }
}
