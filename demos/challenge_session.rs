/// Challenge example: a wrist-worn companion streams samples from its own
/// thread while the shared coach runs the session clock in the background.
use std::thread;
use std::time::Duration;

use strike_coach::{
    CoachConfig, GoalKind, RecordingListener, RoundSpec, Sample, SampleSource, SessionMode,
    SessionPhase, SharedCoach, TrainingCoach,
};

fn main() {
    println!("=== Strike Coach: Challenge Example ===\n");

    // Ten times faster than real time so the demo finishes quickly
    let config = CoachConfig {
        mode: SessionMode::Challenge {
            session_time_limit_s: Some(30),
        },
        clock_interval_ms: 100,
        ..CoachConfig::default()
    };
    let coach = match TrainingCoach::new(config, RecordingListener::new()) {
        Ok(coach) => SharedCoach::new(coach),
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return;
        }
    };

    coach.start_session(vec![
        RoundSpec::new("Blitz", GoalKind::Strikes, 5.0).with_cutoff(20),
        RoundSpec::new("Power", GoalKind::Force, 40.0),
    ]);

    let producer = {
        let coach = coach.clone();
        thread::spawn(move || {
            let punch = [(0, 0.2), (50, 1.5), (100, 2.0), (150, 2.4), (200, 2.1), (500, 0.1)];
            let mut t = 0;
            while coach.phase() != SessionPhase::Inactive && t < 60_000 {
                for (offset, g) in punch {
                    coach.on_sample(SampleSource::Companion, &Sample::new(t + offset, [0.1, g, 0.1]));
                }
                t += 800;
                thread::sleep(Duration::from_millis(40));
            }
        })
    };

    while coach.phase() != SessionPhase::Inactive {
        if let Some(report) = coach.report_tick() {
            println!(
                "report: round {} ({}) {:.0}% | {} strikes, {:.1} N",
                report.round_number,
                report.round_name,
                report.round_progress_fraction * 100.0,
                report.total_strikes,
                report.total_force
            );
        }
        thread::sleep(Duration::from_millis(250));
    }
    if producer.join().is_err() {
        eprintln!("sample producer panicked");
    }

    let notifications = coach.with_coach(|c| c.listener_mut().drain());
    println!("\n--- Notifications ---");
    for notification in notifications {
        if let Ok(line) = serde_json::to_string(&notification) {
            println!("{}", line);
        }
    }

    println!("\n=== Summary ===");
    println!("{}", coach.summary().to_json_pretty());
}
