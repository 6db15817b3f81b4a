/// Basic usage example: feed accelerometer samples, get strikes and round feedback
use strike_coach::{
    CoachListener, CoachConfig, GoalKind, RoundSpec, Sample, SampleSource, Strike, TrainingCoach,
};

/// Announces everything to stdout.
struct Announcer;

impl CoachListener for Announcer {
    fn on_strike(&mut self, strike: &Strike) {
        println!(
            "  strike at {}ms: {:.1} N (peak {:.2} g over {:.2} s)",
            strike.timestamp_ms, strike.estimated_force_n, strike.peak_magnitude, strike.duration_s
        );
    }

    fn on_round_started(&mut self, round: &RoundSpec, index: usize) {
        println!("\n--- Round {}: {} ---", index + 1, round.name);
        println!("  goal: {}", round.goal_description());
    }

    fn on_round_ended(&mut self, round: &RoundSpec, _index: usize) {
        println!("  round {} done", round.name);
    }

    fn on_rest_started(&mut self, seconds: u32) {
        println!("  rest for {} s", seconds);
    }

    fn on_session_complete(&mut self) {
        println!("\nSession complete!");
    }
}

fn main() {
    println!("=== Strike Coach: Basic Example ===");

    let mut coach = match TrainingCoach::new(CoachConfig::default(), Announcer) {
        Ok(coach) => coach,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return;
        }
    };

    coach.start_session(vec![
        RoundSpec::new("Jabs", GoalKind::Reps, 3.0).with_rest(2),
        RoundSpec::new("Power", GoalKind::Force, 15.0),
    ]);

    // One punch: quiet, ramp up, peak, quiet again (magnitudes in g)
    let punch = [(0, 0.2), (50, 1.4), (100, 1.8), (150, 2.2), (200, 2.0), (500, 0.1)];

    let mut t = 1_000;
    for _ in 0..3 {
        for (offset, g) in punch {
            coach.on_sample(SampleSource::Local, &Sample::new(t + offset, [g, 0.2, 0.1]));
        }
        t += 1_000;
    }

    // Sit out the rest period
    for _ in 0..2 {
        coach.tick();
    }

    while coach.orchestrator().is_active() && t < 60_000 {
        for (offset, g) in punch {
            coach.on_sample(SampleSource::Local, &Sample::new(t + offset, [g, 0.2, 0.1]));
        }
        t += 1_000;
    }

    let summary = coach.summary();
    println!("\n=== Summary ===");
    println!("Rounds completed: {}/{}", summary.rounds_completed, summary.rounds_total);
    println!("Total strikes: {}", summary.total_strikes);
    println!("Total force: {:.1} N (max {:.1} N)", summary.total_force, summary.max_force);
}
