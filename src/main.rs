//! Strike Coach replay tool
//!
//! Replays a recorded accelerometer stream through the coach and prints every
//! notification as a JSON line, followed by the session summary.
//!
//! The session clock follows sample timestamps, so a recording replays with
//! the same timing it was captured with.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use strike_coach::{
    CoachNotification, RecordingListener, Sample, SampleSource, SessionMode, TrainingCoach,
    WorkoutPlan,
};

/// One clock tick per second of recorded time.
const TICK_MS: u64 = 1000;

#[derive(Parser)]
#[command(name = "strike-coach", version, about = "Replay accelerometer recordings through the strike coach")]
struct Cli {
    /// Workout plan (JSON with `rounds` and optional `config`).
    #[arg(long)]
    plan: PathBuf,

    /// Samples as `timestamp_ms,x,y,z` lines in g. Use `-` for stdin.
    #[arg(long)]
    samples: PathBuf,

    /// Which device recorded the samples: local, peripheral or companion.
    #[arg(long, default_value = "local")]
    source: String,

    /// Score as a challenge, overriding the plan's mode.
    #[arg(long)]
    challenge: bool,

    /// Keep the clock running this many seconds after the last sample.
    #[arg(long, default_value_t = 0)]
    tail_seconds: u32,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let source = SampleSource::parse(&cli.source)
        .ok_or_else(|| format!("unknown source {:?}", cli.source))?;

    let mut plan = WorkoutPlan::from_path(&cli.plan)?;
    if cli.challenge && !plan.config.mode.is_challenge() {
        plan.config.mode = SessionMode::Challenge {
            session_time_limit_s: None,
        };
    }
    info!(
        rounds = plan.rounds.len(),
        source = source.as_str(),
        challenge = plan.config.mode.is_challenge(),
        "replay starting"
    );

    let reader: Box<dyn BufRead> = if cli.samples.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&cli.samples)?))
    };

    let report_every = u64::from(plan.config.report_interval_s.max(1));
    let mut coach = TrainingCoach::new(plan.config, RecordingListener::new())?;
    coach.start_session(plan.rounds);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    flush_notifications(&mut coach, &mut out)?;

    let mut next_tick_ms: Option<u64> = None;
    let mut ticks: u64 = 0;
    let mut skipped = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let Some(sample) = parse_sample_line(&line) else {
            if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                debug!(line = line_no + 1, "skipping unparseable line");
                skipped += 1;
            }
            continue;
        };

        let due = next_tick_ms.get_or_insert(sample.timestamp_ms + TICK_MS);
        while sample.timestamp_ms >= *due && coach.orchestrator().is_active() {
            run_tick(&mut coach, &mut ticks, report_every);
            *due += TICK_MS;
        }

        coach.on_sample(source, &sample);
        flush_notifications(&mut coach, &mut out)?;

        if !coach.orchestrator().is_active() {
            break;
        }
    }

    for _ in 0..cli.tail_seconds {
        if !coach.orchestrator().is_active() {
            break;
        }
        run_tick(&mut coach, &mut ticks, report_every);
    }
    if coach.orchestrator().is_active() {
        info!("recording ended with the session still running; stopping it");
        coach.stop_session();
    }
    flush_notifications(&mut coach, &mut out)?;

    if skipped > 0 {
        warn!(skipped, "some sample lines could not be parsed");
    }
    writeln!(out, "{}", coach.summary().to_json_pretty())?;
    Ok(())
}

fn run_tick(coach: &mut TrainingCoach, ticks: &mut u64, report_every: u64) {
    coach.tick();
    *ticks += 1;
    if *ticks % report_every == 0 {
        coach.report_tick();
    }
}

fn flush_notifications(coach: &mut TrainingCoach, out: &mut impl Write) -> io::Result<()> {
    for notification in coach.listener_mut().drain() {
        // Count updates are noise in a replay log
        if matches!(notification, CoachNotification::StrikeCountChanged { .. }) {
            continue;
        }
        let line = serde_json::to_string(&notification)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Parse `timestamp_ms,x,y,z`.
fn parse_sample_line(line: &str) -> Option<Sample> {
    let mut fields = line.split(',').map(str::trim);
    let timestamp_ms = fields.next()?.parse::<u64>().ok()?;
    let x = fields.next()?.parse::<f64>().ok()?;
    let y = fields.next()?.parse::<f64>().ok()?;
    let z = fields.next()?.parse::<f64>().ok()?;
    Some(Sample::from_axes(x, y, z, timestamp_ms))
}
