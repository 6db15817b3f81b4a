//! Thread-safe host for a [`TrainingCoach`].
//!
//! Samples, clock ticks and report ticks may come from different threads. A
//! [`SharedCoach`] serializes them through one mutex so the coach keeps its
//! single-context guarantees. Timer effects emitted by the session are turned
//! into [`SessionClock`] threads that call back into the shared coach.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::coach::{CoachListener, SampleOutcome, TrainingCoach};
use crate::config::{ConfigError, Setting};
use crate::report::{ReportSnapshot, SessionSummary};
use crate::session::{SessionEffect, SessionPhase, TimerKind};
use crate::types::{RoundSpec, Sample, SampleSource};

/// Periodic callback thread, cancelled by dropping its channel.
pub struct SessionClock {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SessionClock {
    /// Run `on_tick` every `interval` until it returns false or the clock is cancelled.
    pub fn spawn<F>(name: &str, interval: Duration, mut on_tick: F) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !on_tick() {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop future ticks. Does not wait for the thread.
    pub fn cancel(&mut self) {
        self.stop_tx.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_tx.is_none()
    }

    /// Cancel and wait for the thread to exit. Must not be called from the tick callback.
    pub fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct CoachCell<L: CoachListener> {
    coach: TrainingCoach<L>,
    clock: Option<SessionClock>,
    report: Option<SessionClock>,
    // Bumped on every timer start so a stale tick blocked on the lock is ignored
    clock_generation: u64,
    report_generation: u64,
}

/// Cloneable handle to one coach shared between producer threads.
///
/// With a [`crate::coach::RecordingListener`] every notification is kept
/// until someone drains it, e.g. `shared.with_coach(|c| c.listener_mut().drain())`.
/// Long sessions must drain periodically.
pub struct SharedCoach<L: CoachListener + Send + 'static> {
    inner: Arc<Mutex<CoachCell<L>>>,
}

impl<L: CoachListener + Send + 'static> Clone for SharedCoach<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: CoachListener + Send + 'static> SharedCoach<L> {
    pub fn new(coach: TrainingCoach<L>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CoachCell {
                coach,
                clock: None,
                report: None,
                clock_generation: 0,
                report_generation: 0,
            })),
        }
    }

    /// Start a session and its timers.
    pub fn start_session(&self, rounds: Vec<RoundSpec>) -> Vec<SessionEffect> {
        self.run(|coach| coach.start_session(rounds))
    }

    pub fn stop_session(&self) -> Vec<SessionEffect> {
        self.run(|coach| coach.stop_session())
    }

    pub fn on_sample(&self, source: SampleSource, sample: &Sample) -> SampleOutcome {
        let weak = Arc::downgrade(&self.inner);
        let mut cell = self.inner.lock();
        let outcome = cell.coach.on_sample(source, sample);
        dispatch_timers(&mut cell, &outcome.effects, &weak);
        outcome
    }

    /// One clock tick, for hosts that drive the clock themselves.
    pub fn tick(&self) -> Vec<SessionEffect> {
        self.run(|coach| coach.tick())
    }

    pub fn report_tick(&self) -> Option<ReportSnapshot> {
        self.inner.lock().coach.report_tick()
    }

    pub fn apply_setting(&self, setting: Setting) -> Result<Vec<SessionEffect>, ConfigError> {
        let weak = Arc::downgrade(&self.inner);
        let mut cell = self.inner.lock();
        let effects = cell.coach.apply_setting(setting)?;
        dispatch_timers(&mut cell, &effects, &weak);
        Ok(effects)
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().coach.phase()
    }

    pub fn summary(&self) -> SessionSummary {
        self.inner.lock().coach.summary()
    }

    /// True while a session clock thread is scheduled.
    pub fn clock_running(&self) -> bool {
        self.inner.lock().clock.is_some()
    }

    /// Run `f` with exclusive access to the coach. Timer effects returned
    /// from inside `f` are not scheduled; use the dedicated methods for that.
    pub fn with_coach<R>(&self, f: impl FnOnce(&mut TrainingCoach<L>) -> R) -> R {
        f(&mut self.inner.lock().coach)
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn run(&self, f: impl FnOnce(&mut TrainingCoach<L>) -> Vec<SessionEffect>) -> Vec<SessionEffect> {
        let weak = Arc::downgrade(&self.inner);
        let mut cell = self.inner.lock();
        let effects = f(&mut cell.coach);
        dispatch_timers(&mut cell, &effects, &weak);
        effects
    }
}

impl<L: CoachListener + Send + 'static> Drop for SharedCoach<L> {
    fn drop(&mut self) {
        // Last handle gone: clocks only hold weak references, so cancel them here
        if Arc::strong_count(&self.inner) == 1 {
            let mut cell = self.inner.lock();
            cell.clock.take();
            cell.report.take();
        }
    }
}

fn dispatch_timers<L: CoachListener + Send + 'static>(
    cell: &mut CoachCell<L>,
    effects: &[SessionEffect],
    weak: &Weak<Mutex<CoachCell<L>>>,
) {
    for effect in effects {
        match effect {
            SessionEffect::StartTimer(TimerKind::Clock) => {
                cell.clock_generation += 1;
                let generation = cell.clock_generation;
                let interval = Duration::from_millis(cell.coach.config().clock_interval_ms);
                cell.clock = spawn_clock("session-clock", interval, weak.clone(), move |cell, weak| {
                    if cell.clock_generation != generation {
                        return false;
                    }
                    let effects = cell.coach.tick();
                    dispatch_timers(cell, &effects, weak);
                    cell.clock_generation == generation
                });
            }
            SessionEffect::StartTimer(TimerKind::Report) => {
                cell.report_generation += 1;
                let generation = cell.report_generation;
                let interval =
                    Duration::from_secs(u64::from(cell.coach.config().report_interval_s));
                cell.report = spawn_clock("session-report", interval, weak.clone(), move |cell, _| {
                    if cell.report_generation != generation {
                        return false;
                    }
                    cell.coach.report_tick();
                    true
                });
            }
            SessionEffect::CancelTimer(TimerKind::Clock) => {
                cell.clock_generation += 1;
                if let Some(mut clock) = cell.clock.take() {
                    clock.cancel();
                    debug!("session clock cancelled");
                }
            }
            SessionEffect::CancelTimer(TimerKind::Report) => {
                cell.report_generation += 1;
                if let Some(mut clock) = cell.report.take() {
                    clock.cancel();
                    debug!("report timer cancelled");
                }
            }
            _ => {}
        }
    }
}

fn spawn_clock<L, F>(
    name: &str,
    interval: Duration,
    weak: Weak<Mutex<CoachCell<L>>>,
    mut on_tick: F,
) -> Option<SessionClock>
where
    L: CoachListener + Send + 'static,
    F: FnMut(&mut CoachCell<L>, &Weak<Mutex<CoachCell<L>>>) -> bool + Send + 'static,
{
    let callback = move || {
        let Some(inner) = weak.upgrade() else {
            return false;
        };
        let mut cell = inner.lock();
        on_tick(&mut cell, &weak)
    };
    match SessionClock::spawn(name, interval, callback) {
        Ok(clock) => {
            debug!(name, ?interval, "timer started");
            Some(clock)
        }
        Err(e) => {
            warn!(name, error = %e, "failed to spawn timer thread");
            None
        }
    }
}
