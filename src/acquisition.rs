// src/acquisition.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::drivers::{Ammeter, BiasSource, InstrumentError, RawSeries, Sample};
use crate::types::{GeneratorState, LoopState, RunOutcome};

/// Stop request shared with the Ctrl+C handler. Polled once per tick.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Time source for the loop. Elapsed time must never go backwards.
pub trait Clock {
    fn elapsed(&self) -> Duration;
}

pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    pub fn start_now() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// What the loop hands back when it stops.
#[derive(Debug)]
pub struct AcquisitionReport {
    pub series: RawSeries,
    pub outcome: RunOutcome,
    pub generator: GeneratorState,
    pub failure: Option<InstrumentError>,
}

/// Tick-driven sampling state machine.
///
/// Each tick: observe cancellation, read the clock, switch the bias on once
/// the enable delay has passed, then block on one meter reading and append it.
pub struct AcquisitionLoop<'a> {
    config: &'a Config,
    state: LoopState,
    generator: GeneratorState,
    series: RawSeries,
}

impl<'a> AcquisitionLoop<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            state: LoopState::Idle,
            generator: GeneratorState::Disabled,
            series: RawSeries::new(),
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug!("acquisition {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs ticks until the duration has elapsed, `cancel` is raised, or an
    /// instrument call fails. The first tick always runs.
    pub fn run(
        mut self,
        meter: &mut dyn Ammeter,
        source: &mut dyn BiasSource,
        clock: &dyn Clock,
        cancel: &CancelToken,
    ) -> AcquisitionReport {
        self.transition(LoopState::Sampling);
        let (outcome, failure) = loop {
            if cancel.is_cancelled() {
                info!("stop requested after {} samples", self.series.len());
                break (RunOutcome::Interrupted, None);
            }
            let elapsed = clock.elapsed();
            match self.tick(elapsed, meter, source) {
                Ok(()) if elapsed > self.config.run_duration => {
                    info!("measurement finished");
                    break (RunOutcome::Completed, None);
                }
                Ok(()) => {}
                Err(err) => {
                    error!(
                        "measurement failed at t={:.1}s: {err}",
                        elapsed.as_secs_f64()
                    );
                    break (RunOutcome::Failed, Some(err));
                }
            }
        };
        self.transition(LoopState::Terminated);
        AcquisitionReport {
            series: self.series,
            outcome,
            generator: self.generator,
            failure,
        }
    }

    fn tick(
        &mut self,
        elapsed: Duration,
        meter: &mut dyn Ammeter,
        source: &mut dyn BiasSource,
    ) -> Result<(), InstrumentError> {
        if self.generator == GeneratorState::Disabled && elapsed >= self.config.enable_delay {
            source.enable_output(true)?;
            self.generator = GeneratorState::Enabled;
            info!("bias output enabled at +{:.1}s", elapsed.as_secs_f64());
        }
        let raw_current = meter.read_current()?;
        if let Some(previous) = self.series.last() {
            if elapsed.as_secs_f64() < previous.elapsed_s {
                warn!("clock went backwards between ticks");
            }
        }
        self.series.push(Sample {
            elapsed_s: elapsed.as_secs_f64(),
            raw_current,
        });
        info!(
            "[{:03}] +{:.1}s -> {:.3e} A",
            self.series.len(),
            elapsed.as_secs_f64(),
            raw_current
        );
        Ok(())
    }
}
