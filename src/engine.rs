// src/engine.rs
use anyhow::{Context, Result};
use log::{info, warn};

use crate::acquisition::{AcquisitionLoop, CancelToken, MonotonicClock};
use crate::config::Config;
use crate::drivers::pipeline::process;
use crate::drivers::{InstrumentError, RawSeries, ResourceManager};
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::sink::{ResultSink, SinkReport};
use crate::types::{GeneratorState, RunOutcome};

/// What a session produced once the instruments were released and the data saved.
#[derive(Debug)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub samples: usize,
    /// The instrument error that ended a failed run.
    pub failure: Option<InstrumentError>,
    pub shutdown: Option<ShutdownReport>,
    pub sink: SinkReport,
}

/// Opens both instruments and brings them to a known state.
///
/// Handles are adopted by `coordinator` as soon as they are opened, so a
/// failure half-way still releases whatever was reached.
fn setup(coordinator: &mut ShutdownCoordinator, config: &Config) -> Result<()> {
    let rm = coordinator
        .resource_manager()
        .context("instrument bus already released")?;
    match rm.list_resources() {
        Ok(resources) => info!("available resources: {resources:?}"),
        Err(err) => warn!("could not list resources: {err}"),
    }
    let meter = rm
        .open_meter(config.bus.meter_address)
        .with_context(|| format!("opening picoammeter at address {}", config.bus.meter_address))?;
    coordinator.adopt_meter(meter);
    let rm = coordinator
        .resource_manager()
        .context("instrument bus already released")?;
    let source = rm
        .open_source(config.bus.source_address)
        .with_context(|| format!("opening bias source at address {}", config.bus.source_address))?;
    coordinator.adopt_source(source);

    let (meter, source) = coordinator
        .instruments()
        .context("instruments not available after opening")?;
    let idn = meter.identify().context("identifying picoammeter")?;
    info!("connected to: {}", idn.trim());
    let idn = source.identify().context("identifying bias source")?;
    info!("connected to: {}", idn.trim());

    meter.reset().context("resetting picoammeter")?;
    meter
        .configure(&config.meter)
        .context("configuring picoammeter")?;

    source.reset().context("resetting bias source")?;
    source
        .enable_output(false)
        .context("disabling bias output")?;
    for output in &config.source_outputs {
        source
            .configure_output(output)
            .with_context(|| format!("configuring rail {}", output.rail))?;
    }
    Ok(())
}

/// Runs one complete measurement: setup, acquisition, shutdown, processing, save.
///
/// Errors only when setup fails; in that case nothing is saved. Every later
/// exit path ends with the instruments released and a save attempt.
pub fn run_session(
    config: &Config,
    bus: Box<dyn ResourceManager>,
    cancel: &CancelToken,
    sink: &ResultSink,
) -> Result<RunSummary> {
    let mut coordinator = ShutdownCoordinator::new(bus);
    if let Err(err) = setup(&mut coordinator, config) {
        coordinator.shutdown();
        return Err(err.context("failed to open communication with the instruments"));
    }

    info!(
        "sample: thickness {:.3e} m, electrode {:.3e} m, gap {:.3e} m, effective area {:.3e} m^2",
        config.sample_thickness,
        config.electrode_diameter,
        config.guard_gap,
        config.effective_area
    );
    info!(
        "starting measurements for {:.1} minutes",
        config.run_duration.as_secs_f64() / 60.0
    );
    info!("press Ctrl+C to stop and save the data");
    let report = match coordinator.instruments() {
        Some((meter, source)) => {
            let clock = MonotonicClock::start_now();
            Some(AcquisitionLoop::new(config).run(meter, source, &clock, cancel))
        }
        None => None,
    };
    let shutdown = coordinator.shutdown();

    let (series, outcome, failure) = match report {
        Some(report) => {
            if report.generator == GeneratorState::Disabled {
                warn!("bias output was never switched on; the run ended before the enable delay");
            }
            (report.series, report.outcome, report.failure)
        }
        None => (RawSeries::new(), RunOutcome::Failed, None),
    };
    if series.is_empty() {
        warn!("no sample was recorded");
    }
    let samples = series.len();
    let result = process(&series, config, outcome);
    let sink = sink.persist(&result);
    info!(
        "run {outcome} with {samples} points over {:.1} s",
        series.duration_seconds()
    );
    Ok(RunSummary {
        outcome,
        samples,
        failure,
        shutdown,
        sink,
    })
}
