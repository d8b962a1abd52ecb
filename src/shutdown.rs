// src/shutdown.rs
use std::fmt;

use log::{info, warn};

use crate::drivers::{Ammeter, BiasSource, InstrumentError, ResourceManager};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ShutdownStep {
    BiasSource,
    Meter,
    ResourceManager,
}

impl fmt::Display for ShutdownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ShutdownStep::BiasSource => "bias source",
            ShutdownStep::Meter => "picoammeter",
            ShutdownStep::ResourceManager => "bus",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub enum StepStatus {
    Released,
    /// The handle was never opened.
    Skipped,
    Failed(InstrumentError),
}

#[derive(Debug)]
pub struct ShutdownReport {
    pub steps: Vec<(ShutdownStep, StepStatus)>,
}

impl ShutdownReport {
    pub fn all_released(&self) -> bool {
        self.steps
            .iter()
            .all(|(_, st)| matches!(st, StepStatus::Released))
    }
}

/// Sole owner of the instrument handles for the duration of a run.
///
/// Releases them in a fixed order exactly once: on the first call to
/// [`ShutdownCoordinator::shutdown`], or on drop if that never happened.
pub struct ShutdownCoordinator {
    resource_manager: Option<Box<dyn ResourceManager>>,
    meter: Option<Box<dyn Ammeter>>,
    source: Option<Box<dyn BiasSource>>,
    finished: bool,
}

impl ShutdownCoordinator {
    pub fn new(resource_manager: Box<dyn ResourceManager>) -> Self {
        Self {
            resource_manager: Some(resource_manager),
            meter: None,
            source: None,
            finished: false,
        }
    }

    pub fn resource_manager(&mut self) -> Option<&mut (dyn ResourceManager + 'static)> {
        self.resource_manager.as_deref_mut()
    }

    pub fn adopt_meter(&mut self, meter: Box<dyn Ammeter>) {
        self.meter = Some(meter);
    }

    pub fn adopt_source(&mut self, source: Box<dyn BiasSource>) {
        self.source = Some(source);
    }

    /// Both instruments, when both are open.
    pub fn instruments(
        &mut self,
    ) -> Option<(&mut (dyn Ammeter + 'static), &mut (dyn BiasSource + 'static))> {
        match (self.meter.as_deref_mut(), self.source.as_deref_mut()) {
            (Some(meter), Some(source)) => Some((meter, source)),
            _ => None,
        }
    }

    /// Runs the release sequence. Returns `None` if it already ran.
    pub fn shutdown(&mut self) -> Option<ShutdownReport> {
        if self.finished {
            return None;
        }
        self.finished = true;

        let source = self.source.take().map(|mut source| {
            info!("stopping bias source");
            let reset = source.reset();
            let off = source.enable_output(false);
            let close = source.close();
            reset.and(off).and(close)
        });
        let meter = self.meter.take().map(|mut meter| {
            info!("stopping picoammeter");
            let reset = meter.reset();
            let close = meter.close();
            reset.and(close)
        });
        let bus = self.resource_manager.take().map(|mut rm| {
            info!("closing instrument bus");
            rm.close()
        });

        let steps = [
            (ShutdownStep::BiasSource, source),
            (ShutdownStep::Meter, meter),
            (ShutdownStep::ResourceManager, bus),
        ]
        .into_iter()
        .map(|(step, result)| {
            let status = match result {
                None => StepStatus::Skipped,
                Some(Ok(())) => StepStatus::Released,
                Some(Err(err)) => {
                    warn!("error while stopping the {step}: {err}");
                    StepStatus::Failed(err)
                }
            };
            (step, status)
        })
        .collect();
        Some(ShutdownReport { steps })
    }
}

impl Drop for ShutdownCoordinator {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.shutdown();
        }
    }
}
