//! Scripted instruments for deterministic tests.
//!
//! Every call is appended to a shared [`CallLog`] as `"<device>.<operation>"`,
//! so tests can assert both what ran and in which order.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::acquisition::CancelToken;
use crate::config::{MeterOptions, OutputSetting};
use crate::drivers::source::{Ammeter, BiasSource, ResourceManager};
use crate::drivers::InstrumentError;

pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}
pub fn count(log: &CallLog, entry: &str) -> usize {
    log.borrow().iter().filter(|e| e.as_str() == entry).count()
}
fn scripted_failure(entry: &str) -> InstrumentError {
    InstrumentError::Rejected(format!("{entry} scripted failure"))
}
fn record(log: &CallLog, failing: &[&'static str], entry: String) -> Result<(), InstrumentError> {
    let fails = failing.iter().any(|f| *f == entry);
    log.borrow_mut().push(entry.clone());
    if fails {
        Err(scripted_failure(&entry))
    } else {
        Ok(())
    }
}

pub struct ScriptedMeter {
    log: CallLog,
    readings: VecDeque<Result<f64, InstrumentError>>,
    fallback: f64,
    failing: Vec<&'static str>,
    cancel_after: Option<(usize, CancelToken)>,
    reads: usize,
}
impl ScriptedMeter {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: Rc::clone(log),
            readings: VecDeque::new(),
            fallback: 1.0e-12,
            failing: Vec::new(),
            cancel_after: None,
            reads: 0,
        }
    }
    /// Readings returned in order; once exhausted the meter keeps returning the fallback.
    pub fn with_readings(mut self, readings: impl IntoIterator<Item = f64>) -> Self {
        self.readings.extend(readings.into_iter().map(Ok));
        self
    }
    pub fn then_fail(mut self) -> Self {
        self.readings.push_back(Err(InstrumentError::Timeout {
            command: "READ?".into(),
            timeout_ms: 5_000,
        }));
        self
    }
    pub fn failing(mut self, entry: &'static str) -> Self {
        self.failing.push(entry);
        self
    }
    /// Raises `token` right after the `n`-th successful read.
    pub fn cancel_after(mut self, n: usize, token: &CancelToken) -> Self {
        self.cancel_after = Some((n, token.clone()));
        self
    }
}
impl Ammeter for ScriptedMeter {
    fn identify(&mut self) -> Result<String, InstrumentError> {
        record(&self.log, &self.failing, "meter.identify".into())?;
        Ok("SCRIPTED,METER".into())
    }
    fn configure(&mut self, _options: &MeterOptions) -> Result<(), InstrumentError> {
        record(&self.log, &self.failing, "meter.configure".into())
    }
    fn reset(&mut self) -> Result<(), InstrumentError> {
        record(&self.log, &self.failing, "meter.reset".into())
    }
    fn read_current(&mut self) -> Result<f64, InstrumentError> {
        record(&self.log, &self.failing, "meter.read".into())?;
        let value = self.readings.pop_front().unwrap_or(Ok(self.fallback))?;
        self.reads += 1;
        if let Some((n, token)) = &self.cancel_after {
            if self.reads == *n {
                token.cancel();
            }
        }
        Ok(value)
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        record(&self.log, &self.failing, "meter.close".into())
    }
}

pub struct ScriptedSource {
    log: CallLog,
    failing: Vec<&'static str>,
}
impl ScriptedSource {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: Rc::clone(log),
            failing: Vec::new(),
        }
    }
    pub fn failing(mut self, entry: &'static str) -> Self {
        self.failing.push(entry);
        self
    }
}
impl BiasSource for ScriptedSource {
    fn identify(&mut self) -> Result<String, InstrumentError> {
        record(&self.log, &self.failing, "source.identify".into())?;
        Ok("SCRIPTED,SOURCE".into())
    }
    fn reset(&mut self) -> Result<(), InstrumentError> {
        record(&self.log, &self.failing, "source.reset".into())
    }
    fn configure_output(&mut self, output: &OutputSetting) -> Result<(), InstrumentError> {
        record(
            &self.log,
            &self.failing,
            format!("source.apply {}", output.rail),
        )
    }
    fn enable_output(&mut self, on: bool) -> Result<(), InstrumentError> {
        let entry = if on { "source.output_on" } else { "source.output_off" };
        record(&self.log, &self.failing, entry.into())
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        record(&self.log, &self.failing, "source.close".into())
    }
}

pub struct ScriptedBus {
    log: CallLog,
    meter: Option<ScriptedMeter>,
    source: Option<ScriptedSource>,
    failing: Vec<&'static str>,
}
impl ScriptedBus {
    pub fn new(log: &CallLog, meter: ScriptedMeter, source: ScriptedSource) -> Self {
        Self {
            log: Rc::clone(log),
            meter: Some(meter),
            source: Some(source),
            failing: Vec::new(),
        }
    }
    pub fn failing(mut self, entry: &'static str) -> Self {
        self.failing.push(entry);
        self
    }
}
impl ResourceManager for ScriptedBus {
    fn list_resources(&mut self) -> Result<Vec<String>, InstrumentError> {
        record(&self.log, &self.failing, "bus.list".into())?;
        Ok(vec!["SCRIPTED::14".into(), "SCRIPTED::5".into()])
    }
    fn open_meter(&mut self, _address: u8) -> Result<Box<dyn Ammeter>, InstrumentError> {
        record(&self.log, &self.failing, "bus.open_meter".into())?;
        let meter = self.meter.take().ok_or(InstrumentError::Closed)?;
        Ok(Box::new(meter))
    }
    fn open_source(&mut self, _address: u8) -> Result<Box<dyn BiasSource>, InstrumentError> {
        record(&self.log, &self.failing, "bus.open_source".into())?;
        let source = self.source.take().ok_or(InstrumentError::Closed)?;
        Ok(Box::new(source))
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        record(&self.log, &self.failing, "bus.close".into())
    }
}
