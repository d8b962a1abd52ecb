//! Software stand-in for the meter and the bias source, for dry runs without hardware.
//!
//! Once the output is on, the simulated current decays from a polarization
//! peak towards the steady leakage `V / R`. The meter reports it with a
//! negative sign, like a meter wired to the low side of the sample.
use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;

use crate::config::{MeterOptions, OutputSetting};
use crate::drivers::source::{Ammeter, BiasSource, ResourceManager};
use crate::drivers::InstrumentError;

/// Parameters of the simulated sample.
#[derive(Clone, Copy, Debug)]
pub struct SimulatedSample {
    pub resistance_ohms: f64,
    /// Peak of the absorption current relative to the steady leakage.
    pub absorption_ratio: f64,
    pub absorption_tau_s: f64,
    /// Peak-to-peak noise added to every reading, in amperes.
    pub noise_amps: f64,
    /// Wall time spent per reading at NPLC 1.
    pub read_time: Duration,
}
impl Default for SimulatedSample {
    fn default() -> Self {
        Self {
            resistance_ohms: 5.0e13,
            absorption_ratio: 4.0,
            absorption_tau_s: 30.0,
            noise_amps: 2.0e-15,
            read_time: Duration::from_millis(100),
        }
    }
}
#[derive(Default)]
struct BenchState {
    applied_volts: Cell<f64>,
    output_since: Cell<Option<Instant>>,
}
/// Resource manager handing out a linked meter and source.
pub struct SimulatedBus {
    sample: SimulatedSample,
    state: Rc<BenchState>,
}
impl SimulatedBus {
    pub fn new(sample: SimulatedSample) -> Self {
        Self {
            sample,
            state: Rc::new(BenchState::default()),
        }
    }
}
impl ResourceManager for SimulatedBus {
    fn list_resources(&mut self) -> Result<Vec<String>, InstrumentError> {
        Ok(vec!["SIM::METER".into(), "SIM::SOURCE".into()])
    }
    fn open_meter(&mut self, address: u8) -> Result<Box<dyn Ammeter>, InstrumentError> {
        debug!("simulated meter at address {address}");
        Ok(Box::new(SimulatedAmmeter {
            sample: self.sample,
            state: Rc::clone(&self.state),
            read_time: self.sample.read_time,
        }))
    }
    fn open_source(&mut self, address: u8) -> Result<Box<dyn BiasSource>, InstrumentError> {
        debug!("simulated source at address {address}");
        Ok(Box::new(SimulatedSource {
            state: Rc::clone(&self.state),
            pending_volts: 0.0,
        }))
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        Ok(())
    }
}
struct SimulatedAmmeter {
    sample: SimulatedSample,
    state: Rc<BenchState>,
    read_time: Duration,
}
impl SimulatedAmmeter {
    fn leakage_at(&self, now: Instant) -> f64 {
        let Some(since) = self.state.output_since.get() else {
            return 0.0;
        };
        let t = now.duration_since(since).as_secs_f64();
        let steady = self.state.applied_volts.get() / self.sample.resistance_ohms;
        steady * (1.0 + self.sample.absorption_ratio * (-t / self.sample.absorption_tau_s).exp())
    }
}
impl Ammeter for SimulatedAmmeter {
    fn identify(&mut self) -> Result<String, InstrumentError> {
        Ok("SIMULATED,PICOAMMETER,0,1.0".into())
    }
    fn configure(&mut self, options: &MeterOptions) -> Result<(), InstrumentError> {
        self.read_time = self.sample.read_time.mul_f64(options.nplc);
        Ok(())
    }
    fn reset(&mut self) -> Result<(), InstrumentError> {
        self.read_time = self.sample.read_time;
        Ok(())
    }
    fn read_current(&mut self) -> Result<f64, InstrumentError> {
        thread::sleep(self.read_time);
        let noise = rand::thread_rng().gen_range(-0.5..0.5) * self.sample.noise_amps;
        Ok(-(self.leakage_at(Instant::now()) + noise))
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        Ok(())
    }
}
struct SimulatedSource {
    state: Rc<BenchState>,
    pending_volts: f64,
}
impl BiasSource for SimulatedSource {
    fn identify(&mut self) -> Result<String, InstrumentError> {
        Ok("SIMULATED,TRIPLE SUPPLY,0,1.0".into())
    }
    fn reset(&mut self) -> Result<(), InstrumentError> {
        self.pending_volts = 0.0;
        self.state.applied_volts.set(0.0);
        self.state.output_since.set(None);
        Ok(())
    }
    fn configure_output(&mut self, output: &OutputSetting) -> Result<(), InstrumentError> {
        // Rails are floating; the sample sees the spread between them.
        self.pending_volts += output.voltage.abs();
        Ok(())
    }
    fn enable_output(&mut self, on: bool) -> Result<(), InstrumentError> {
        if on {
            self.state.applied_volts.set(self.pending_volts);
            if self.state.output_since.get().is_none() {
                self.state.output_since.set(Some(Instant::now()));
            }
        } else {
            self.state.applied_volts.set(0.0);
            self.state.output_since.set(None);
        }
        Ok(())
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        self.enable_output(false)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn quick_sample() -> SimulatedSample {
        SimulatedSample {
            noise_amps: 0.0,
            read_time: Duration::from_millis(1),
            ..SimulatedSample::default()
        }
    }
    #[test]
    fn current_is_zero_until_output_enabled() {
        let mut bus = SimulatedBus::new(quick_sample());
        let mut meter = bus.open_meter(14).unwrap();
        let mut source = bus.open_source(5).unwrap();
        source.configure_output(&OutputSetting::new("P25V", 25.0, 1.0)).unwrap();
        source.configure_output(&OutputSetting::new("N25V", -17.0, 1.0)).unwrap();
        assert_eq!(meter.read_current().unwrap(), 0.0);
        source.enable_output(true).unwrap();
        let reading = meter.read_current().unwrap();
        let steady = 42.0 / 5.0e13;
        assert!(reading < -steady, "reading {reading} should exceed steady leakage");
        source.enable_output(false).unwrap();
        assert_eq!(meter.read_current().unwrap(), 0.0);
    }
}
