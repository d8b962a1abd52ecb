use crate::config::{MeterOptions, OutputSetting};
use crate::drivers::InstrumentError;
/// Current-measuring instrument (picoammeter / electrometer).
///
/// `read_current` is the only call allowed to block for long; it must give up
/// after the transport timeout rather than hang.
pub trait Ammeter {
    fn identify(&mut self) -> Result<String, InstrumentError>;
    fn configure(&mut self, options: &MeterOptions) -> Result<(), InstrumentError>;
    fn reset(&mut self) -> Result<(), InstrumentError>;
    fn read_current(&mut self) -> Result<f64, InstrumentError>;
    fn close(&mut self) -> Result<(), InstrumentError>;
}
/// Voltage source that biases the sample.
pub trait BiasSource {
    fn identify(&mut self) -> Result<String, InstrumentError>;
    fn reset(&mut self) -> Result<(), InstrumentError>;
    fn configure_output(&mut self, output: &OutputSetting) -> Result<(), InstrumentError>;
    fn enable_output(&mut self, on: bool) -> Result<(), InstrumentError>;
    fn close(&mut self) -> Result<(), InstrumentError>;
}
/// Owner of the bus that both instruments are reached through.
pub trait ResourceManager {
    fn list_resources(&mut self) -> Result<Vec<String>, InstrumentError>;
    fn open_meter(&mut self, address: u8) -> Result<Box<dyn Ammeter>, InstrumentError>;
    fn open_source(&mut self, address: u8) -> Result<Box<dyn BiasSource>, InstrumentError>;
    fn close(&mut self) -> Result<(), InstrumentError>;
}
