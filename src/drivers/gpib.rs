//! GPIB instruments reached through a Prologix-style GPIB-USB controller.
//!
//! The controller shows up as a serial port. Lines starting with `++` are
//! controller commands; everything else is forwarded to the instrument at the
//! currently selected address. With `++auto 0` the controller only reads back
//! from the instrument when told to with `++read eoi`.
//!
//! Both instruments share one controller, so they hold it through
//! `Rc<RefCell<_>>`. Every call is made from the acquisition thread.
use std::cell::RefCell;
use std::io::{ErrorKind, Read, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, trace};
use serialport::SerialPort;

use crate::config::{BusConfig, MeterOptions, OutputSetting};
use crate::drivers::scpi;
use crate::drivers::source::{Ammeter, BiasSource, ResourceManager};
use crate::drivers::InstrumentError;

const ESC: u8 = 0x1B;
const CONTROLLER_SETUP: [&str; 4] = ["++mode 1", "++auto 0", "++eoi 1", "++eos 2"];

/// Serial link to the GPIB controller.
pub struct PrologixController {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
    timeout: Duration,
    selected: Option<u8>,
    read_buf: Vec<u8>,
}
impl PrologixController {
    pub fn open(bus: &BusConfig) -> Result<Self, InstrumentError> {
        let timeout = Duration::from_millis(bus.timeout_ms);
        let port = serialport::new(&bus.port, bus.baud_rate)
            .timeout(timeout)
            .open()?;
        let mut controller = Self {
            port: Some(port),
            port_name: bus.port.clone(),
            timeout,
            selected: None,
            read_buf: Vec::with_capacity(128),
        };
        for command in CONTROLLER_SETUP {
            controller.send_line(command.as_bytes())?;
        }
        debug!("GPIB controller ready on {}", controller.port_name);
        Ok(controller)
    }
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, InstrumentError> {
        self.port.as_mut().ok_or(InstrumentError::Closed)
    }
    fn send_line(&mut self, line: &[u8]) -> Result<(), InstrumentError> {
        trace!("gpib >> {}", String::from_utf8_lossy(line));
        let port = self.port()?;
        port.write_all(line)?;
        port.write_all(b"\n")?;
        port.flush()?;
        Ok(())
    }
    fn select(&mut self, address: u8) -> Result<(), InstrumentError> {
        if self.selected != Some(address) {
            self.send_line(format!("++addr {address}").as_bytes())?;
            self.selected = Some(address);
        }
        Ok(())
    }
    /// Sends an instrument command, escaping bytes the controller would
    /// otherwise interpret itself.
    pub fn write(&mut self, address: u8, command: &str) -> Result<(), InstrumentError> {
        self.select(address)?;
        self.send_line(&escape_payload(command.as_bytes()))
    }
    pub fn query(&mut self, address: u8, command: &str) -> Result<String, InstrumentError> {
        self.write(address, command)?;
        self.send_line(b"++read eoi")?;
        let reply = self.read_line(command)?;
        trace!("gpib << {reply}");
        Ok(reply)
    }
    /// Returns the instrument at `address` to front-panel control.
    pub fn go_to_local(&mut self, address: u8) -> Result<(), InstrumentError> {
        self.select(address)?;
        self.send_line(b"++loc")
    }
    pub fn close(&mut self) {
        if let Some(port) = self.port.take() {
            debug!("closing GPIB controller on {}", self.port_name);
            drop(port);
        }
        self.selected = None;
    }
    fn read_line(&mut self, command: &str) -> Result<String, InstrumentError> {
        let deadline = Instant::now() + self.timeout;
        let timeout_ms = self.timeout.as_millis() as u64;
        let timed_out = || InstrumentError::Timeout {
            command: command.to_string(),
            timeout_ms,
        };
        loop {
            if let Some(end) = self.read_buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.read_buf.drain(..=end).collect();
                return Ok(String::from_utf8_lossy(&line).trim().to_string());
            }
            if Instant::now() >= deadline {
                return Err(timed_out());
            }
            let mut chunk = [0u8; 64];
            match self.port()?.read(&mut chunk) {
                Ok(0) => return Err(timed_out()),
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::TimedOut => return Err(timed_out()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}
fn escape_payload(payload: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(payload.len() + 4);
    for &byte in payload {
        if matches!(byte, b'\r' | b'\n' | ESC | b'+') {
            escaped.push(ESC);
        }
        escaped.push(byte);
    }
    escaped
}
type SharedController = Rc<RefCell<PrologixController>>;
/// Picoammeter on the GPIB bus.
pub struct GpibAmmeter {
    controller: SharedController,
    address: u8,
    reply_field: usize,
    closed: bool,
}
impl GpibAmmeter {
    fn live(&self) -> Result<(), InstrumentError> {
        if self.closed {
            Err(InstrumentError::Closed)
        } else {
            Ok(())
        }
    }
    fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        self.live()?;
        self.controller.borrow_mut().write(self.address, command)
    }
    fn query(&mut self, command: &str) -> Result<String, InstrumentError> {
        self.live()?;
        self.controller.borrow_mut().query(self.address, command)
    }
}
impl Ammeter for GpibAmmeter {
    fn identify(&mut self) -> Result<String, InstrumentError> {
        self.query(scpi::IDENTIFY)
    }
    fn configure(&mut self, options: &MeterOptions) -> Result<(), InstrumentError> {
        for command in scpi::meter_setup_commands(options) {
            self.write(&command)?;
        }
        self.reply_field = options.reply_field;
        Ok(())
    }
    fn reset(&mut self) -> Result<(), InstrumentError> {
        self.write(scpi::RESET)
    }
    fn read_current(&mut self) -> Result<f64, InstrumentError> {
        let reply = self.query(scpi::READ)?;
        scpi::parse_reading(&reply, self.reply_field)
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        self.live()?;
        self.closed = true;
        self.controller.borrow_mut().go_to_local(self.address)
    }
}
/// Bias supply on the GPIB bus.
pub struct GpibSource {
    controller: SharedController,
    address: u8,
    closed: bool,
}
impl GpibSource {
    fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        if self.closed {
            return Err(InstrumentError::Closed);
        }
        self.controller.borrow_mut().write(self.address, command)
    }
}
impl BiasSource for GpibSource {
    fn identify(&mut self) -> Result<String, InstrumentError> {
        if self.closed {
            return Err(InstrumentError::Closed);
        }
        self.controller
            .borrow_mut()
            .query(self.address, scpi::IDENTIFY)
    }
    fn reset(&mut self) -> Result<(), InstrumentError> {
        self.write(scpi::RESET)
    }
    fn configure_output(&mut self, output: &OutputSetting) -> Result<(), InstrumentError> {
        if output.rail.trim().is_empty() {
            return Err(InstrumentError::Rejected("output rail name is empty".into()));
        }
        self.write(&scpi::apply_command(output))
    }
    fn enable_output(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.write(&scpi::output_command(on))
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        if self.closed {
            return Err(InstrumentError::Closed);
        }
        self.closed = true;
        self.controller.borrow_mut().go_to_local(self.address)
    }
}
/// Resource manager backed by a single GPIB controller.
pub struct PrologixBus {
    controller: SharedController,
}
impl PrologixBus {
    pub fn open(bus: &BusConfig) -> Result<Self, InstrumentError> {
        let controller = PrologixController::open(bus)?;
        Ok(Self {
            controller: Rc::new(RefCell::new(controller)),
        })
    }
}
impl ResourceManager for PrologixBus {
    fn list_resources(&mut self) -> Result<Vec<String>, InstrumentError> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
    fn open_meter(&mut self, address: u8) -> Result<Box<dyn Ammeter>, InstrumentError> {
        debug!(
            "opening meter at GPIB address {address} via {}",
            self.controller.borrow().port_name()
        );
        Ok(Box::new(GpibAmmeter {
            controller: Rc::clone(&self.controller),
            address,
            reply_field: 0,
            closed: false,
        }))
    }
    fn open_source(&mut self, address: u8) -> Result<Box<dyn BiasSource>, InstrumentError> {
        debug!(
            "opening source at GPIB address {address} via {}",
            self.controller.borrow().port_name()
        );
        Ok(Box::new(GpibSource {
            controller: Rc::clone(&self.controller),
            address,
            closed: false,
        }))
    }
    fn close(&mut self) -> Result<(), InstrumentError> {
        self.controller.borrow_mut().close();
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn escapes_controller_bytes() {
        assert_eq!(escape_payload(b"READ?"), b"READ?".to_vec());
        assert_eq!(
            escape_payload(b"A+B\n"),
            vec![b'A', ESC, b'+', b'B', ESC, b'\n']
        );
    }
    #[test]
    fn opening_missing_port_fails() {
        let bus = BusConfig {
            port: "/dev/this-port-does-not-exist".into(),
            ..BusConfig::default()
        };
        assert!(PrologixBus::open(&bus).is_err());
    }
}
