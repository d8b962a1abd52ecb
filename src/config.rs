// src/config.rs
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::ConfigError;

// 皮安表积分时间范围 (电源周期数)
const MIN_NPLC: f64 = 0.01;
const MAX_NPLC: f64 = 60.0;

/// How the meter compensates its internal offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroMode {
    /// `SYST:AZER ON`, picoammeter naming.
    AutoZero,
    /// `SYST:ZCOR ON`, electrometer / sourcemeter naming.
    ZeroCorrect,
}

/// Instrument-side signal conditioning applied during setup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterOptions {
    pub autorange: bool,
    /// Integration time in power-line cycles.
    pub nplc: f64,
    /// Median filter rank, `None` turns the filter off.
    pub median_rank: Option<u8>,
    pub averaging: bool,
    /// Offset compensation on or off.
    pub zero_enabled: bool,
    /// Command naming used for the offset compensation.
    pub zero_mode: ZeroMode,
    /// Elements the meter returns on each reading (`FORM:ELEM`).
    pub elements: String,
    /// Index of the current inside the comma-separated reply.
    pub reply_field: usize,
}
impl Default for MeterOptions {
    fn default() -> Self {
        Self {
            autorange: true,
            nplc: 1.0,
            median_rank: Some(1),
            averaging: false,
            zero_enabled: true,
            zero_mode: ZeroMode::AutoZero,
            elements: "CURR".into(),
            reply_field: 0,
        }
    }
}

/// One `APPL` line sent to the bias source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputSetting {
    pub rail: String,
    pub voltage: f64,
    pub current_limit: f64,
}
impl OutputSetting {
    pub fn new(rail: &str, voltage: f64, current_limit: f64) -> Self {
        Self {
            rail: rail.to_string(),
            voltage,
            current_limit,
        }
    }
}

/// Electrode and sample dimensions, in metres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleGeometry {
    pub thickness_m: f64,
    pub electrode_diameter_m: f64,
    pub guard_gap_m: f64,
}
impl Default for SampleGeometry {
    fn default() -> Self {
        Self {
            thickness_m: 0.93e-3,
            electrode_diameter_m: 5.00e-3,
            guard_gap_m: 1.30e-4,
        }
    }
}
impl SampleGeometry {
    /// `π·(gap + diameter)² / 4`, as supplied by the operator.
    pub fn effective_area(&self) -> f64 {
        PI * (self.guard_gap_m + self.electrode_diameter_m).powi(2) / 4.0
    }
}

/// Where the GPIB controller lives and which addresses the instruments answer on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub port: String,
    pub baud_rate: u32,
    pub meter_address: u8,
    pub source_address: u8,
    pub timeout_ms: u64,
}
impl Default for BusConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
            meter_address: 14,
            source_address: 5,
            timeout_ms: 5_000,
        }
    }
}

/// Run parameters as they appear in a JSON config file. Every field is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub bias_voltage: f64,
    pub geometry: SampleGeometry,
    pub run_duration_s: f64,
    pub enable_delay_s: f64,
    pub smoothing_half_window: usize,
    pub invert_polarity: bool,
    pub baseline_delay_s: Option<f64>,
    pub meter: MeterOptions,
    pub source_outputs: Vec<OutputSetting>,
    pub bus: BusConfig,
}
impl Default for RunConfig {
    fn default() -> Self {
        Self {
            bias_voltage: 42.0,
            geometry: SampleGeometry::default(),
            run_duration_s: 3.2 * 60.0,
            enable_delay_s: 10.0,
            smoothing_half_window: 50,
            invert_polarity: true,
            baseline_delay_s: None,
            meter: MeterOptions::default(),
            source_outputs: vec![
                OutputSetting::new("P25V", 25.0, 1.0),
                OutputSetting::new("N25V", -17.0, 1.0),
            ],
            bus: BusConfig::default(),
        }
    }
}
impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
    /// Validates the parameters and freezes them into a [`Config`].
    pub fn build(self) -> Result<Config, ConfigError> {
        finite("bias_voltage", self.bias_voltage)?;
        positive("geometry.thickness_m", self.geometry.thickness_m)?;
        positive(
            "geometry.electrode_diameter_m",
            self.geometry.electrode_diameter_m,
        )?;
        non_negative("geometry.guard_gap_m", self.geometry.guard_gap_m)?;
        non_negative("run_duration_s", self.run_duration_s)?;
        non_negative("enable_delay_s", self.enable_delay_s)?;
        if let Some(delay) = self.baseline_delay_s {
            non_negative("baseline_delay_s", delay)?;
        }
        positive("meter.nplc", self.meter.nplc)?;
        if !(MIN_NPLC..=MAX_NPLC).contains(&self.meter.nplc) {
            return Err(ConfigError::OutOfRange {
                field: "meter.nplc",
                value: self.meter.nplc,
            });
        }
        for output in &self.source_outputs {
            finite("source_outputs.voltage", output.voltage)?;
            non_negative("source_outputs.current_limit", output.current_limit)?;
        }
        Ok(Config {
            bias_voltage: self.bias_voltage,
            sample_thickness: self.geometry.thickness_m,
            electrode_diameter: self.geometry.electrode_diameter_m,
            guard_gap: self.geometry.guard_gap_m,
            effective_area: self.geometry.effective_area(),
            run_duration: seconds("run_duration_s", self.run_duration_s)?,
            enable_delay: seconds("enable_delay_s", self.enable_delay_s)?,
            smoothing_half_window: self.smoothing_half_window,
            invert_polarity: self.invert_polarity,
            baseline_delay: self
                .baseline_delay_s
                .map(|delay| seconds("baseline_delay_s", delay))
                .transpose()?,
            meter: self.meter,
            source_outputs: self.source_outputs,
            bus: self.bus,
        })
    }
}
fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::OutOfRange { field, value })
}
fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}
fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}
fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

/// Immutable parameters of one run. Built once at startup by [`RunConfig::build`].
#[derive(Clone, Debug)]
pub struct Config {
    pub bias_voltage: f64,
    pub sample_thickness: f64,
    pub electrode_diameter: f64,
    pub guard_gap: f64,
    pub effective_area: f64,
    pub run_duration: Duration,
    pub enable_delay: Duration,
    pub smoothing_half_window: usize,
    pub invert_polarity: bool,
    pub baseline_delay: Option<Duration>,
    pub meter: MeterOptions,
    pub source_outputs: Vec<OutputSetting>,
    pub bus: BusConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn defaults_build_with_operator_area() {
        let config = RunConfig::default().build().unwrap();
        let expected = PI * (1.30e-4 + 5.00e-3_f64).powi(2) / 4.0;
        assert!((config.effective_area - expected).abs() < 1e-18);
        assert_eq!(config.bias_voltage, 42.0);
        assert_eq!(config.smoothing_half_window, 50);
        assert_eq!(config.enable_delay, Duration::from_secs(10));
        assert!(config.invert_polarity);
    }
    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "run_duration_s": 0.0, "meter": { "zero_mode": "zero_correct", "reply_field": 1 } }"#;
        let parsed: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.run_duration_s, 0.0);
        assert_eq!(parsed.meter.zero_mode, ZeroMode::ZeroCorrect);
        assert!(parsed.meter.zero_enabled);
        assert_eq!(parsed.meter.reply_field, 1);
        assert_eq!(parsed.meter.nplc, 1.0);
        assert_eq!(parsed.bias_voltage, 42.0);
        assert_eq!(parsed.source_outputs.len(), 2);
    }
    #[test]
    fn rejects_zero_thickness() {
        let mut raw = RunConfig::default();
        raw.geometry.thickness_m = 0.0;
        let err = raw.build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonPositive {
                field: "geometry.thickness_m",
                ..
            }
        ));
    }
    #[test]
    fn rejects_negative_duration() {
        let raw = RunConfig {
            run_duration_s: -1.0,
            ..RunConfig::default()
        };
        assert!(matches!(
            raw.build(),
            Err(ConfigError::Negative {
                field: "run_duration_s",
                ..
            })
        ));
    }
    #[test]
    fn rejects_integration_time_beyond_meter_range() {
        let mut raw = RunConfig::default();
        raw.meter.nplc = 1.0e20;
        assert!(matches!(
            raw.build(),
            Err(ConfigError::OutOfRange {
                field: "meter.nplc",
                ..
            })
        ));
        let mut raw = RunConfig::default();
        raw.meter.nplc = 60.0;
        assert!(raw.build().is_ok());
    }
    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{ "bias_voltage": 10.0 }"#).unwrap();
        let parsed = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(parsed.bias_voltage, 10.0);
        let missing = RunConfig::from_json_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
