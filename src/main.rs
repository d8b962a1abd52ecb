// src/main.rs
//! Timed leakage-current measurement on a guarded-electrode sample.
//!
//! ```bash
//! # 3.2 minute run on the bench, bias switched on after 10 s
//! leakmeter sample_a --port /dev/ttyUSB0
//!
//! # dry run without hardware
//! leakmeter dry --simulate --duration 30 --delay 5
//! ```
mod acquisition;
mod config;
mod drivers;
mod engine;
mod recorder;
mod shutdown;
mod sink;
mod types;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use acquisition::CancelToken;
use config::RunConfig;
use drivers::{PrologixBus, ResourceManager, SimulatedBus, SimulatedSample};
use shutdown::StepStatus;
use sink::ResultSink;

/// Leakage current, resistance and resistivity of an insulating sample
#[derive(Parser, Debug)]
#[command(name = "leakmeter")]
#[command(version)]
struct Args {
    /// Output base name; writes <BASE>_all.csv and <BASE>_plot.png
    base_name: PathBuf,

    /// JSON run configuration; command-line flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run duration in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Delay before the bias output is switched on, in seconds
    #[arg(long)]
    delay: Option<f64>,

    /// Half width of the moving-average window, in samples
    #[arg(short, long)]
    window: Option<usize>,

    /// Bias voltage used for the resistance computation, in volts
    #[arg(long)]
    bias: Option<f64>,

    /// Serial port of the GPIB controller
    #[arg(long)]
    port: Option<String>,

    /// GPIB address of the picoammeter
    #[arg(long)]
    meter_address: Option<u8>,

    /// GPIB address of the bias source
    #[arg(long)]
    source_address: Option<u8>,

    /// Subtract the mean current measured up to this time, in seconds
    #[arg(long)]
    baseline_delay: Option<f64>,

    /// Keep the meter's sign convention
    #[arg(long)]
    no_invert: bool,

    /// Skip rendering the diagnostic plot
    #[arg(long)]
    no_plot: bool,

    /// Use simulated instruments instead of the GPIB bus
    #[arg(long)]
    simulate: bool,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig> {
        let mut raw = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.duration {
            raw.run_duration_s = v;
        }
        if let Some(v) = self.delay {
            raw.enable_delay_s = v;
        }
        if let Some(v) = self.window {
            raw.smoothing_half_window = v;
        }
        if let Some(v) = self.bias {
            raw.bias_voltage = v;
        }
        if let Some(v) = &self.port {
            raw.bus.port = v.clone();
        }
        if let Some(v) = self.meter_address {
            raw.bus.meter_address = v;
        }
        if let Some(v) = self.source_address {
            raw.bus.source_address = v;
        }
        if self.baseline_delay.is_some() {
            raw.baseline_delay_s = self.baseline_delay;
        }
        if self.no_invert {
            raw.invert_polarity = false;
        }
        Ok(raw)
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = args
        .run_config()?
        .build()
        .context("invalid run configuration")?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n/!\\ interruption detected (Ctrl+C), stopping after the current reading");
        handler_token.cancel();
    })
    .context("installing Ctrl+C handler")?;

    let bus: Box<dyn ResourceManager> = if args.simulate {
        info!("using simulated instruments");
        Box::new(SimulatedBus::new(SimulatedSample::default()))
    } else {
        Box::new(PrologixBus::open(&config.bus).with_context(|| {
            format!("opening GPIB controller on {}", config.bus.port)
        })?)
    };

    let mut sink = ResultSink::new(args.base_name.clone());
    if args.no_plot {
        sink = sink.without_plot();
    }
    let summary = engine::run_session(&config, bus, &cancel, &sink)?;
    if let Some(err) = &summary.failure {
        error!("acquisition stopped early: {err}");
    }
    if let Some(report) = summary.shutdown.as_ref().filter(|r| !r.all_released()) {
        for (step, status) in &report.steps {
            if let StepStatus::Failed(err) = status {
                warn!("{step} was not released cleanly: {err}");
            }
        }
    }
    match &summary.sink.csv {
        Ok(path) => info!("{} points saved to {}", summary.samples, path.display()),
        Err(err) => error!("data not saved: {err}"),
    }
    match &summary.sink.plot {
        Some(Ok(path)) => info!("plot saved to {}", path.display()),
        Some(Err(err)) => warn!("plot not saved: {err}"),
        None => {}
    }
    info!("program finished ({})", summary.outcome);
    Ok(ExitCode::from(summary.outcome.exit_code()))
}

// 入口函数
fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run(Args::parse()) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "leakmeter",
            "out/run",
            "--duration",
            "60",
            "--delay",
            "2.5",
            "--window",
            "3",
            "--no-invert",
            "--meter-address",
            "22",
        ]);
        let raw = args.run_config().unwrap();
        assert_eq!(raw.run_duration_s, 60.0);
        assert_eq!(raw.enable_delay_s, 2.5);
        assert_eq!(raw.smoothing_half_window, 3);
        assert!(!raw.invert_polarity);
        assert_eq!(raw.bus.meter_address, 22);
        assert_eq!(raw.bias_voltage, 42.0);
        assert!(!args.simulate);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "run_duration_s": 10.0, "bias_voltage": 100.0 }"#).unwrap();
        let args = Args::parse_from([
            "leakmeter",
            "run",
            "--config",
            path.to_str().unwrap(),
            "--duration",
            "20",
        ]);
        let raw = args.run_config().unwrap();
        assert_eq!(raw.run_duration_s, 20.0);
        assert_eq!(raw.bias_voltage, 100.0);
    }
}
