// src/sink.rs
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::drivers::{render_run_png, PlotStyle, RunResult, SinkError};
use crate::recorder::DataRecorder;

/// `<base>_plot.png`
pub fn plot_path(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push("_plot.png");
    PathBuf::from(name)
}

#[derive(Debug)]
pub struct SinkReport {
    pub csv: Result<PathBuf, SinkError>,
    /// `None` when plotting is disabled.
    pub plot: Option<Result<PathBuf, SinkError>>,
}

/// Persists a finished run: CSV table first, then the diagnostic figure.
/// A failure in one never prevents the other.
pub struct ResultSink {
    base: PathBuf,
    plot_style: Option<PlotStyle>,
}

impl ResultSink {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            plot_style: Some(PlotStyle::default()),
        }
    }

    pub fn without_plot(mut self) -> Self {
        self.plot_style = None;
        self
    }

    pub fn persist(&self, result: &RunResult) -> SinkReport {
        info!("saving {} measurement points...", result.len());
        let recorder = DataRecorder::new(&self.base);
        let csv = match recorder.write_result(result) {
            Ok(_) => {
                info!("💾 data saved to {}", recorder.path().display());
                Ok(recorder.path().to_path_buf())
            }
            Err(err) => {
                error!("error while saving: {err}");
                Err(err)
            }
        };
        let plot = self.plot_style.as_ref().map(|style| {
            let outcome = self.write_plot(result, style);
            match &outcome {
                Ok(path) => info!("plot written to {}", path.display()),
                Err(err) => error!("error while plotting: {err}"),
            }
            outcome
        });
        SinkReport { csv, plot }
    }

    fn write_plot(&self, result: &RunResult, style: &PlotStyle) -> Result<PathBuf, SinkError> {
        let png = render_run_png(result, style)?;
        let path = plot_path(&self.base);
        fs::write(&path, png).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::CSV_HEADER;
    use crate::types::RunOutcome;

    fn result(len: usize) -> RunResult {
        let column = |scale: f64| (0..len).map(|i| i as f64 * scale).collect::<Vec<_>>();
        RunResult::new(
            column(0.5),
            column(1.0e-12),
            column(1.0e-12),
            column(1.0e13),
            column(1.0e12),
            RunOutcome::Completed,
        )
        .unwrap()
    }

    #[test]
    fn csv_written_even_when_plot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("empty"));
        let report = sink.persist(&result(0));
        let csv = report.csv.unwrap();
        let text = fs::read_to_string(csv).unwrap();
        assert_eq!(text.trim_end(), CSV_HEADER);
        assert!(matches!(report.plot, Some(Err(SinkError::Plot(_)))));
    }

    #[test]
    fn plot_attempted_when_csv_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("no-such-dir").join("run"));
        let report = sink.persist(&result(3));
        assert!(matches!(report.csv, Err(SinkError::Io { .. })));
        // Rendering may succeed or not depending on fonts; writing cannot.
        assert!(matches!(report.plot, Some(Err(_))));
    }

    #[test]
    fn plot_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("run")).without_plot();
        let report = sink.persist(&result(4));
        assert!(report.csv.is_ok());
        assert!(report.plot.is_none());
        assert!(!plot_path(&dir.path().join("run")).exists());
    }
}
