use log::{debug, warn};
use crate::config::Config;
use crate::drivers::filter::{invert_polarity, moving_average, remove_baseline_offset};
use crate::drivers::metrics::derive_metrics;
use crate::drivers::RawSeries;
use crate::types::RunOutcome;
/// Everything a finished run produced, one entry per tick in every column.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub elapsed_s: Vec<f64>,
    /// Meter readings after polarity normalization.
    pub raw_current: Vec<f64>,
    pub filtered_current: Vec<f64>,
    pub resistance: Vec<f64>,
    pub resistivity: Vec<f64>,
    pub outcome: RunOutcome,
}
impl RunResult {
    /// Assembles the columns, refusing any that is not aligned with `elapsed_s`.
    #[cfg(test)]
    pub fn new(
        elapsed_s: Vec<f64>,
        raw_current: Vec<f64>,
        filtered_current: Vec<f64>,
        resistance: Vec<f64>,
        resistivity: Vec<f64>,
        outcome: RunOutcome,
    ) -> Result<Self, crate::drivers::ProcessingError> {
        let expected = elapsed_s.len();
        for column in [&raw_current, &filtered_current, &resistance, &resistivity] {
            if column.len() != expected {
                return Err(crate::drivers::ProcessingError::LengthMismatch {
                    expected,
                    actual: column.len(),
                });
            }
        }
        Ok(Self {
            elapsed_s,
            raw_current,
            filtered_current,
            resistance,
            resistivity,
            outcome,
        })
    }
    pub fn len(&self) -> usize {
        self.elapsed_s.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elapsed_s.is_empty()
    }
}
/// Polarity, optional baseline removal, smoothing, then resistance and resistivity.
///
/// Every stage maps one column onto a column of the same length, so the
/// result is always aligned with the recorded series.
pub fn process(raw: &RawSeries, config: &Config, outcome: RunOutcome) -> RunResult {
    let mut current = if config.invert_polarity {
        invert_polarity(raw.currents())
    } else {
        raw.currents().to_vec()
    };
    if let Some(delay) = config.baseline_delay {
        match remove_baseline_offset(&current, raw.elapsed(), delay.as_secs_f64()) {
            Ok(corrected) => current = corrected,
            Err(err) => warn!("baseline removal skipped: {err}"),
        }
    }
    let filtered = moving_average(&current, config.smoothing_half_window);
    let derived = derive_metrics(&filtered, config);
    debug!(
        "processed {} samples (half window {})",
        raw.len(),
        config.smoothing_half_window
    );
    RunResult {
        elapsed_s: raw.elapsed().to_vec(),
        raw_current: current,
        filtered_current: filtered,
        resistance: derived.resistance,
        resistivity: derived.resistivity,
        outcome,
    }
}
