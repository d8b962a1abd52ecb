/// One reading taken during a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Seconds since acquisition started.
    pub elapsed_s: f64,
    /// Amperes, as reported by the meter (sign included).
    pub raw_current: f64,
}
/// Append-only record of every tick of a run.
///
/// Elapsed times and currents are kept in two aligned vectors so the
/// processing stages can borrow either column as a plain slice.
#[derive(Clone, Debug, Default)]
pub struct RawSeries {
    elapsed_s: Vec<f64>,
    currents: Vec<f64>,
}
impl RawSeries {
    pub fn new() -> Self {
        Self::default()
    }
    /// Records a complete sample; both columns grow together or not at all.
    pub fn push(&mut self, sample: Sample) {
        self.elapsed_s.push(sample.elapsed_s);
        self.currents.push(sample.raw_current);
    }
    pub fn len(&self) -> usize {
        self.elapsed_s.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elapsed_s.is_empty()
    }
    pub fn elapsed(&self) -> &[f64] {
        &self.elapsed_s
    }
    pub fn currents(&self) -> &[f64] {
        &self.currents
    }
    pub fn last(&self) -> Option<Sample> {
        let elapsed_s = *self.elapsed_s.last()?;
        let raw_current = *self.currents.last()?;
        Some(Sample {
            elapsed_s,
            raw_current,
        })
    }
    /// Elapsed time of the last sample, `0.0` for an empty series.
    pub fn duration_seconds(&self) -> f64 {
        self.elapsed_s.last().copied().unwrap_or(0.0)
    }
}
impl FromIterator<Sample> for RawSeries {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut series = RawSeries::new();
        for sample in iter {
            series.push(sample);
        }
        series
    }
}
