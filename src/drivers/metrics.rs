//! Resistance and resistivity derived from the smoothed leakage current.
//!
//! - Resistance (Ω) = bias voltage / current, `+inf` when the current is exactly zero.
//! - Resistivity (Ω·m) = resistance × effective area / sample thickness.
//!
//! Both are pointwise and total; an infinite resistance stays infinite through
//! the resistivity scaling.
use crate::config::Config;
/// Ohm's law with the zero-current sentinel.
pub fn resistance(bias_voltage: f64, current: f64) -> f64 {
    if current != 0.0 {
        bias_voltage / current
    } else {
        f64::INFINITY
    }
}
/// Volume resistivity from a resistance and the electrode geometry.
pub fn resistivity(resistance_ohms: f64, effective_area: f64, thickness: f64) -> f64 {
    resistance_ohms * effective_area / thickness
}
/// Resistance and resistivity series, index-aligned with the input current.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivedSeries {
    pub resistance: Vec<f64>,
    pub resistivity: Vec<f64>,
}
pub fn derive_metrics(filtered_current: &[f64], config: &Config) -> DerivedSeries {
    let resistance: Vec<f64> = filtered_current
        .iter()
        .map(|&i| self::resistance(config.bias_voltage, i))
        .collect();
    let resistivity = resistance
        .iter()
        .map(|&r| self::resistivity(r, config.effective_area, config.sample_thickness))
        .collect();
    DerivedSeries {
        resistance,
        resistivity,
    }
}
