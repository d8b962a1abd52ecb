use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("serial transport error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("i/o error on instrument bus: {0}")]
    Io(#[from] std::io::Error),
    #[error("no reply to `{command}` within {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },
    #[error("malformed reply `{reply}`")]
    Malformed { reply: String },
    #[error("instrument handle already closed")]
    Closed,
    #[error("instrument rejected the request: {0}")]
    Rejected(String),
}
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("{field} must be greater than zero, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} is out of range, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
#[derive(Debug, Error, PartialEq)]
pub enum ProcessingError {
    #[error("no sample recorded at or before {delay_s} s; cannot estimate a baseline")]
    NoBaselineSamples { delay_s: f64 },
    #[error("series length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for SinkError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        SinkError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for SinkError {
    fn from(value: image::ImageError) -> Self {
        SinkError::Plot(value.to_string())
    }
}
