use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::drivers::{RunResult, SinkError};

pub const CSV_HEADER: &str =
    "temps(s), courant_brut(A), courant_filtre(A), resistance(Ohm), resistivite(Ohm.m)";

/// `<base>_all.csv`
pub fn csv_path(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push("_all.csv");
    PathBuf::from(name)
}

/// Plain decimal for ordinary magnitudes, scientific notation for tiny or huge ones.
pub fn format_value(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 || !value.is_finite() || (1.0e-4..1.0e16).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

pub struct DataRecorder {
    path: PathBuf,
}

impl DataRecorder {
    pub fn new(base: &Path) -> Self {
        Self {
            path: csv_path(base),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the header and one row per sample, then flushes.
    pub fn write_result(&self, result: &RunResult) -> Result<usize, SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        let file = File::create(&self.path).map_err(io_err)?;
        let mut w = BufWriter::new(file);
        writeln!(w, "{CSV_HEADER}").map_err(io_err)?;
        for i in 0..result.len() {
            writeln!(
                w,
                "{},{},{},{},{}",
                format_value(result.elapsed_s[i]),
                format_value(result.raw_current[i]),
                format_value(result.filtered_current[i]),
                format_value(result.resistance[i]),
                format_value(result.resistivity[i]),
            )
            .map_err(io_err)?;
        }
        w.flush().map_err(io_err)?;
        Ok(result.len())
    }
}
