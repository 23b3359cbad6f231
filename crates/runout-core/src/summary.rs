//! One-line run summary, appended to a per-run log file.
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub label: String,
    /// Failure events per iteration.
    pub avg_failures: f64,
    /// Cells that ever failed, per failure event.
    pub avg_cells_per_failure: f64,
    /// Cells whose failure probability exceeds the configured threshold.
    pub likely_failed_cells: usize,
}

impl RunSummary {
    /// Append the summary line to `path`, creating the file if needed.
    pub fn append_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{self}")?;
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:.4} {:.4} {:7}",
            self.label, self.avg_failures, self.avg_cells_per_failure, self.likely_failed_cells
        )
    }
}
