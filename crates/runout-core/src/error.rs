//! Error taxonomy for the mass-wasting engine.
//!
//! Basin-boundary escapes are not errors: they are recovered in place by the
//! cascade and runout walkers and reported through `EventOutcome`.
use thiserror::Error;

use crate::channel::SegmentId;

pub type Result<T> = std::result::Result<T, MassWastingError>;

#[derive(Error, Debug)]
pub enum MassWastingError {
    /// Arena reservation for a raster or accumulator failed.
    #[error("allocation of {what} ({cells} cells) failed")]
    Allocation { what: &'static str, cells: usize },

    /// An aspect or angular difference outside its physical domain.
    #[error("invalid {what} ({value:.4}) at row {row}, col {col}")]
    InvalidGeometry {
        what: &'static str,
        value: f64,
        row: usize,
        col: usize,
    },

    /// Radial search for a required channel connection found nothing.
    #[error("no cell joining segment {current} to outlet {outlet} within radius {radius}")]
    SearchExhausted {
        current: SegmentId,
        outlet: SegmentId,
        radius: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{what}: expected {expected} values, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unknown channel segment {0}")]
    UnknownSegment(SegmentId),

    #[error("channel network contains a cycle through segment {0}")]
    CyclicNetwork(SegmentId),

    #[error("{table} index {index} out of range ({len} entries)")]
    UnknownPropertyIndex {
        table: &'static str,
        index: usize,
        len: usize,
    },

    #[error("run cancelled after {completed} iterations")]
    Cancelled { completed: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reserve `cells` elements up front so oversized rasters surface as an
/// error instead of an abort.
pub(crate) fn try_alloc<T: Clone>(what: &'static str, cells: usize, fill: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(cells)
        .map_err(|_| MassWastingError::Allocation { what, cells })?;
    v.resize(cells, fill);
    Ok(v)
}
