//! Run configuration: grid geometry and mass-wasting parameters.
//!
//! Both are plain serde values passed explicitly into every component; no
//! process-wide map state exists.
use serde::{Deserialize, Serialize};

use crate::error::{MassWastingError, Result};

// ── Grid geometry ─────────────────────────────────────────────────────────────

/// Coarse (hydrology) grid dimensions plus the fine (mass-wasting) cell size.
///
/// Every coarse cell holds an integer block of `fine_per_row × fine_per_col`
/// fine cells; rows increase southward, columns eastward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub coarse_rows: usize,
    pub coarse_cols: usize,
    /// Coarse cell size east-west (m).
    pub dx: f64,
    /// Coarse cell size north-south (m).
    pub dy: f64,
    /// Fine cell size (m), isotropic.
    pub dmass: f64,
}

impl GridConfig {
    pub fn new(coarse_rows: usize, coarse_cols: usize, dx: f64, dy: f64, dmass: f64) -> Result<Self> {
        let cfg = Self { coarse_rows, coarse_cols, dx, dy, dmass };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.coarse_rows == 0 || self.coarse_cols == 0 {
            return Err(MassWastingError::InvalidConfig("grid has zero coarse cells".into()));
        }
        if !(self.dmass > 0.0 && self.dx > 0.0 && self.dy > 0.0) {
            return Err(MassWastingError::InvalidConfig(format!(
                "cell sizes must be positive (dx={}, dy={}, dmass={})",
                self.dx, self.dy, self.dmass
            )));
        }
        for (name, size) in [("dx", self.dx), ("dy", self.dy)] {
            let ratio = size / self.dmass;
            if (ratio - ratio.round()).abs() > 1e-6 || ratio.round() < 1.0 {
                return Err(MassWastingError::InvalidConfig(format!(
                    "{name}={size} is not an integer multiple of dmass={}",
                    self.dmass
                )));
            }
        }
        Ok(())
    }

    /// Fine rows per coarse row.
    #[inline]
    pub fn fine_per_row(&self) -> usize {
        (self.dy / self.dmass).round() as usize
    }

    /// Fine columns per coarse column.
    #[inline]
    pub fn fine_per_col(&self) -> usize {
        (self.dx / self.dmass).round() as usize
    }

    #[inline]
    pub fn fine_rows(&self) -> usize {
        self.coarse_rows * self.fine_per_row()
    }

    #[inline]
    pub fn fine_cols(&self) -> usize {
        self.coarse_cols * self.fine_per_col()
    }

    #[inline]
    pub fn fine_in_coarse(&self) -> usize {
        self.fine_per_row() * self.fine_per_col()
    }

    #[inline]
    pub fn fine_cell_area(&self) -> f64 {
        self.dmass * self.dmass
    }

    #[inline]
    pub fn coarse_cell_area(&self) -> f64 {
        self.dx * self.dy
    }

    /// Parent coarse cell of a fine cell.
    #[inline]
    pub fn coarse_of(&self, fine_row: usize, fine_col: usize) -> (usize, usize) {
        (fine_row / self.fine_per_row(), fine_col / self.fine_per_col())
    }

    /// Fine cells of one coarse cell, row-major inside the block.
    pub fn fine_block(&self, coarse_row: usize, coarse_col: usize) -> impl Iterator<Item = (usize, usize)> {
        let fr = self.fine_per_row();
        let fc = self.fine_per_col();
        (0..fr).flat_map(move |ii| (0..fc).map(move |jj| (coarse_row * fr + ii, coarse_col * fc + jj)))
    }
}

// ── Mass-wasting parameters ───────────────────────────────────────────────────

/// Tunable thresholds and constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MassWastingParams {
    /// Monte-Carlo repetitions; 1 is a deterministic mean-parameter run.
    pub iterations: usize,
    pub seed: u64,
    /// Factor of safety below which a cell fails.
    pub fs_criteria: f64,
    /// Saturated thickness / soil depth ratio required to test a cell.
    pub saturation_threshold: f64,
    pub min_failure_slope_deg: f64,
    pub runout_stop_slope_deg: f64,
    /// Maximum flow/channel misalignment that still continues downstream.
    pub junction_angle_deg: f64,
    pub min_channel_slope_deg: f64,
    /// Radial intersection search limit, in coarse cells.
    pub max_search_radius: usize,
    /// Soil-moisture volume residual (m³) ignored by the correction step.
    pub redistribution_tolerance_m3: f64,
    pub vertical_resolution_m: f64,
    /// Cells with failure probability above this are counted in the summary.
    pub failure_probability_threshold: f64,
    pub debris_d50_mm: f64,
    /// kg/m³
    pub particle_density: f64,
    /// Fraction of delivered mass per particle-size bin; must sum to 1.
    pub size_fractions: Vec<f64>,
    pub include_snow_surcharge: bool,
}

impl Default for MassWastingParams {
    fn default() -> Self {
        Self {
            iterations: 1,
            seed: 42,
            fs_criteria: 1.0,
            saturation_threshold: 0.85,
            min_failure_slope_deg: 10.0,
            runout_stop_slope_deg: 4.0,
            junction_angle_deg: 70.0,
            min_channel_slope_deg: 3.5,
            max_search_radius: 10,
            redistribution_tolerance_m3: 25.0,
            vertical_resolution_m: 1.0,
            failure_probability_threshold: 0.0,
            debris_d50_mm: 1.0,
            particle_density: 2685.0,
            size_fractions: vec![1.0 / 3.0; 3],
            include_snow_surcharge: false,
        }
    }
}

impl MassWastingParams {
    /// Iteration count with `0` coerced to `1`.
    #[inline]
    pub fn effective_iterations(&self) -> usize {
        self.iterations.max(1)
    }

    #[inline]
    pub fn size_classes(&self) -> usize {
        self.size_fractions.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.size_fractions.is_empty() {
            return Err(MassWastingError::InvalidConfig("size_fractions is empty".into()));
        }
        if self.size_fractions.iter().any(|&f| f < 0.0) {
            return Err(MassWastingError::InvalidConfig("negative size fraction".into()));
        }
        let total: f64 = self.size_fractions.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(MassWastingError::InvalidConfig(format!(
                "size_fractions sum to {total:.6}, expected 1"
            )));
        }
        if !(0.0..=180.0).contains(&self.junction_angle_deg) {
            return Err(MassWastingError::InvalidConfig(format!(
                "junction_angle_deg {} outside [0, 180]",
                self.junction_angle_deg
            )));
        }
        if self.fs_criteria <= 0.0 {
            return Err(MassWastingError::InvalidConfig("fs_criteria must be positive".into()));
        }
        if self.debris_d50_mm <= 0.0 || self.particle_density <= 0.0 {
            return Err(MassWastingError::InvalidConfig(
                "debris_d50_mm and particle_density must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Bulk porosity of deposited debris (Komura, 1961).
    pub fn bulk_porosity(&self) -> f64 {
        0.245 + 0.14 * self.debris_d50_mm.powf(-0.21)
    }
}
