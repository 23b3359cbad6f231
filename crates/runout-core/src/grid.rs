//! Fine and coarse raster arenas.
//!
//! Both grids are row-major `Vec`s owned by [`Terrain`] for the lifetime of a
//! run and indexed by `(row, col)`.  Fine cells exist for the whole raster
//! rectangle; only those whose parent coarse cell lies in the basin carry
//! soil and take part in the simulation.
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::error::{try_alloc, MassWastingError, Result};

/// One fine-resolution (mass-wasting) pixel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FineCell {
    /// Surface elevation from the DEM (m).
    pub elevation: f64,
    /// Bedrock elevation (m).
    pub bedrock: f64,
    /// Sediment thickness (m).
    pub sediment: f64,
    /// Saturated thickness (m).
    pub saturated_thickness: f64,
    /// `ln(a / tanβ)`; computed once at initialisation.
    pub topographic_index: f64,
    /// Fine mask; never wider than the coarse mask.
    pub in_basin_fine: bool,
    /// Fraction of iterations in which the cell failed.
    pub failure_probability: f64,
    /// Mean sediment depth lost to mass wasting (m).
    pub mass_wasted_depth: f64,
    /// Mean sediment depth gained from runout (m).
    pub mass_deposited_depth: f64,
    /// Mean sediment volume delivered to a channel from this cell (m³).
    pub sediment_delivered_to_channel: f64,
}

impl FineCell {
    /// Soil surface elevation (bedrock + sediment).
    #[inline]
    pub fn soil_surface(&self) -> f64 {
        self.bedrock + self.sediment
    }

    /// Net signed change of sediment depth (m); positive = deposition.
    #[inline]
    pub fn delta_depth(&self) -> f64 {
        self.mass_deposited_depth - self.mass_wasted_depth
    }
}

/// One coarse-resolution (hydrology) cell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoarseCell {
    pub in_basin: bool,
    /// Total soil depth (m).
    pub soil_depth: f64,
    /// Depth to the water table (m); negative means ponding.
    pub water_table_depth: f64,
    /// Index into the soil property table.
    pub soil_type: usize,
    /// Index into the vegetation property table.
    pub veg_type: usize,
    /// Snow load on the surface (kg/m²).
    #[serde(default)]
    pub snow_load: f64,
    /// Fine cell flat indices, descending topographic index.
    #[serde(skip)]
    pub ordered_fine: Vec<usize>,
}

/// The fine and coarse arenas plus the geometry tying them together.
#[derive(Debug, Clone)]
pub struct Terrain {
    pub config: GridConfig,
    pub coarse: Vec<CoarseCell>,
    pub fine: Vec<FineCell>,
}

impl Terrain {
    /// Build the arenas.
    ///
    /// * `fine_elevation`: row-major DEM covering the full fine raster.
    /// * `fine_mask`: optional fine mask; defaults to the coarse mask and is
    ///   always clipped to it.
    ///
    /// Sediment starts at the parent coarse cell's soil depth with bedrock
    /// beneath it.
    pub fn new(
        config: GridConfig,
        coarse: Vec<CoarseCell>,
        fine_elevation: &[f64],
        fine_mask: Option<&[bool]>,
    ) -> Result<Self> {
        config.validate()?;
        let n_coarse = config.coarse_rows * config.coarse_cols;
        let n_fine = config.fine_rows() * config.fine_cols();
        if coarse.len() != n_coarse {
            return Err(MassWastingError::DimensionMismatch {
                what: "coarse cells",
                expected: n_coarse,
                found: coarse.len(),
            });
        }
        if fine_elevation.len() != n_fine {
            return Err(MassWastingError::DimensionMismatch {
                what: "fine elevation",
                expected: n_fine,
                found: fine_elevation.len(),
            });
        }
        if let Some(mask) = fine_mask {
            if mask.len() != n_fine {
                return Err(MassWastingError::DimensionMismatch {
                    what: "fine mask",
                    expected: n_fine,
                    found: mask.len(),
                });
            }
        }

        let mut fine = try_alloc("fine raster", n_fine, FineCell::default())?;
        let cols = config.fine_cols();
        for (i, cell) in fine.iter_mut().enumerate() {
            let (cr, cc) = config.coarse_of(i / cols, i % cols);
            let parent = &coarse[cr * config.coarse_cols + cc];
            cell.elevation = fine_elevation[i];
            if parent.in_basin {
                cell.sediment = parent.soil_depth;
                cell.bedrock = fine_elevation[i] - parent.soil_depth;
                cell.in_basin_fine = fine_mask.map_or(true, |m| m[i]);
            } else {
                cell.bedrock = fine_elevation[i];
            }
        }

        Ok(Self { config, coarse, fine })
    }

    #[inline]
    pub fn fine_rows(&self) -> usize {
        self.config.fine_rows()
    }

    #[inline]
    pub fn fine_cols(&self) -> usize {
        self.config.fine_cols()
    }

    #[inline]
    pub fn fine_index(&self, row: usize, col: usize) -> usize {
        row * self.fine_cols() + col
    }

    #[inline]
    pub fn fine_at(&self, row: usize, col: usize) -> &FineCell {
        &self.fine[self.fine_index(row, col)]
    }

    #[inline]
    pub fn fine_at_mut(&mut self, row: usize, col: usize) -> &mut FineCell {
        let i = self.fine_index(row, col);
        &mut self.fine[i]
    }

    #[inline]
    pub fn coarse_at(&self, row: usize, col: usize) -> &CoarseCell {
        &self.coarse[row * self.config.coarse_cols + col]
    }

    /// Parent coarse cell of a fine cell.
    #[inline]
    pub fn parent_of(&self, fine_row: usize, fine_col: usize) -> &CoarseCell {
        let (cr, cc) = self.config.coarse_of(fine_row, fine_col);
        self.coarse_at(cr, cc)
    }

    /// `true` when the fine cell's parent coarse cell is inside the basin.
    #[inline]
    pub fn in_coarse_basin(&self, fine_row: usize, fine_col: usize) -> bool {
        self.parent_of(fine_row, fine_col).in_basin
    }

    /// Neighbour at `(row + dr, col + dc)` if it lies on the fine raster.
    #[inline]
    pub fn offset(&self, row: usize, col: usize, dr: isize, dc: isize) -> Option<(usize, usize)> {
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr >= self.fine_rows() as isize || nc >= self.fine_cols() as isize {
            None
        } else {
            Some((nr as usize, nc as usize))
        }
    }

    /// In-basin fine cells in the fixed scan order: coarse cells row-major,
    /// then the fine block of each row-major.
    pub fn scan_order(&self) -> Vec<(usize, usize)> {
        let cfg = self.config;
        let mut order = Vec::with_capacity(self.fine.len());
        for cr in 0..cfg.coarse_rows {
            for cc in 0..cfg.coarse_cols {
                if self.coarse_at(cr, cc).in_basin {
                    order.extend(cfg.fine_block(cr, cc));
                }
            }
        }
        order
    }

    /// Sediment thickness of every fine cell, row-major.
    pub fn sediment_snapshot(&self) -> Vec<f64> {
        self.fine.iter().map(|c| c.sediment).collect()
    }

    /// Total sediment volume on the raster (m³).
    pub fn total_sediment_volume(&self) -> f64 {
        self.fine.iter().map(|c| c.sediment).sum::<f64>() * self.config.fine_cell_area()
    }

    /// Zero the per-run output fields of every fine cell.
    pub fn clear_outputs(&mut self) {
        for cell in &mut self.fine {
            cell.failure_probability = 0.0;
            cell.mass_wasted_depth = 0.0;
            cell.mass_deposited_depth = 0.0;
            cell.sediment_delivered_to_channel = 0.0;
        }
    }

    /// Fill `CoarseCell::ordered_fine` from the current topographic index.
    pub fn order_by_topographic_index(&mut self) {
        let cfg = self.config;
        let cols = cfg.fine_cols();
        for cr in 0..cfg.coarse_rows {
            for cc in 0..cfg.coarse_cols {
                let ci = cr * cfg.coarse_cols + cc;
                if !self.coarse[ci].in_basin {
                    continue;
                }
                let mut order: Vec<usize> = cfg.fine_block(cr, cc).map(|(r, c)| r * cols + c).collect();
                order.sort_by(|&a, &b| {
                    self.fine[b]
                        .topographic_index
                        .partial_cmp(&self.fine[a].topographic_index)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                self.coarse[ci].ordered_fine = order;
            }
        }
    }
}
