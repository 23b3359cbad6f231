//! Failure propagation down the steepest-descent path.
//!
//! ```text
//! Stable ─► Failed ─► Propagating ─┬─► SinkStopped
//!                                  ├─► Runout
//!                                  └─► Escaped
//! ```
//!
//! A failed cell loses its whole sediment column, which is carried to the
//! next cell downslope and added there before that cell is tested.  Cells
//! in a coarse cell holding a channel are never tested; the debris stops
//! there and is handed to runout.
use log::warn;

use super::EventContext;
use crate::error::Result;
use crate::grid::Terrain;
use crate::hydrology::descent::{steepest_descent, Descent};
use crate::stability::ParameterSampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    Stable,
    Failed,
    Propagating,
    /// Carried sediment came to rest in a closed depression.
    SinkStopped,
    /// Propagation halted; the halt cell starts the runout.
    Runout,
    /// Propagation would have left the basin.
    Escaped,
}

/// End of the propagation phase of one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    pub state: CascadeState,
    /// Cells that failed, in failure order.
    pub failed_cells: Vec<(usize, usize)>,
    /// Sediment depth in motion when propagation ended (m).  For a sink
    /// or an escape it has already been put back on the raster.
    pub carried: f64,
    /// Runout head, sink cell, or the cell the debris was returned to.
    pub halt: (usize, usize),
    /// Flow geometry leaving `halt`, when it has any.
    pub descent: Option<Descent>,
    /// Bearing of the last step taken (radians).
    pub incoming_aspect: f64,
}

/// Propagate a failure starting at `origin`, which has already failed its
/// stability test.  Marks every failed cell in `failed`.
pub fn propagate_failure(
    terrain: &mut Terrain,
    origin: (usize, usize),
    ctx: &EventContext<'_>,
    sampler: &mut ParameterSampler,
    failed: &mut [bool],
) -> Result<Cascade> {
    let cols = terrain.fine_cols();
    let idx = |(r, c): (usize, usize)| r * cols + c;

    let mut cur = origin;
    // Geometry is taken before the column is stripped.
    let mut descent = steepest_descent(terrain, cur.0, cur.1);
    let mut incoming_aspect = descent.map_or(0.0, |d| d.aspect);

    let mut failed_cells = vec![origin];
    failed[idx(origin)] = true;
    let mut carried = std::mem::take(&mut terrain.fine[idx(origin)].sediment);

    if ctx.has_channel(terrain, cur) {
        return finish(CascadeState::Runout, failed_cells, carried, cur, descent, incoming_aspect);
    }

    loop {
        let d = match descent {
            Some(d) if !d.is_sink() => d,
            _ => {
                // A failed cell with nowhere to go keeps its own debris.
                terrain.fine[idx(cur)].sediment += carried;
                return finish(CascadeState::SinkStopped, failed_cells, carried, cur, descent, incoming_aspect);
            }
        };
        let next = d.next;
        incoming_aspect = d.aspect;

        if !terrain.in_coarse_basin(next.0, next.1) {
            warn!(
                "failure at ({}, {}) would propagate outside the basin to ({}, {}); depositing {carried:.3} m in place",
                cur.0, cur.1, next.0, next.1
            );
            terrain.fine[idx(cur)].sediment += carried;
            // The debris never left, so the cell no longer counts as failed.
            failed[idx(cur)] = false;
            failed_cells.retain(|&c| c != cur);
            return finish(CascadeState::Escaped, failed_cells, carried, cur, descent, incoming_aspect);
        }

        if failed_cells.contains(&next) {
            terrain.fine[idx(cur)].sediment += carried;
            return finish(CascadeState::SinkStopped, failed_cells, carried, cur, descent, incoming_aspect);
        }

        if ctx.has_channel(terrain, next) {
            let head_descent = steepest_descent(terrain, next.0, next.1);
            return finish(CascadeState::Runout, failed_cells, carried, next, head_descent, incoming_aspect);
        }

        terrain.fine[idx(next)].sediment += carried;
        let next_descent = steepest_descent(terrain, next.0, next.1);
        let Some(nd) = next_descent.filter(|nd| !nd.is_sink()) else {
            // The carried debris stays in the depression.
            return finish(CascadeState::SinkStopped, failed_cells, carried, next, next_descent, incoming_aspect);
        };

        let parent = terrain.parent_of(next.0, next.1);
        let (soil, veg, snow) = (parent.soil_type, parent.veg_type, parent.snow_load);
        let cell = &terrain.fine[idx(next)];
        let fs = ctx
            .evaluator
            .safety_factor(nd.slope_deg, soil, cell.sediment, veg, cell.saturated_thickness, snow, sampler)?;

        if ctx.evaluator.is_failure(fs) {
            failed[idx(next)] = true;
            failed_cells.push(next);
            carried = std::mem::take(&mut terrain.fine[idx(next)].sediment);
            cur = next;
            descent = next_descent;
        } else {
            terrain.fine[idx(next)].sediment -= carried;
            let head_descent = steepest_descent(terrain, next.0, next.1);
            return finish(CascadeState::Runout, failed_cells, carried, next, head_descent, incoming_aspect);
        }
    }
}

fn finish(
    state: CascadeState,
    failed_cells: Vec<(usize, usize)>,
    carried: f64,
    halt: (usize, usize),
    descent: Option<Descent>,
    incoming_aspect: f64,
) -> Result<Cascade> {
    Ok(Cascade { state, failed_cells, carried, halt, descent, incoming_aspect })
}
