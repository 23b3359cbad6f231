//! One failure event: initiation test, cascade, runout and channel delivery.
pub mod cascade;
pub mod runout;

use log::debug;

pub use cascade::{propagate_failure, Cascade, CascadeState};
pub use runout::{redistribute, trace_runout, RunoutEnd, RunoutPath};

use crate::channel::{ChannelInjector, ChannelMap, ChannelNetwork, SedimentBuffers};
use crate::config::MassWastingParams;
use crate::error::Result;
use crate::grid::Terrain;
use crate::hydrology::descent::steepest_descent;
use crate::stability::{ParameterSampler, PropertyTables, StabilityEvaluator};

/// Read-only collaborators shared by every event in a run.
pub struct EventContext<'a> {
    pub evaluator: StabilityEvaluator<'a>,
    pub channels: &'a ChannelMap,
    pub injector: ChannelInjector<'a>,
    pub params: &'a MassWastingParams,
}

impl<'a> EventContext<'a> {
    pub fn new(
        tables: &'a PropertyTables,
        network: &'a ChannelNetwork,
        channels: &'a ChannelMap,
        params: &'a MassWastingParams,
    ) -> Self {
        Self {
            evaluator: StabilityEvaluator::new(tables, params),
            channels,
            injector: ChannelInjector::new(network, channels, params),
            params,
        }
    }

    /// `true` when the fine cell's coarse cell holds any channel.
    #[inline]
    pub fn has_channel(&self, terrain: &Terrain, (row, col): (usize, usize)) -> bool {
        let (cr, cc) = terrain.config.coarse_of(row, col);
        self.channels.has_channel(cr, cc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventOutcome {
    /// Debris came to rest in a closed depression at `cell`.
    SinkStopped { cell: (usize, usize) },
    /// Debris would have left the basin; it was left at `cell`.
    BasinBoundaryEscape { cell: (usize, usize) },
    /// Debris was shared over `cells` runout cells.
    Deposited { cells: usize },
    /// `volume` m³ entered the channel network from `cell`.
    Delivered { cell: (usize, usize), volume: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebrisEvent {
    pub origin: (usize, usize),
    pub failed_cells: Vec<(usize, usize)>,
    /// Sediment set in motion (m³).
    pub mobilized_volume: f64,
    pub outcome: EventOutcome,
}

/// Test one fine cell for initiation and, if it fails, run the whole event.
///
/// Cells that already failed this iteration are skipped.
pub fn try_initiate(
    terrain: &mut Terrain,
    (row, col): (usize, usize),
    ctx: &EventContext<'_>,
    sampler: &mut ParameterSampler,
    failed: &mut [bool],
    buffers: &mut SedimentBuffers,
) -> Result<Option<DebrisEvent>> {
    let i = terrain.fine_index(row, col);
    if failed[i] {
        return Ok(None);
    }
    let Some(descent) = steepest_descent(terrain, row, col) else {
        return Ok(None);
    };
    let cell = &terrain.fine[i];
    if !ctx.evaluator.is_initiation_candidate(cell, descent.slope_deg) {
        return Ok(None);
    }

    let parent = terrain.parent_of(row, col);
    let fs = ctx.evaluator.safety_factor(
        descent.slope_deg,
        parent.soil_type,
        cell.sediment,
        parent.veg_type,
        cell.saturated_thickness,
        parent.snow_load,
        sampler,
    )?;
    if !ctx.evaluator.is_failure(fs) {
        return Ok(None);
    }
    run_failure_event(terrain, (row, col), ctx, sampler, failed, buffers).map(Some)
}

/// Cascade, runout and delivery for a cell that has just failed.
pub fn run_failure_event(
    terrain: &mut Terrain,
    origin: (usize, usize),
    ctx: &EventContext<'_>,
    sampler: &mut ParameterSampler,
    failed: &mut [bool],
    buffers: &mut SedimentBuffers,
) -> Result<DebrisEvent> {
    let cascade = propagate_failure(terrain, origin, ctx, sampler, failed)?;
    let mobilized_volume = cascade.carried * terrain.config.fine_cell_area();

    let outcome = match cascade.state {
        CascadeState::SinkStopped => EventOutcome::SinkStopped { cell: cascade.halt },
        CascadeState::Escaped => EventOutcome::BasinBoundaryEscape { cell: cascade.halt },
        _ => {
            let path = trace_runout(terrain, cascade.halt, cascade.descent, cascade.incoming_aspect, ctx);
            let tail = path.tail().unwrap_or(cascade.halt);
            let cells = path.cells.len();
            let end = path.end;
            let delivered = redistribute(terrain, path, cascade.carried);
            match end {
                RunoutEnd::Channel { aspect } => {
                    let (cr, cc) = terrain.config.coarse_of(tail.0, tail.1);
                    ctx.injector.inject(delivered, cr, cc, aspect, buffers)?;
                    EventOutcome::Delivered { cell: tail, volume: delivered }
                }
                RunoutEnd::Escaped => EventOutcome::BasinBoundaryEscape { cell: tail },
                RunoutEnd::Stopped => EventOutcome::Deposited { cells },
            }
        }
    };

    debug!(
        "failure at ({}, {}): {} cells failed, {mobilized_volume:.2} m3 mobilized, {outcome:?}",
        origin.0,
        origin.1,
        cascade.failed_cells.len()
    );
    Ok(DebrisEvent { origin, failed_cells: cascade.failed_cells, mobilized_volume, outcome })
}
