//! Monte-Carlo driver.
//!
//! Every iteration starts from the same baseline raster, runs the scan on a
//! private copy with its own parameter sampler, and is folded into the run
//! accumulators in iteration order.  Segment deliveries stay in private
//! buffers until the end of the run and reach the channel sub-model once,
//! already normalized.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use crate::channel::{ChannelMap, ChannelNetwork, SedimentBuffers};
use crate::config::MassWastingParams;
use crate::debris::{try_initiate, EventContext, EventOutcome};
use crate::error::{try_alloc, MassWastingError, Result};
use crate::grid::Terrain;
use crate::stability::{ParameterSampler, PropertyTables};
use crate::summary::RunSummary;

/// Cooperative cancellation flag, checked before each iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Event tallies summed over all iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub iterations: usize,
    pub events: usize,
    pub sink_stopped: usize,
    pub boundary_escapes: usize,
    pub deposited: usize,
    pub delivered: usize,
    /// Cells that failed, summed over events.
    pub failed_cells: usize,
}

impl RunStats {
    fn record(&mut self, outcome: &EventOutcome, failed_cells: usize) {
        self.events += 1;
        self.failed_cells += failed_cells;
        match outcome {
            EventOutcome::SinkStopped { .. } => self.sink_stopped += 1,
            EventOutcome::BasinBoundaryEscape { .. } => self.boundary_escapes += 1,
            EventOutcome::Deposited { .. } => self.deposited += 1,
            EventOutcome::Delivered { .. } => self.delivered += 1,
        }
    }

    fn merge(&mut self, other: &Self) {
        self.iterations += other.iterations;
        self.events += other.events;
        self.sink_stopped += other.sink_stopped;
        self.boundary_escapes += other.boundary_escapes;
        self.deposited += other.deposited;
        self.delivered += other.delivered;
        self.failed_cells += other.failed_cells;
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub summary: RunSummary,
    /// Mean per-segment delivery, indexed by network arena index.
    pub segment_sediment: SedimentBuffers,
    pub stats: RunStats,
}

/// Raster state left behind by one iteration.
struct Iteration {
    failed: Vec<bool>,
    sediment: Vec<f64>,
    delivered: Vec<f64>,
    buffers: SedimentBuffers,
    stats: RunStats,
}

struct Accumulator {
    probability: Vec<f64>,
    sediment: Vec<f64>,
    delivered: Vec<f64>,
    buffers: SedimentBuffers,
    stats: RunStats,
}

impl Accumulator {
    fn new(cells: usize, segments: usize, classes: usize) -> Result<Self> {
        Ok(Self {
            probability: try_alloc("failure probability", cells, 0.0)?,
            sediment: try_alloc("sediment sum", cells, 0.0)?,
            delivered: try_alloc("channel delivery sum", cells, 0.0)?,
            buffers: SedimentBuffers::new(segments, classes)?,
            stats: RunStats::default(),
        })
    }

    fn fold(&mut self, it: Iteration) {
        for (p, f) in self.probability.iter_mut().zip(&it.failed) {
            if *f {
                *p += 1.0;
            }
        }
        for (a, s) in self.sediment.iter_mut().zip(&it.sediment) {
            *a += s;
        }
        for (a, d) in self.delivered.iter_mut().zip(&it.delivered) {
            *a += d;
        }
        self.buffers.merge(&it.buffers);
        self.stats.merge(&it.stats);
    }
}

/// Read-only inputs shared by every iteration.
struct Plan<'a> {
    baseline: &'a Terrain,
    scan: Vec<(usize, usize)>,
    ctx: EventContext<'a>,
    segments: usize,
    classes: usize,
    seed: u64,
}

impl<'a> Plan<'a> {
    fn new(
        baseline: &'a Terrain,
        tables: &'a PropertyTables,
        network: &'a ChannelNetwork,
        channels: &'a ChannelMap,
        params: &'a MassWastingParams,
    ) -> Self {
        Self {
            scan: baseline.scan_order(),
            baseline,
            ctx: EventContext::new(tables, network, channels, params),
            segments: network.len(),
            classes: params.size_classes(),
            seed: params.seed,
        }
    }

    /// Fold iterations `0..n` one after another.
    #[cfg_attr(feature = "threading", allow(dead_code))]
    fn run_in_order(&self, n: usize, cancel: &CancelToken, acc: &mut Accumulator) -> Result<()> {
        for iteration in 0..n {
            if cancel.is_cancelled() {
                return Err(MassWastingError::Cancelled { completed: iteration });
            }
            acc.fold(self.run_iteration(iteration)?);
        }
        Ok(())
    }

    /// Run one chunk of iterations per worker at a time, folding each chunk
    /// in iteration order.
    #[cfg(feature = "threading")]
    fn run_in_chunks(&self, n: usize, cancel: &CancelToken, acc: &mut Accumulator) -> Result<()> {
        use rayon::prelude::*;

        let chunk = rayon::current_num_threads().max(1);
        let mut next = 0;
        while next < n {
            if cancel.is_cancelled() {
                return Err(MassWastingError::Cancelled { completed: next });
            }
            let end = (next + chunk).min(n);
            let results = (next..end)
                .into_par_iter()
                .map(|iteration| self.run_iteration(iteration))
                .collect::<Result<Vec<_>>>()?;
            for it in results {
                acc.fold(it);
            }
            next = end;
        }
        Ok(())
    }

    fn run_iteration(&self, iteration: usize) -> Result<Iteration> {
        let mut terrain = self.baseline.clone();
        let mut sampler = ParameterSampler::for_iteration(self.seed, iteration);
        let mut failed = try_alloc("failure markers", terrain.fine.len(), false)?;
        let mut buffers = SedimentBuffers::new(self.segments, self.classes)?;
        let mut stats = RunStats { iterations: 1, ..Default::default() };

        for &cell in &self.scan {
            if let Some(event) = try_initiate(&mut terrain, cell, &self.ctx, &mut sampler, &mut failed, &mut buffers)? {
                stats.record(&event.outcome, event.failed_cells.len());
            }
        }
        debug!(
            "iteration {iteration}: {} failures, {:.2} m3 to channels",
            stats.events,
            buffers.total_volume()
        );

        Ok(Iteration {
            failed,
            sediment: terrain.sediment_snapshot(),
            delivered: terrain.fine.iter().map(|c| c.sediment_delivered_to_channel).collect(),
            buffers,
            stats,
        })
    }
}

/// Run `params.iterations` Monte-Carlo iterations and write the normalized
/// results onto `terrain`.
///
/// On return each fine cell's sediment is the iteration mean, and the
/// output fields hold probability, mean wasted and deposited depth, and
/// mean channel delivery.  Nothing is pushed into the channel network; see
/// [`run_mass_wasting`].  On error (including cancellation) `terrain` is
/// left untouched.
pub fn simulate(
    label: &str,
    terrain: &mut Terrain,
    tables: &PropertyTables,
    network: &ChannelNetwork,
    channels: &ChannelMap,
    params: &MassWastingParams,
    cancel: &CancelToken,
) -> Result<RunOutput> {
    let n = params.effective_iterations();
    let mut baseline = terrain.clone();
    baseline.clear_outputs();

    let plan = Plan::new(&baseline, tables, network, channels, params);
    let mut acc = Accumulator::new(baseline.fine.len(), plan.segments, plan.classes)?;

    #[cfg(not(feature = "threading"))]
    plan.run_in_order(n, cancel, &mut acc)?;
    #[cfg(feature = "threading")]
    plan.run_in_chunks(n, cancel, &mut acc)?;

    let inv = 1.0 / n as f64;
    let mut failed_cells = 0;
    let mut likely_failed_cells = 0;
    for (i, cell) in terrain.fine.iter_mut().enumerate() {
        let initial = baseline.fine[i].sediment;
        let mean = acc.sediment[i] * inv;
        cell.failure_probability = acc.probability[i] * inv;
        cell.sediment = mean;
        cell.mass_wasted_depth = (initial - mean).max(0.0);
        cell.mass_deposited_depth = (mean - initial).max(0.0);
        cell.sediment_delivered_to_channel = acc.delivered[i] * inv;
        if cell.failure_probability > 0.0 {
            failed_cells += 1;
        }
        if cell.failure_probability > params.failure_probability_threshold {
            likely_failed_cells += 1;
        }
    }
    acc.buffers.scale(inv);

    let events = acc.stats.events;
    let summary = RunSummary {
        label: label.to_owned(),
        avg_failures: events as f64 * inv,
        avg_cells_per_failure: if events > 0 { failed_cells as f64 / events as f64 } else { 0.0 },
        likely_failed_cells,
    };
    Ok(RunOutput { summary, segment_sediment: acc.buffers, stats: acc.stats })
}

/// [`simulate`], then push the normalized segment deliveries into the
/// network's temporary sediment buffers.
pub fn run_mass_wasting(
    label: &str,
    terrain: &mut Terrain,
    tables: &PropertyTables,
    network: &mut ChannelNetwork,
    channels: &ChannelMap,
    params: &MassWastingParams,
    cancel: &CancelToken,
) -> Result<RunOutput> {
    let output = simulate(label, terrain, tables, network, channels, params, cancel)?;
    output.segment_sediment.flush_into(&network.ids(), network)?;
    info!(
        "{:.4} failures; {:.4} cells per failure; {} cells have failure likelihood > {:.2}",
        output.summary.avg_failures,
        output.summary.avg_cells_per_failure,
        output.summary.likely_failed_cells,
        params.failure_probability_threshold
    );
    Ok(output)
}
