//! Runout path tracing and sediment redistribution.
//!
//! From the halt cell the debris keeps moving downslope while the soil
//! surface is steeper than the runout-stop slope, the current coarse cell
//! holds no channel, and the next cell is in the basin.  Every visited cell
//! joins a FIFO; the mobilized depth is then shared evenly along it, unless
//! the walk ended in a channel cell, which takes the whole volume.
use std::collections::VecDeque;

use log::warn;

use super::EventContext;
use crate::grid::Terrain;
use crate::hydrology::descent::{steepest_descent, Descent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunoutEnd {
    /// Slope fell to the stop threshold (or the path hit a pit).
    Stopped,
    /// The last cell's coarse cell holds a channel.
    Channel { aspect: f64 },
    /// The next step would have left the basin.
    Escaped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunoutPath {
    pub cells: VecDeque<(usize, usize)>,
    pub end: RunoutEnd,
}

impl RunoutPath {
    /// Last cell of the path.
    pub fn tail(&self) -> Option<(usize, usize)> {
        self.cells.back().copied()
    }
}

/// Trace the runout from `head`.  `head_descent` is the flow leaving the
/// head; `incoming_aspect` stands in for it when the head has none.
pub fn trace_runout(
    terrain: &Terrain,
    head: (usize, usize),
    head_descent: Option<Descent>,
    incoming_aspect: f64,
    ctx: &EventContext<'_>,
) -> RunoutPath {
    let stop_slope = ctx.params.runout_stop_slope_deg;
    let mut cells = VecDeque::from([head]);
    let mut cur = head;
    let mut descent = head_descent;
    let mut aspect = head_descent.map_or(incoming_aspect, |d| d.aspect);

    let end = loop {
        if ctx.has_channel(terrain, cur) {
            break RunoutEnd::Channel { aspect };
        }
        let Some(d) = descent else {
            break RunoutEnd::Stopped;
        };
        if d.slope_deg <= stop_slope {
            break RunoutEnd::Stopped;
        }
        let next = d.next;
        if !terrain.in_coarse_basin(next.0, next.1) {
            warn!(
                "runout from ({}, {}) would leave the basin at ({}, {}); ending at ({}, {})",
                head.0, head.1, next.0, next.1, cur.0, cur.1
            );
            break RunoutEnd::Escaped;
        }
        cells.push_back(next);
        cur = next;
        descent = steepest_descent(terrain, next.0, next.1);
        aspect = descent.map_or(d.aspect, |nd| nd.aspect);
    };

    RunoutPath { cells, end }
}

/// Consume the path: share `depth` (m) evenly over its cells, or credit the
/// whole volume to the channel cell at its tail.  Returns the volume (m³)
/// handed to the channel network.
pub fn redistribute(terrain: &mut Terrain, mut path: RunoutPath, depth: f64) -> f64 {
    let area = terrain.config.fine_cell_area();
    if let RunoutEnd::Channel { .. } = path.end {
        let volume = depth * area;
        if let Some((r, c)) = path.tail() {
            terrain.fine_at_mut(r, c).sediment_delivered_to_channel += volume;
        }
        return volume;
    }

    let share = depth / path.cells.len() as f64;
    while let Some((r, c)) = path.cells.pop_front() {
        terrain.fine_at_mut(r, c).sediment += share;
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debris::tests::make_ramp_with_apron;

    #[test]
    fn trace_stops_above_the_gentle_apron() {
        let mut basin = make_ramp_with_apron();
        let (terrain, ctx) = basin.split();
        let head_descent = steepest_descent(terrain, 1, 1);

        let path = trace_runout(terrain, (1, 1), head_descent, 0.0, &ctx);

        assert_eq!(path.end, RunoutEnd::Stopped);
        assert_eq!(Vec::from(path.cells.clone()), vec![(1, 1), (2, 1), (3, 1), (4, 1)]);
        assert_eq!(path.tail(), Some((4, 1)));
    }

    #[test]
    fn channel_end_keeps_the_raster_unchanged() {
        let mut basin = make_ramp_with_apron();
        let (terrain, _) = basin.split();
        let before = terrain.sediment_snapshot();
        let path = RunoutPath {
            cells: VecDeque::from([(3, 1), (4, 1)]),
            end: RunoutEnd::Channel { aspect: std::f64::consts::PI },
        };

        let delivered = redistribute(terrain, path, 0.5);

        assert_eq!(delivered, 50.0);
        assert_eq!(terrain.sediment_snapshot(), before);
        assert_eq!(terrain.fine_at(4, 1).sediment_delivered_to_channel, 50.0);
        assert_eq!(terrain.fine_at(3, 1).sediment_delivered_to_channel, 0.0);
    }
}
