//! Topographic index `ln(a / tanβ)` on the fine grid.
//!
//! Multiple-flow-direction accumulation after Wolock & McCabe (1995): cells
//! are visited once, highest first, and each pushes its contributing area
//! onto every lower neighbour in proportion to the contour-weighted slope
//! toward it.  Diagonal neighbours get a contour length of 0.4·cellsize,
//! orthogonal ones 0.6·cellsize.
//!
//! Neighbours whose parent coarse cell is outside the basin (or that fall off
//! the raster) are treated as level with the current cell, so no area leaves
//! across the basin edge.  The fine mask is ignored here.
use super::descent::{is_diagonal, neighbor_distance, NEIGHBOR_OFFSETS};
use crate::grid::Terrain;

const DIAGONAL_CONTOUR: f64 = 0.4;
const ORTHOGONAL_CONTOUR: f64 = 0.6;

/// Compute the index for every fine cell inside the coarse basin mask.
///
/// Returns a row-major vector; cells outside the basin hold 0.0.
pub fn compute_topographic_index(terrain: &Terrain, vertical_resolution: f64) -> Vec<f64> {
    let rows = terrain.fine_rows();
    let cols = terrain.fine_cols();
    let cs = terrain.config.dmass;
    let diagonal = neighbor_distance(0, cs);

    let mut order: Vec<usize> = (0..rows * cols)
        .filter(|&i| terrain.in_coarse_basin(i / cols, i % cols))
        .collect();
    order.sort_by(|&a, &b| {
        terrain.fine[b]
            .elevation
            .partial_cmp(&terrain.fine[a].elevation)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut area = vec![0.0f64; rows * cols];
    let mut tan_beta = vec![0.0f64; rows * cols];
    for &i in &order {
        area[i] = cs * cs;
    }

    // Flat-area fallback: half the vertical resolution over each neighbour
    // distance, summed over all eight neighbours.
    let flat_tan_beta = 4.0 * (0.5 * vertical_resolution / diagonal) + 4.0 * (0.5 * vertical_resolution / cs);

    let mut delta_a = [0.0f64; 8];
    let mut downslope: [Option<usize>; 8] = [None; 8];

    for &i in &order {
        let r = i / cols;
        let c = i % cols;
        let celev = terrain.fine[i].elevation;

        for (n, &(dr, dc)) in NEIGHBOR_OFFSETS.iter().enumerate() {
            downslope[n] = None;
            delta_a[n] = 0.0;
            let Some((nr, nc)) = terrain.offset(r, c, dr, dc) else {
                continue;
            };
            if !terrain.in_coarse_basin(nr, nc) {
                continue;
            }
            let j = nr * cols + nc;
            let nelev = terrain.fine[j].elevation;
            if nelev < celev {
                let weight = if is_diagonal(n) { DIAGONAL_CONTOUR } else { ORTHOGONAL_CONTOUR } * cs;
                let slope = (celev - nelev) / neighbor_distance(n, cs);
                tan_beta[i] += slope * weight;
                delta_a[n] = area[i] * slope * weight;
                downslope[n] = Some(j);
            }
        }

        if downslope.iter().all(Option::is_none) {
            tan_beta[i] = flat_tan_beta;
            continue;
        }

        for n in 0..8 {
            if let Some(j) = downslope[n] {
                area[j] += delta_a[n] / tan_beta[i];
            }
        }
    }

    let mut index = vec![0.0f64; rows * cols];
    for &i in &order {
        index[i] = (area[i] / tan_beta[i]).ln();
    }
    index
}

/// Compute the index, store it on every fine cell and rebuild each coarse
/// cell's descending-index ordering.
pub fn apply_topographic_index(terrain: &mut Terrain, vertical_resolution: f64) {
    let index = compute_topographic_index(terrain, vertical_resolution);
    for (cell, ti) in terrain.fine.iter_mut().zip(index) {
        cell.topographic_index = ti;
    }
    terrain.order_by_topographic_index();
}
