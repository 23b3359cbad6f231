//! Eight-neighbour steepest descent on the fine grid.
//!
//! The flow direction is chosen on the bedrock surface (failures slide along
//! the bedrock plane, so back-tracking cannot occur), then the slope is
//! measured on the soil surface in that direction.  A negative soil-surface
//! slope marks a sink.
use crate::grid::Terrain;

/// Neighbour offsets `(d_row, d_col)`, counter-clockwise from south-west.
/// Row index grows southward.
pub const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
];

/// Compass bearing (degrees, north = 0, clockwise) toward each neighbour.
pub const NEIGHBOR_ASPECT_DEG: [f64; 8] = [225.0, 180.0, 135.0, 90.0, 45.0, 0.0, 315.0, 270.0];

#[inline]
pub fn is_diagonal(n: usize) -> bool {
    n % 2 == 0
}

/// Horizontal distance to neighbour `n` for an isotropic cell size.
#[inline]
pub fn neighbor_distance(n: usize, cellsize: f64) -> f64 {
    if is_diagonal(n) {
        cellsize * std::f64::consts::SQRT_2
    } else {
        cellsize
    }
}

/// Local flow geometry leaving one fine cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Descent {
    /// Soil-surface slope toward `next` (degrees); negative for a sink.
    pub slope_deg: f64,
    /// Bearing of the flow direction (radians, north = 0, clockwise).
    pub aspect: f64,
    /// Downslope neighbour.
    pub next: (usize, usize),
}

impl Descent {
    #[inline]
    pub fn is_sink(&self) -> bool {
        self.slope_deg < 0.0
    }
}

/// Steepest descent from `(row, col)`.
///
/// Neighbours off the raster are ignored; ties keep the first neighbour in
/// [`NEIGHBOR_OFFSETS`] order.  Returns `None` only when the cell has no
/// neighbour at all (a 1×1 raster), which callers treat as a sink.
pub fn steepest_descent(terrain: &Terrain, row: usize, col: usize) -> Option<Descent> {
    let cs = terrain.config.dmass;
    let here = terrain.fine_at(row, col);

    let mut best: Option<(usize, (usize, usize), f64)> = None;
    for (n, &(dr, dc)) in NEIGHBOR_OFFSETS.iter().enumerate() {
        let Some((nr, nc)) = terrain.offset(row, col, dr, dc) else {
            continue;
        };
        let dist = neighbor_distance(n, cs);
        let bedrock_slope = ((here.bedrock - terrain.fine_at(nr, nc).bedrock) / dist).atan();
        if best.map_or(true, |(_, _, s)| bedrock_slope > s) {
            best = Some((n, (nr, nc), bedrock_slope));
        }
    }

    best.map(|(n, next, _)| {
        let dist = neighbor_distance(n, cs);
        let there = terrain.fine_at(next.0, next.1);
        let slope_deg = ((here.soil_surface() - there.soil_surface()) / dist).atan().to_degrees();
        Descent {
            slope_deg,
            aspect: NEIGHBOR_ASPECT_DEG[n].to_radians(),
            next,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::grid::{CoarseCell, Terrain};

    fn make_terrain(rows: usize, cols: usize, elev: impl Fn(usize, usize) -> f64) -> Terrain {
        let cfg = GridConfig::new(1, 1, cols as f64 * 10.0, rows as f64 * 10.0, 10.0).unwrap();
        let coarse = vec![CoarseCell { in_basin: true, soil_depth: 1.0, ..Default::default() }];
        let dem: Vec<f64> = (0..rows * cols).map(|i| elev(i / cols, i % cols)).collect();
        Terrain::new(cfg, coarse, &dem, None).unwrap()
    }

    #[test]
    fn south_facing_ramp_descends_south() {
        // Elevation drops by 10 m per row going south (increasing row).
        let t = make_terrain(5, 5, |r, _| 100.0 - 10.0 * r as f64);
        let d = steepest_descent(&t, 2, 2).unwrap();
        assert_eq!(d.next, (3, 2));
        assert!((d.aspect - std::f64::consts::PI).abs() < 1e-12);
        assert!((d.slope_deg - 45.0).abs() < 1e-9, "slope {}", d.slope_deg);
    }

    #[test]
    fn east_facing_ramp_has_aspect_90() {
        let t = make_terrain(5, 5, |_, c| 50.0 - 2.0 * c as f64);
        let d = steepest_descent(&t, 2, 2).unwrap();
        assert_eq!(d.next, (2, 3));
        assert!((d.aspect.to_degrees() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn pit_is_a_sink() {
        let t = make_terrain(3, 3, |r, c| if (r, c) == (1, 1) { 90.0 } else { 100.0 });
        let d = steepest_descent(&t, 1, 1).unwrap();
        assert!(d.is_sink(), "pit slope {} should be negative", d.slope_deg);
    }

    #[test]
    fn diagonal_distance_is_used() {
        // Only the south-east neighbour is lower.
        let t = make_terrain(3, 3, |r, c| if (r, c) == (2, 2) { 90.0 } else { 100.0 });
        let d = steepest_descent(&t, 1, 1).unwrap();
        assert_eq!(d.next, (2, 2));
        let expected = (10.0 / (10.0 * std::f64::consts::SQRT_2)).atan().to_degrees();
        assert!((d.slope_deg - expected).abs() < 1e-9);
    }

    #[test]
    fn single_cell_raster_has_no_descent() {
        let t = make_terrain(1, 1, |_, _| 10.0);
        assert!(steepest_descent(&t, 0, 0).is_none());
    }
}
