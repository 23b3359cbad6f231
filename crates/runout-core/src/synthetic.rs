//! Small procedurally-built scenarios for tests, benchmarks and the CLI's
//! `--synthetic` mode.
//!
//! Every builder returns a [`Scenario`], so callers can tweak fields before
//! calling [`Scenario::build`].
use std::f64::consts::PI;

use crate::channel::{ChannelCellRecord, SegmentId, SegmentSpec};
use crate::config::{GridConfig, MassWastingParams};
use crate::grid::CoarseCell;
use crate::scenario::Scenario;
use crate::stability::{Distribution, PropertyTables, SoilProperties, VegetationProperties};

/// Longitudinal gradient of the synthetic valley floor.
const VALLEY_FLOOR_SLOPE_DEG: f64 = 5.0;

/// One soil and one vegetation class with mid-range geotechnical values.
///
/// Central values: cohesion 0.5 kPa, friction 40°, no root cohesion and no
/// surcharge.
pub fn reference_tables() -> PropertyTables {
    PropertyTables {
        soils: vec![SoilProperties {
            name: "loam".into(),
            cohesion: Distribution::Triangular { min: 0.0, mode: 0.5, max: 2.0 },
            friction_angle: Distribution::Normal { mean: 40.0, std_dev: 3.0 },
            saturated_density: 2000.0,
            dry_density: 1600.0,
            field_capacity: 0.2,
            ks_lat_exp: 3.0,
        }],
        vegetation: vec![VegetationProperties {
            name: "grass".into(),
            root_cohesion: Distribution::Uniform { min: 0.0, max: 0.0 },
            surcharge: Distribution::Uniform { min: 0.0, max: 0.0 },
        }],
    }
}

fn make_coarse(soil_depth: f64, water_table_depth: f64) -> CoarseCell {
    CoarseCell {
        in_basin: true,
        soil_depth,
        water_table_depth,
        soil_type: 0,
        veg_type: 0,
        ..Default::default()
    }
}

fn raster(rows: usize, cols: usize, elev: impl Fn(usize, usize) -> f64) -> Vec<f64> {
    (0..rows * cols).map(|i| elev(i / cols, i % cols)).collect()
}

/// A single dry coarse cell holding `rows × cols` fine cells with the given
/// elevation function.  Saturation starts at zero everywhere.
pub fn block(rows: usize, cols: usize, dmass: f64, soil_depth: f64, elev: impl Fn(usize, usize) -> f64) -> Scenario {
    Scenario {
        label: "block".into(),
        grid: GridConfig { coarse_rows: 1, coarse_cols: 1, dx: cols as f64 * dmass, dy: rows as f64 * dmass, dmass },
        coarse: vec![make_coarse(soil_depth, soil_depth)],
        elevation: raster(rows, cols, elev),
        fine_mask: None,
        saturated_thickness: Some(vec![0.0; rows * cols]),
        tables: reference_tables(),
        segments: Vec::new(),
        channel_map: Vec::new(),
        params: MassWastingParams::default(),
    }
}

/// An `n × n` inverted cone: the centre cell is a closed depression and the
/// walls rise at `slope_deg` (Chebyshev distance).  Fully saturated.
pub fn pit(n: usize, dmass: f64, slope_deg: f64, soil_depth: f64) -> Scenario {
    let centre = (n / 2) as isize;
    let rise = dmass * slope_deg.to_radians().tan();
    let mut s = block(n, n, dmass, soil_depth, |r, c| {
        let d = (r as isize - centre).abs().max((c as isize - centre).abs());
        100.0 + rise * d as f64
    });
    s.label = "pit".into();
    s.coarse[0].water_table_depth = 0.0;
    s.saturated_thickness = Some(vec![soil_depth; n * n]);
    s
}

/// A V-shaped valley draining south.  Hillslopes rise at `side_slope_deg`
/// on both sides of the centre fine column; the floor falls 5° per row.
///
/// The middle coarse column carries one channel segment per coarse row,
/// chained downstream; each segment also reaches into the next row, where
/// it meets its outlet.  The water table sits at a tenth of the soil depth
/// and saturation is derived from it.
pub fn valley(
    coarse_rows: usize,
    coarse_cols: usize,
    fine_per_coarse: usize,
    dmass: f64,
    side_slope_deg: f64,
    soil_depth: f64,
) -> Scenario {
    let size = fine_per_coarse as f64 * dmass;
    let fine_rows = coarse_rows * fine_per_coarse;
    let fine_cols = coarse_cols * fine_per_coarse;
    let mid = fine_cols / 2;
    let floor = VALLEY_FLOOR_SLOPE_DEG.to_radians().tan();
    let side = side_slope_deg.to_radians().tan();
    let elevation = raster(fine_rows, fine_cols, |r, c| {
        let across = (c as f64 - mid as f64).abs() * dmass * side;
        100.0 + (fine_rows - r) as f64 * dmass * floor + across
    });

    let channel_col = mid / fine_per_coarse;
    let segments = (0..coarse_rows)
        .map(|r| SegmentSpec {
            id: SegmentId(r as u32 + 1),
            outlet: (r + 1 < coarse_rows).then(|| SegmentId(r as u32 + 2)),
            slope: floor,
        })
        .collect();
    let record = |row: usize, seg: usize, sink: bool| ChannelCellRecord {
        row,
        col: channel_col,
        segment: SegmentId(seg as u32 + 1),
        length: size,
        aspect: PI,
        sink,
    };
    let mut channel_map = Vec::new();
    for r in 0..coarse_rows {
        channel_map.push(record(r, r, r + 1 == coarse_rows));
        if r > 0 {
            channel_map.push(record(r, r - 1, false));
        }
    }

    Scenario {
        label: "valley".into(),
        grid: GridConfig { coarse_rows, coarse_cols, dx: size, dy: size, dmass },
        coarse: vec![make_coarse(soil_depth, 0.1 * soil_depth); coarse_rows * coarse_cols],
        elevation,
        fine_mask: None,
        saturated_thickness: None,
        tables: reference_tables(),
        segments,
        channel_map,
        params: MassWastingParams::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::steepest_descent;

    #[test]
    fn reference_tables_validate() {
        let t = reference_tables();
        t.validate().unwrap();
        assert_eq!(t.soil(0).unwrap().friction_angle.central_value(), 40.0);
        assert_eq!(t.soil(0).unwrap().cohesion.central_value(), 0.5);
    }

    #[test]
    fn pit_centre_is_a_sink() {
        let basin = pit(5, 10.0, 20.0, 1.0).build().unwrap();
        let d = steepest_descent(&basin.terrain, 2, 2).unwrap();
        assert!(d.is_sink());
        assert!(basin.terrain.fine.iter().all(|c| c.saturated_thickness == c.sediment));
    }

    #[test]
    fn valley_hillslopes_drain_toward_the_channel() {
        let basin = valley(3, 3, 3, 10.0, 30.0, 1.0).build().unwrap();
        let t = &basin.terrain;
        assert_eq!(t.fine_cols(), 9);
        let west = steepest_descent(t, 4, 1).unwrap();
        assert!(west.next.1 > 1, "west slope flows east, got {:?}", west.next);
        let east = steepest_descent(t, 4, 7).unwrap();
        assert!(east.next.1 < 7, "east slope flows west, got {:?}", east.next);
        assert!(basin.channels.has_channel(1, 1));
        assert!(!basin.channels.has_channel(1, 0));
        // Segment 2 meets its outlet, segment 3, in coarse row 2.
        let s2 = basin.network.index_of(SegmentId(2)).unwrap();
        let s3 = basin.network.index_of(SegmentId(3)).unwrap();
        assert!(basin.channels.contains(2, 1, s2) && basin.channels.contains(2, 1, s3));
        assert_eq!(basin.network.outlet_of(s2), Some(s3));
    }

    #[test]
    fn valley_saturation_is_derived_and_bounded() {
        let basin = valley(2, 3, 3, 10.0, 30.0, 1.0).build().unwrap();
        assert!(basin
            .terrain
            .fine
            .iter()
            .all(|c| (0.0..=c.sediment).contains(&c.saturated_thickness)));
        assert!(basin.terrain.fine.iter().any(|c| c.saturated_thickness > 0.0));
    }
}
