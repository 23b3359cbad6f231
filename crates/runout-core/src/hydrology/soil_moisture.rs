//! Coarse-to-fine soil-moisture redistribution (after Burton & Bathurst, 1998).
//!
//! Each fine cell's water-table depth is the coarse depth shifted by the
//! deviation of its topographic index from the coarse-cell mean, scaled by
//! the soil's lateral-conductivity decay exponent.  Clipping the resulting
//! saturated thickness to `[0, sediment]` gains or loses water, so a second
//! pass spreads the volume residual back over the block by index weight.
use crate::error::Result;
use crate::grid::Terrain;
use crate::stability::PropertyTables;

/// Fill `FineCell::saturated_thickness` for every fine cell in the basin.
///
/// Requires the topographic index to be present; the per-coarse-cell index
/// ordering is rebuilt if it is missing.  Residuals within `tolerance_m3`
/// are left alone.
pub fn redistribute_soil_moisture(terrain: &mut Terrain, tables: &PropertyTables, tolerance_m3: f64) -> Result<()> {
    let cfg = terrain.config;
    let cols = cfg.fine_cols();
    let n_fine = cfg.fine_in_coarse();
    let fine_area = cfg.fine_cell_area();

    if terrain
        .coarse
        .iter()
        .any(|c| c.in_basin && c.ordered_fine.len() != n_fine)
    {
        terrain.order_by_topographic_index();
    }

    for cr in 0..cfg.coarse_rows {
        for cc in 0..cfg.coarse_cols {
            let coarse = terrain.coarse_at(cr, cc);
            if !coarse.in_basin {
                continue;
            }
            let soil_depth = coarse.soil_depth;
            let raw_table = coarse.water_table_depth;
            // Ponded water is not distributed.
            let table = raw_table.max(0.0);
            let decay = tables.soil(coarse.soil_type)?.ks_lat_exp;
            let ordered = coarse.ordered_fine.clone();

            let block: Vec<usize> = cfg.fine_block(cr, cc).map(|(r, c)| r * cols + c).collect();
            let topo_sum: f64 = block.iter().map(|&i| terrain.fine[i].topographic_index).sum();
            let topo_avg = topo_sum / n_fine as f64;

            let mut sat_total = 0.0;
            for &i in &block {
                let cell = &mut terrain.fine[i];
                cell.saturated_thickness = if soil_depth > raw_table {
                    let fine_table = table + (topo_avg - cell.topographic_index) / decay;
                    if fine_table < 0.0 {
                        cell.sediment
                    } else if fine_table > cell.sediment {
                        0.0
                    } else {
                        cell.sediment - fine_table
                    }
                } else {
                    0.0
                };
                sat_total += cell.saturated_thickness;
            }

            let residual = cfg.coarse_cell_area() * (soil_depth - table) - sat_total * fine_area;
            if residual.abs() <= tolerance_m3 || topo_sum == 0.0 || !topo_sum.is_finite() {
                continue;
            }

            if residual < 0.0 {
                // Too much water: the lowest-index cells give up the most.
                let n = ordered.len();
                for k in 0..n {
                    let weight = terrain.fine[ordered[n - k - 1]].topographic_index / topo_sum;
                    terrain.fine[ordered[k]].saturated_thickness += residual * weight / fine_area;
                }
            } else {
                for &i in &block {
                    let weight = terrain.fine[i].topographic_index / topo_sum;
                    terrain.fine[i].saturated_thickness += residual * weight / fine_area;
                }
            }

            for &i in &block {
                let cell = &mut terrain.fine[i];
                cell.saturated_thickness = cell.saturated_thickness.clamp(0.0, cell.sediment.max(0.0));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::grid::CoarseCell;
    use crate::stability::{Distribution, SoilProperties, VegetationProperties};

    fn make_tables(decay: f64) -> PropertyTables {
        PropertyTables {
            soils: vec![SoilProperties {
                name: "loam".into(),
                cohesion: Distribution::Uniform { min: 0.0, max: 1.0 },
                friction_angle: Distribution::Uniform { min: 30.0, max: 35.0 },
                saturated_density: 1900.0,
                dry_density: 1500.0,
                field_capacity: 0.25,
                ks_lat_exp: decay,
            }],
            vegetation: vec![VegetationProperties {
                name: "forest".into(),
                root_cohesion: Distribution::Uniform { min: 0.0, max: 1.0 },
                surcharge: Distribution::Uniform { min: 0.0, max: 0.0 },
            }],
        }
    }

    /// One 20×10 m coarse cell holding two 10 m fine cells with the given
    /// topographic indices.
    fn make_pair(soil_depth: f64, table: f64, ti: [f64; 2]) -> Terrain {
        let cfg = GridConfig::new(1, 1, 20.0, 10.0, 10.0).unwrap();
        let coarse = vec![CoarseCell {
            in_basin: true,
            soil_depth,
            water_table_depth: table,
            ..Default::default()
        }];
        let mut t = Terrain::new(cfg, coarse, &[100.0, 100.0], None).unwrap();
        t.fine[0].topographic_index = ti[0];
        t.fine[1].topographic_index = ti[1];
        t.order_by_topographic_index();
        t
    }

    #[test]
    fn uniform_index_saturates_below_the_table() {
        let mut t = make_pair(2.0, 0.5, [4.0, 4.0]);
        redistribute_soil_moisture(&mut t, &make_tables(2.0), 25.0).unwrap();
        for c in &t.fine {
            assert!((c.saturated_thickness - 1.5).abs() < 1e-12);
        }
    }

    #[test]
    fn table_below_soil_gives_dry_cells() {
        let mut t = make_pair(1.0, 1.2, [4.0, 6.0]);
        redistribute_soil_moisture(&mut t, &make_tables(2.0), 25.0).unwrap();
        assert!(t.fine.iter().all(|c| c.saturated_thickness == 0.0));
    }

    #[test]
    fn deficit_is_added_by_index_weight() {
        // Before correction: sat = [2.0, 0.5]; residual = 200·1.5 − 250 = +50 m³.
        let mut t = make_pair(2.0, 0.5, [3.0, 1.0]);
        redistribute_soil_moisture(&mut t, &make_tables(1.0), 25.0).unwrap();
        assert!((t.fine[0].saturated_thickness - 2.0).abs() < 1e-12, "clamped to sediment");
        assert!((t.fine[1].saturated_thickness - 0.625).abs() < 1e-12);
    }

    #[test]
    fn surplus_is_removed_with_reversed_weights() {
        // Before correction: sat = [1.5, 0.0]; residual = 200·0.5 − 150 = −50 m³.
        let mut t = make_pair(2.0, 1.5, [3.0, 1.0]);
        redistribute_soil_moisture(&mut t, &make_tables(1.0), 25.0).unwrap();
        assert!((t.fine[0].saturated_thickness - 1.375).abs() < 1e-12);
        assert_eq!(t.fine[1].saturated_thickness, 0.0);
    }

    #[test]
    fn residual_inside_tolerance_is_ignored() {
        let mut t = make_pair(2.0, 0.5, [3.0, 1.0]);
        redistribute_soil_moisture(&mut t, &make_tables(1.0), 60.0).unwrap();
        assert!((t.fine[0].saturated_thickness - 2.0).abs() < 1e-12);
        assert!((t.fine[1].saturated_thickness - 0.5).abs() < 1e-12);
    }
}
