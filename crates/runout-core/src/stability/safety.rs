//! Infinite-slope factor of safety (Hammond et al., 1992 formulation).
//!
//! Returned values:
//! * `> 0`  ordinary factor of safety; the cell fails below `fs_criteria`.
//! * [`UNCONDITIONALLY_UNSTABLE`] for parameter sets that cannot hold the
//!   slope at any moisture content.
//! * [`INVALID_SLOPE`] for negative slopes.
//!
//! Both sentinels are non-positive and therefore never count as a failure.
use super::properties::{PropertyTables, SoilProperties, VegetationProperties};
use super::sampler::ParameterSampler;
use crate::config::MassWastingParams;
use crate::error::Result;
use crate::grid::FineCell;

pub const UNCONDITIONALLY_UNSTABLE: f64 = -0.1;
pub const INVALID_SLOPE: f64 = -999.0;
/// Returned for a perfectly flat cell, which has no driving force.
pub const FLAT_SLOPE_FACTOR: f64 = 1.0e6;

const G: f64 = 9.81;
const WATER_DENSITY: f64 = 1000.0;
const MIN_DEPTH: f64 = 0.001;
const MAX_SATURATION_RATIO: f64 = 0.99;

/// One draw of the four stochastic geotechnical parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeotechnicalDraw {
    /// kPa
    pub soil_cohesion: f64,
    /// degrees
    pub friction_angle: f64,
    /// kPa
    pub root_cohesion: f64,
    /// kg/m²
    pub surcharge: f64,
}

impl GeotechnicalDraw {
    pub fn sample(soil: &SoilProperties, veg: &VegetationProperties, sampler: &mut ParameterSampler) -> Self {
        let root_cohesion = sampler.draw(&veg.root_cohesion);
        let friction_angle = sampler.draw(&soil.friction_angle);
        let soil_cohesion = sampler.draw(&soil.cohesion);
        let surcharge = sampler.draw(&veg.surcharge);
        Self { soil_cohesion, friction_angle, root_cohesion, surcharge }
    }
}

/// Factor of safety for one cell.
///
/// `sediment_depth ≤ 0` is clamped to 1 mm and the saturation ratio is
/// capped at 0.99 so degenerate inputs never divide by zero.
pub fn factor_of_safety(
    slope_deg: f64,
    sediment_depth: f64,
    saturated_thickness: f64,
    soil: &SoilProperties,
    draw: &GeotechnicalDraw,
) -> f64 {
    if !(slope_deg >= 0.0) {
        return INVALID_SLOPE;
    }
    let depth = if sediment_depth <= 0.0 { MIN_DEPTH } else { sediment_depth };
    let m = (saturated_thickness / depth).clamp(0.0, MAX_SATURATION_RATIO);

    // kPa → kg/m²
    let cohesion = (draw.soil_cohesion + draw.root_cohesion) * 1000.0 / G;
    let tan_phi = draw.friction_angle.to_radians().tan();
    let theta = slope_deg.to_radians();
    let tan_theta = theta.tan();
    let cos_theta = theta.cos();

    let moist_density = soil.dry_density + soil.field_capacity * WATER_DENSITY;
    let loading = draw.surcharge / (WATER_DENSITY * depth)
        + m * soil.saturated_density / WATER_DENSITY
        + (1.0 - m) * moist_density / WATER_DENSITY;

    let term1 = cohesion / ((draw.surcharge + depth * moist_density) * cos_theta * cos_theta) + tan_phi;
    if term1 <= tan_theta {
        return UNCONDITIONALLY_UNSTABLE;
    }
    if tan_theta <= 0.0 {
        return FLAT_SLOPE_FACTOR;
    }

    (2.0 * cohesion / (WATER_DENSITY * depth * (2.0 * theta).sin()) + (loading - m) * tan_phi / tan_theta) / loading
}

/// Binds the property tables and thresholds used for every stability test
/// in a run.
#[derive(Debug, Clone, Copy)]
pub struct StabilityEvaluator<'a> {
    tables: &'a PropertyTables,
    params: &'a MassWastingParams,
}

impl<'a> StabilityEvaluator<'a> {
    pub fn new(tables: &'a PropertyTables, params: &'a MassWastingParams) -> Self {
        Self { tables, params }
    }

    /// Sample the geotechnical parameters and evaluate the factor of safety.
    #[allow(clippy::too_many_arguments)]
    pub fn safety_factor(
        &self,
        slope_deg: f64,
        soil_type: usize,
        sediment_depth: f64,
        veg_type: usize,
        saturated_thickness: f64,
        snow_load: f64,
        sampler: &mut ParameterSampler,
    ) -> Result<f64> {
        let soil = self.tables.soil(soil_type)?;
        let veg = self.tables.vegetation(veg_type)?;
        let mut draw = GeotechnicalDraw::sample(soil, veg, sampler);
        if self.params.include_snow_surcharge {
            draw.surcharge += snow_load.max(0.0);
        }
        Ok(factor_of_safety(slope_deg, sediment_depth, saturated_thickness, soil, &draw))
    }

    /// Moisture and slope gates a cell must pass before it is tested at all.
    pub fn is_initiation_candidate(&self, cell: &FineCell, slope_deg: f64) -> bool {
        cell.in_basin_fine
            && cell.sediment > 0.0
            && cell.saturated_thickness / cell.sediment > self.params.saturation_threshold
            && slope_deg >= self.params.min_failure_slope_deg
    }

    /// Sentinels and other non-positive values are "no decision".
    #[inline]
    pub fn is_failure(&self, fs: f64) -> bool {
        fs > 0.0 && fs < self.params.fs_criteria
    }
}
