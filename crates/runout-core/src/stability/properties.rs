//! Per-type soil and vegetation parameters consumed by the stability model.
//!
//! Table loading is the caller's business; these are the in-memory shapes.
use serde::{Deserialize, Serialize};

use super::sampler::Distribution;
use crate::error::{MassWastingError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilProperties {
    pub name: String,
    /// Soil cohesion (kPa).
    pub cohesion: Distribution,
    /// Internal friction angle (degrees).
    pub friction_angle: Distribution,
    /// kg/m³
    pub saturated_density: f64,
    /// kg/m³
    pub dry_density: f64,
    /// Volumetric water content at field capacity.
    pub field_capacity: f64,
    /// Exponential decay of lateral saturated conductivity with depth.
    pub ks_lat_exp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegetationProperties {
    pub name: String,
    /// Root cohesion (kPa).
    pub root_cohesion: Distribution,
    /// Vegetation surcharge (kg/m²).
    pub surcharge: Distribution,
}

/// Soil and vegetation tables indexed by `CoarseCell::soil_type` / `veg_type`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyTables {
    pub soils: Vec<SoilProperties>,
    pub vegetation: Vec<VegetationProperties>,
}

impl PropertyTables {
    pub fn soil(&self, index: usize) -> Result<&SoilProperties> {
        self.soils.get(index).ok_or(MassWastingError::UnknownPropertyIndex {
            table: "soil",
            index,
            len: self.soils.len(),
        })
    }

    pub fn vegetation(&self, index: usize) -> Result<&VegetationProperties> {
        self.vegetation.get(index).ok_or(MassWastingError::UnknownPropertyIndex {
            table: "vegetation",
            index,
            len: self.vegetation.len(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        for s in &self.soils {
            s.cohesion.validate(&format!("soil '{}' cohesion", s.name))?;
            s.friction_angle.validate(&format!("soil '{}' friction angle", s.name))?;
            if !(s.ks_lat_exp > 0.0) {
                return Err(MassWastingError::InvalidConfig(format!(
                    "soil '{}': ks_lat_exp must be positive, got {}",
                    s.name, s.ks_lat_exp
                )));
            }
            if s.saturated_density <= 0.0 || s.dry_density <= 0.0 {
                return Err(MassWastingError::InvalidConfig(format!(
                    "soil '{}': densities must be positive",
                    s.name
                )));
            }
        }
        for v in &self.vegetation {
            v.root_cohesion.validate(&format!("vegetation '{}' root cohesion", v.name))?;
            v.surcharge.validate(&format!("vegetation '{}' surcharge", v.name))?;
        }
        Ok(())
    }
}
