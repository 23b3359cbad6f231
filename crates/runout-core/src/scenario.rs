//! Serializable run inputs and their assembled, ready-to-run form.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelCellRecord, ChannelMap, ChannelNetwork, SegmentSpec};
use crate::config::{GridConfig, MassWastingParams};
use crate::debris::EventContext;
use crate::error::{MassWastingError, Result};
use crate::grid::{CoarseCell, Terrain};
use crate::hydrology::{apply_topographic_index, redistribute_soil_moisture};
use crate::montecarlo::{run_mass_wasting, CancelToken, RunOutput};
use crate::stability::PropertyTables;

fn default_label() -> String {
    "scenario".into()
}

/// Everything a run reads, in one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_label")]
    pub label: String,
    pub grid: GridConfig,
    /// Row-major coarse cells.
    pub coarse: Vec<CoarseCell>,
    /// Row-major fine DEM (m).
    pub elevation: Vec<f64>,
    #[serde(default)]
    pub fine_mask: Option<Vec<bool>>,
    /// Fine saturated thickness (m).  When absent it is derived from the
    /// coarse water table.
    #[serde(default)]
    pub saturated_thickness: Option<Vec<f64>>,
    pub tables: PropertyTables,
    #[serde(default)]
    pub segments: Vec<SegmentSpec>,
    #[serde(default)]
    pub channel_map: Vec<ChannelCellRecord>,
    #[serde(default)]
    pub params: MassWastingParams,
}

impl Scenario {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate, allocate the arenas and run the static preprocessing
    /// (topographic index, then soil moisture).
    pub fn build(self) -> Result<Basin> {
        self.params.validate()?;
        self.tables.validate()?;
        for c in self.coarse.iter().filter(|c| c.in_basin) {
            self.tables.soil(c.soil_type)?;
            self.tables.vegetation(c.veg_type)?;
        }

        let mut terrain = Terrain::new(self.grid, self.coarse, &self.elevation, self.fine_mask.as_deref())?;
        apply_topographic_index(&mut terrain, self.params.vertical_resolution_m);

        match self.saturated_thickness {
            Some(sat) => {
                if sat.len() != terrain.fine.len() {
                    return Err(MassWastingError::DimensionMismatch {
                        what: "saturated thickness",
                        expected: terrain.fine.len(),
                        found: sat.len(),
                    });
                }
                for (cell, s) in terrain.fine.iter_mut().zip(sat) {
                    cell.saturated_thickness = s.clamp(0.0, cell.sediment.max(0.0));
                }
            }
            None => redistribute_soil_moisture(&mut terrain, &self.tables, self.params.redistribution_tolerance_m3)?,
        }

        let network = ChannelNetwork::new(&self.segments, self.params.size_classes())?;
        let channels = ChannelMap::build(self.grid.coarse_rows, self.grid.coarse_cols, &self.channel_map, &network)?;

        Ok(Basin { label: self.label, terrain, tables: self.tables, network, channels, params: self.params })
    }
}

/// A prepared basin: owns the arenas, the channel network and the tables.
#[derive(Debug, Clone)]
pub struct Basin {
    pub label: String,
    pub terrain: Terrain,
    pub tables: PropertyTables,
    pub network: ChannelNetwork,
    pub channels: ChannelMap,
    pub params: MassWastingParams,
}

impl Basin {
    /// Mutable terrain alongside an event context over the rest.
    pub fn split(&mut self) -> (&mut Terrain, EventContext<'_>) {
        let ctx = EventContext::new(&self.tables, &self.network, &self.channels, &self.params);
        (&mut self.terrain, ctx)
    }

    /// Run the Monte-Carlo engine; results land on the terrain and in the
    /// network's temporary sediment buffers.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<RunOutput> {
        run_mass_wasting(
            &self.label,
            &mut self.terrain,
            &self.tables,
            &mut self.network,
            &self.channels,
            &self.params,
            cancel,
        )
    }
}
