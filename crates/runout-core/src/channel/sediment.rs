//! Sediment bookkeeping between the injector and the channel sub-model.
//!
//! Injections land in worker-private [`SedimentBuffers`]; only the final,
//! normalized buffers are pushed through a [`SedimentSink`], once per run.
use super::SegmentId;
use crate::config::MassWastingParams;
use crate::error::{try_alloc, Result};

/// The channel sediment sub-model's write interface.
pub trait SedimentSink {
    fn increment_temp_volume(&mut self, segment: SegmentId, amount: f64) -> Result<()>;
    fn increment_temp_mass(&mut self, segment: SegmentId, size_bin: usize, amount: f64) -> Result<()>;
}

/// Converts deposited debris volume into mass per particle-size bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SizePartition {
    fractions: Vec<f64>,
    /// Solid mass per bulk volume (kg/m³).
    solid_density: f64,
}

impl SizePartition {
    pub fn from_params(params: &MassWastingParams) -> Self {
        Self {
            fractions: params.size_fractions.clone(),
            solid_density: (1.0 - params.bulk_porosity()) * params.particle_density,
        }
    }

    #[inline]
    pub fn classes(&self) -> usize {
        self.fractions.len()
    }

    /// Mass (kg) of bin `k` in `volume` m³ of debris.
    #[inline]
    pub fn mass_in_bin(&self, volume: f64, k: usize) -> f64 {
        volume * self.solid_density * self.fractions[k]
    }
}

/// Debris moving through the network: bulk volume plus mass per size bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SedimentLoad {
    pub volume: f64,
    pub mass: Vec<f64>,
}

impl SedimentLoad {
    pub fn from_volume(volume: f64, partition: &SizePartition) -> Self {
        let mass = (0..partition.classes()).map(|k| partition.mass_in_bin(volume, k)).collect();
        Self { volume, mass }
    }

    /// Fold `other` into this load.
    pub fn absorb(&mut self, other: SedimentLoad) {
        self.volume += other.volume;
        if self.mass.len() < other.mass.len() {
            self.mass.resize(other.mass.len(), 0.0);
        }
        for (a, b) in self.mass.iter_mut().zip(other.mass) {
            *a += b;
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self { volume: self.volume * factor, mass: self.mass.iter().map(|m| m * factor).collect() }
    }
}

/// Per-segment volume and per-bin mass, indexed by arena index.
#[derive(Debug, Clone, PartialEq)]
pub struct SedimentBuffers {
    classes: usize,
    volume: Vec<f64>,
    mass: Vec<f64>,
}

impl SedimentBuffers {
    pub fn new(segments: usize, classes: usize) -> Result<Self> {
        Ok(Self {
            classes,
            volume: try_alloc("segment sediment volume", segments, 0.0)?,
            mass: try_alloc("segment sediment mass", segments * classes, 0.0)?,
        })
    }

    pub fn deposit(&mut self, segment: u32, volume: f64, partition: &SizePartition) {
        self.add(segment, &SedimentLoad::from_volume(volume, partition));
    }

    /// Add a load whose per-bin mass is already known.
    pub fn add(&mut self, segment: u32, load: &SedimentLoad) {
        let s = segment as usize;
        self.volume[s] += load.volume;
        for (k, m) in load.mass.iter().enumerate().take(self.classes) {
            self.mass[s * self.classes + k] += m;
        }
    }

    /// Remove everything stored in `segment` and hand it back as a load.
    pub fn take(&mut self, segment: u32) -> SedimentLoad {
        let s = segment as usize;
        let volume = std::mem::take(&mut self.volume[s]);
        let mass = self.mass[s * self.classes..(s + 1) * self.classes]
            .iter_mut()
            .map(std::mem::take)
            .collect();
        SedimentLoad { volume, mass }
    }

    #[inline]
    pub fn volume(&self, segment: u32) -> f64 {
        self.volume[segment as usize]
    }

    #[inline]
    pub fn mass(&self, segment: u32, k: usize) -> f64 {
        self.mass[segment as usize * self.classes + k]
    }

    pub fn total_volume(&self) -> f64 {
        self.volume.iter().sum()
    }

    /// Element-wise sum.
    pub fn merge(&mut self, other: &Self) {
        for (a, b) in self.volume.iter_mut().zip(&other.volume) {
            *a += b;
        }
        for (a, b) in self.mass.iter_mut().zip(&other.mass) {
            *a += b;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.volume.iter_mut().chain(self.mass.iter_mut()).for_each(|v| *v *= factor);
    }

    /// Push every non-zero entry into `sink`; `ids[s]` names arena slot `s`.
    pub fn flush_into(&self, ids: &[SegmentId], sink: &mut dyn SedimentSink) -> Result<()> {
        for (s, (&vol, &id)) in self.volume.iter().zip(ids).enumerate() {
            if vol <= 0.0 {
                continue;
            }
            sink.increment_temp_volume(id, vol)?;
            for k in 0..self.classes {
                sink.increment_temp_mass(id, k, self.mass[s * self.classes + k])?;
            }
        }
        Ok(())
    }
}
