//! Segment arena with outlet links.
//!
//! Outlets form a forest: each segment drains into at most one other and
//! following outlets always ends at a basin outlet.  The structure is
//! validated once at construction.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::sediment::SedimentSink;
use super::SegmentId;
use crate::error::{MassWastingError, Result};

/// Serialized description of one segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub id: SegmentId,
    #[serde(default)]
    pub outlet: Option<SegmentId>,
    /// Channel bed slope (m/m).
    pub slope: f64,
}

#[derive(Debug, Clone)]
pub struct ChannelSegment {
    pub id: SegmentId,
    /// Arena index of the downstream segment; `None` at a basin outlet.
    pub outlet: Option<u32>,
    /// m/m
    pub slope: f64,
    /// Sediment volume received this step (m³).
    pub temp_volume: f64,
    /// Sediment mass received this step, per particle-size bin (kg).
    pub temp_mass: Vec<f64>,
}

impl ChannelSegment {
    #[inline]
    pub fn slope_deg(&self) -> f64 {
        self.slope.atan().to_degrees()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelNetwork {
    segments: Vec<ChannelSegment>,
    by_id: HashMap<SegmentId, u32>,
}

impl ChannelNetwork {
    pub fn new(specs: &[SegmentSpec], size_classes: usize) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(specs.len());
        for (i, s) in specs.iter().enumerate() {
            if by_id.insert(s.id, i as u32).is_some() {
                return Err(MassWastingError::InvalidConfig(format!("duplicate segment id {}", s.id)));
            }
        }

        let mut segments = Vec::with_capacity(specs.len());
        for s in specs {
            let outlet = match s.outlet {
                Some(o) => Some(*by_id.get(&o).ok_or(MassWastingError::UnknownSegment(o))?),
                None => None,
            };
            segments.push(ChannelSegment {
                id: s.id,
                outlet,
                slope: s.slope,
                temp_volume: 0.0,
                temp_mass: vec![0.0; size_classes],
            });
        }

        let network = Self { segments, by_id };
        network.check_acyclic()?;
        Ok(network)
    }

    /// Visited-set walk down every outlet chain.
    fn check_acyclic(&self) -> Result<()> {
        const UNSEEN: u8 = 0;
        const ON_PATH: u8 = 1;
        const DONE: u8 = 2;

        let mut state = vec![UNSEEN; self.segments.len()];
        let mut path = Vec::new();
        for start in 0..self.segments.len() {
            let mut cur = Some(start as u32);
            while let Some(i) = cur {
                match state[i as usize] {
                    DONE => break,
                    ON_PATH => return Err(MassWastingError::CyclicNetwork(self.segments[i as usize].id)),
                    _ => {
                        state[i as usize] = ON_PATH;
                        path.push(i);
                        cur = self.segments[i as usize].outlet;
                    }
                }
            }
            for i in path.drain(..) {
                state[i as usize] = DONE;
            }
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn index_of(&self, id: SegmentId) -> Result<u32> {
        self.by_id.get(&id).copied().ok_or(MassWastingError::UnknownSegment(id))
    }

    #[inline]
    pub fn segment(&self, index: u32) -> &ChannelSegment {
        &self.segments[index as usize]
    }

    pub fn get(&self, id: SegmentId) -> Result<&ChannelSegment> {
        self.index_of(id).map(|i| self.segment(i))
    }

    #[inline]
    pub fn outlet_of(&self, index: u32) -> Option<u32> {
        self.segments[index as usize].outlet
    }

    /// Segment ids in arena order.
    pub fn ids(&self) -> Vec<SegmentId> {
        self.segments.iter().map(|s| s.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelSegment> {
        self.segments.iter()
    }

    /// Zero every temporary buffer.
    pub fn clear_temp(&mut self) {
        for s in &mut self.segments {
            s.temp_volume = 0.0;
            s.temp_mass.iter_mut().for_each(|m| *m = 0.0);
        }
    }
}

impl SedimentSink for ChannelNetwork {
    fn increment_temp_volume(&mut self, segment: SegmentId, amount: f64) -> Result<()> {
        let i = self.index_of(segment)?;
        self.segments[i as usize].temp_volume += amount;
        Ok(())
    }

    fn increment_temp_mass(&mut self, segment: SegmentId, size_bin: usize, amount: f64) -> Result<()> {
        let i = self.index_of(segment)?;
        let seg = &mut self.segments[i as usize];
        let len = seg.temp_mass.len();
        let slot = seg.temp_mass.get_mut(size_bin).ok_or(MassWastingError::UnknownPropertyIndex {
            table: "particle size",
            index: size_bin,
            len,
        })?;
        *slot += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_segment(id: u32, outlet: Option<u32>) -> SegmentSpec {
        SegmentSpec { id: SegmentId(id), outlet: outlet.map(SegmentId), slope: 0.1 }
    }

    #[test]
    fn outlets_resolve_to_arena_indices() {
        let specs = [make_segment(10, Some(20)), make_segment(20, None), make_segment(30, Some(20))];
        let net = ChannelNetwork::new(&specs, 3).unwrap();
        let a = net.index_of(SegmentId(10)).unwrap();
        let b = net.index_of(SegmentId(20)).unwrap();
        assert_eq!(net.outlet_of(a), Some(b));
        assert_eq!(net.outlet_of(b), None);
        assert_eq!(net.segment(a).temp_mass.len(), 3);
    }

    #[test]
    fn cycles_are_rejected() {
        let ring = [make_segment(1, Some(2)), make_segment(2, Some(3)), make_segment(3, Some(1))];
        let err = ChannelNetwork::new(&ring, 1).unwrap_err();
        assert!(matches!(err, MassWastingError::CyclicNetwork(_)));
        let self_loop = ChannelNetwork::new(&[make_segment(4, Some(4))], 1).unwrap_err();
        assert!(matches!(self_loop, MassWastingError::CyclicNetwork(SegmentId(4))));
    }

    #[test]
    fn unknown_outlet_and_duplicate_ids_are_rejected() {
        assert!(matches!(
            ChannelNetwork::new(&[make_segment(1, Some(9))], 1).unwrap_err(),
            MassWastingError::UnknownSegment(SegmentId(9))
        ));
        assert!(ChannelNetwork::new(&[make_segment(1, None), make_segment(1, None)], 1).is_err());
    }

    #[test]
    fn sink_increments_accumulate() {
        let mut net = ChannelNetwork::new(&[make_segment(5, None)], 2).unwrap();
        net.increment_temp_volume(SegmentId(5), 1.5).unwrap();
        net.increment_temp_volume(SegmentId(5), 0.5).unwrap();
        net.increment_temp_mass(SegmentId(5), 1, 40.0).unwrap();
        let seg = net.get(SegmentId(5)).unwrap();
        assert_eq!(seg.temp_volume, 2.0);
        assert_eq!(seg.temp_mass, vec![0.0, 40.0]);
        assert!(net.increment_temp_mass(SegmentId(5), 2, 1.0).is_err());
        assert!(net.increment_temp_volume(SegmentId(6), 1.0).is_err());
        net.clear_temp();
        assert_eq!(net.get(SegmentId(5)).unwrap().temp_volume, 0.0);
    }
}
