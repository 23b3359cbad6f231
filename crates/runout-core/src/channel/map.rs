//! Coarse-grid channel map: which segments cross each cell.
//!
//! Records are stored in one flat array sorted by cell, with a prefix-offset
//! table giving each cell's slice (CSR layout).  A cell may hold several
//! records, e.g. a stream reach and a road ditch, or two reaches meeting.
use serde::{Deserialize, Serialize};

use super::network::ChannelNetwork;
use super::SegmentId;
use crate::error::{try_alloc, MassWastingError, Result};

/// Serialized form of one segment/cell crossing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCellRecord {
    pub row: usize,
    pub col: usize,
    pub segment: SegmentId,
    /// Channel length inside the cell (m).
    pub length: f64,
    /// Flow bearing inside the cell (radians, north = 0, clockwise).
    pub aspect: f64,
    #[serde(default)]
    pub sink: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRecord {
    /// Arena index into [`ChannelNetwork`].
    pub segment: u32,
    pub length: f64,
    pub aspect: f64,
    pub sink: bool,
}

#[derive(Debug, Clone)]
pub struct ChannelMap {
    rows: usize,
    cols: usize,
    offsets: Vec<u32>,
    records: Vec<SegmentRecord>,
}

impl ChannelMap {
    /// A map with no channels.
    pub fn empty(rows: usize, cols: usize) -> Result<Self> {
        Ok(Self { rows, cols, offsets: try_alloc("channel map", rows * cols + 1, 0)?, records: Vec::new() })
    }

    /// Build from serialized records.  Aspects must be finite and
    /// non-negative; record order within a cell is preserved.
    pub fn build(rows: usize, cols: usize, entries: &[ChannelCellRecord], network: &ChannelNetwork) -> Result<Self> {
        let mut counts = try_alloc("channel map", rows * cols + 1, 0u32)?;
        for e in entries {
            if e.row >= rows || e.col >= cols {
                return Err(MassWastingError::InvalidConfig(format!(
                    "channel record for {} at ({}, {}) outside {rows}x{cols} grid",
                    e.segment, e.row, e.col
                )));
            }
            if !(e.aspect.is_finite() && e.aspect >= 0.0) {
                return Err(MassWastingError::InvalidGeometry {
                    what: "channel aspect",
                    value: e.aspect,
                    row: e.row,
                    col: e.col,
                });
            }
            counts[e.row * cols + e.col + 1] += 1;
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let offsets = counts;

        let mut cursor = offsets.clone();
        let mut records = vec![SegmentRecord { segment: 0, length: 0.0, aspect: 0.0, sink: false }; entries.len()];
        for e in entries {
            let cell = e.row * cols + e.col;
            let slot = cursor[cell] as usize;
            cursor[cell] += 1;
            records[slot] = SegmentRecord {
                segment: network.index_of(e.segment)?,
                length: e.length,
                aspect: e.aspect,
                sink: e.sink,
            };
        }

        Ok(Self { rows, cols, offsets, records })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Records for one coarse cell; empty when the cell has no channel.
    pub fn records_at(&self, row: usize, col: usize) -> &[SegmentRecord] {
        let cell = row * self.cols + col;
        let start = self.offsets[cell] as usize;
        let end = self.offsets[cell + 1] as usize;
        &self.records[start..end]
    }

    #[inline]
    pub fn has_channel(&self, row: usize, col: usize) -> bool {
        !self.records_at(row, col).is_empty()
    }

    pub fn has_sink(&self, row: usize, col: usize) -> bool {
        self.records_at(row, col).iter().any(|r| r.sink)
    }

    pub fn record_for(&self, row: usize, col: usize, segment: u32) -> Option<&SegmentRecord> {
        self.records_at(row, col).iter().find(|r| r.segment == segment)
    }

    #[inline]
    pub fn contains(&self, row: usize, col: usize, segment: u32) -> bool {
        self.record_for(row, col, segment).is_some()
    }

    /// Total channel length in a cell (m).
    pub fn cell_length(&self, row: usize, col: usize) -> f64 {
        self.records_at(row, col).iter().map(|r| r.length).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SegmentSpec;

    fn make_network() -> ChannelNetwork {
        let specs = [
            SegmentSpec { id: SegmentId(1), outlet: Some(SegmentId(2)), slope: 0.1 },
            SegmentSpec { id: SegmentId(2), outlet: None, slope: 0.1 },
        ];
        ChannelNetwork::new(&specs, 1).unwrap()
    }

    fn rec(row: usize, col: usize, id: u32, aspect: f64) -> ChannelCellRecord {
        ChannelCellRecord { row, col, segment: SegmentId(id), length: 10.0, aspect, sink: false }
    }

    #[test]
    fn records_group_by_cell_in_input_order() {
        let net = make_network();
        let map = ChannelMap::build(3, 3, &[rec(1, 1, 2, 0.5), rec(0, 2, 1, 1.0), rec(1, 1, 1, 2.0)], &net).unwrap();
        let cell = map.records_at(1, 1);
        assert_eq!(cell.len(), 2);
        assert_eq!(cell[0].segment, net.index_of(SegmentId(2)).unwrap());
        assert_eq!(cell[1].aspect, 2.0);
        assert!(map.has_channel(0, 2));
        assert!(!map.has_channel(2, 2));
        assert!(map.contains(1, 1, net.index_of(SegmentId(1)).unwrap()));
        assert_eq!(map.cell_length(1, 1), 20.0);
    }

    #[test]
    fn negative_aspect_is_invalid_geometry() {
        let net = make_network();
        let err = ChannelMap::build(2, 2, &[rec(0, 0, 1, -0.1)], &net).unwrap_err();
        assert!(matches!(err, MassWastingError::InvalidGeometry { row: 0, col: 0, .. }));
    }

    #[test]
    fn unknown_segment_and_out_of_grid_records_fail() {
        let net = make_network();
        assert!(ChannelMap::build(2, 2, &[rec(0, 0, 7, 0.0)], &net).is_err());
        assert!(ChannelMap::build(2, 2, &[rec(2, 0, 1, 0.0)], &net).is_err());
    }

    #[test]
    fn empty_map_has_no_channels() {
        let map = ChannelMap::empty(2, 3).unwrap();
        assert!((0..2).all(|r| (0..3).all(|c| !map.has_channel(r, c))));
    }
}
