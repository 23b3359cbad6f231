//! Delivery of runout debris into the channel network.
//!
//! Entry picks the record in the receiving coarse cell best aligned with the
//! incoming flow.  From there the debris walks downstream one junction at a
//! time: the junction is located on the map, the two segments' aspects are
//! compared, and the debris either continues, splits between the two when
//! they are misaligned, or stops in a flat outlet.
use std::f64::consts::{PI, TAU};

use log::warn;

use super::map::ChannelMap;
use super::network::ChannelNetwork;
use super::sediment::{SedimentBuffers, SedimentLoad, SizePartition};
use crate::config::MassWastingParams;
use crate::error::{MassWastingError, Result};

/// Slack on angle comparisons so boundary values land on the inclusive side.
const ANGLE_EPS: f64 = 1e-9;

/// Wrapped absolute difference of two bearings, in `[0, π]`.
///
/// Both inputs must be finite and non-negative radians.
pub fn angular_difference(a: f64, b: f64, row: usize, col: usize) -> Result<f64> {
    for v in [a, b] {
        if !(v.is_finite() && v >= 0.0) {
            return Err(MassWastingError::InvalidGeometry { what: "aspect", value: v, row, col });
        }
    }
    let mut d = (a - b).abs().rem_euclid(TAU);
    if d > PI {
        d = TAU - d;
    }
    if !(0.0..=PI).contains(&d) {
        return Err(MassWastingError::InvalidGeometry { what: "angular difference", value: d, row, col });
    }
    Ok(d)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionDecision {
    /// Aligned and steep enough: keep routing in the outlet.
    Continue,
    /// Misaligned: half stays in the current segment, half goes to the outlet.
    Split,
    /// Aligned but the outlet is too flat: everything is deposited there.
    Outlet,
}

/// Classify a junction from the wrapped aspect difference (radians) and the
/// outlet's bed slope (degrees).  The angle threshold is inclusive.
pub fn junction_decision(delta: f64, outlet_slope_deg: f64, params: &MassWastingParams) -> JunctionDecision {
    if delta > params.junction_angle_deg.to_radians() + ANGLE_EPS {
        JunctionDecision::Split
    } else if outlet_slope_deg > params.min_channel_slope_deg {
        JunctionDecision::Continue
    } else {
        JunctionDecision::Outlet
    }
}

/// Where a segment meets its outlet.  The two cells coincide unless the
/// two-phase fallback was needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JunctionSite {
    current: (usize, usize),
    outlet: (usize, usize),
}

pub struct ChannelInjector<'a> {
    network: &'a ChannelNetwork,
    map: &'a ChannelMap,
    params: &'a MassWastingParams,
    partition: SizePartition,
}

impl<'a> ChannelInjector<'a> {
    pub fn new(network: &'a ChannelNetwork, map: &'a ChannelMap, params: &'a MassWastingParams) -> Self {
        Self { network, map, params, partition: SizePartition::from_params(params) }
    }

    /// Deliver `volume` m³ arriving at coarse cell `(row, col)` with bearing
    /// `flow_aspect` (radians).
    pub fn inject(
        &self,
        volume: f64,
        row: usize,
        col: usize,
        flow_aspect: f64,
        buffers: &mut SedimentBuffers,
    ) -> Result<()> {
        if !(flow_aspect.is_finite() && flow_aspect >= 0.0) {
            return Err(MassWastingError::InvalidGeometry { what: "flow aspect", value: flow_aspect, row, col });
        }
        if volume <= 0.0 {
            return Ok(());
        }
        let records = self.map.records_at(row, col);
        if records.is_empty() {
            return Err(MassWastingError::InvalidConfig(format!("no channel in coarse cell ({row}, {col})")));
        }

        let diffs = records
            .iter()
            .map(|r| angular_difference(flow_aspect, r.aspect, row, col))
            .collect::<Result<Vec<f64>>>()?;
        let best = diffs.iter().copied().fold(f64::INFINITY, f64::min);

        if best <= self.params.junction_angle_deg.to_radians() + ANGLE_EPS {
            let first = diffs.iter().position(|&d| d == best).unwrap_or(0);
            return self.route(volume, records[first].segment, (row, col), buffers);
        }

        // Too misaligned to enter: split evenly over the best-aligned records.
        let tied: Vec<u32> = records
            .iter()
            .zip(&diffs)
            .filter(|(_, d)| **d - best <= ANGLE_EPS)
            .map(|(r, _)| r.segment)
            .collect();
        let share = volume / tied.len() as f64;
        for s in tied {
            buffers.deposit(s, share, &self.partition);
        }
        Ok(())
    }

    /// Walk downstream from `start`, entered at coarse cell `entry`.
    ///
    /// Every junction is searched for around the entry cell.  Sediment already
    /// sitting in the current segment joins the moving load at each junction.
    fn route(&self, volume: f64, start: u32, entry: (usize, usize), buffers: &mut SedimentBuffers) -> Result<()> {
        let mut load = SedimentLoad::from_volume(volume, &self.partition);
        let mut current = start;
        // Cell where `current` was reached; only consulted for the sink check.
        let mut reached = entry;
        loop {
            let Some(outlet) = self.network.outlet_of(current) else {
                buffers.add(current, &load);
                return Ok(());
            };

            let Some(site) = self.find_junction(current, outlet, entry) else {
                let cur_id = self.network.segment(current).id;
                let out_id = self.network.segment(outlet).id;
                let at_sink = self.map.record_for(reached.0, reached.1, current).is_some_and(|r| r.sink);
                if at_sink {
                    warn!(
                        "segment {cur_id} ends in a sink at ({}, {}) with no junction to {out_id}; keeping {:.3} m3",
                        reached.0, reached.1, load.volume
                    );
                    buffers.add(current, &load);
                    return Ok(());
                }
                return Err(MassWastingError::SearchExhausted {
                    current: cur_id,
                    outlet: out_id,
                    radius: self.params.max_search_radius,
                });
            };

            let current_aspect = self.aspect_of(site.current, current)?;
            let outlet_aspect = self.aspect_of(site.outlet, outlet)?;
            let delta = angular_difference(current_aspect, outlet_aspect, site.outlet.0, site.outlet.1)?;

            load.absorb(buffers.take(current));
            match junction_decision(delta, self.network.segment(outlet).slope_deg(), self.params) {
                JunctionDecision::Continue => {
                    current = outlet;
                    reached = site.outlet;
                }
                JunctionDecision::Split => {
                    let half = load.scaled(0.5);
                    buffers.add(current, &half);
                    buffers.add(outlet, &half);
                    return Ok(());
                }
                JunctionDecision::Outlet => {
                    buffers.add(outlet, &load);
                    return Ok(());
                }
            }
        }
    }

    fn aspect_of(&self, cell: (usize, usize), segment: u32) -> Result<f64> {
        self.map
            .record_for(cell.0, cell.1, segment)
            .map(|r| r.aspect)
            .ok_or(MassWastingError::UnknownSegment(self.network.segment(segment).id))
    }

    /// Direct hit, then square rings holding both segments, then the
    /// two-phase nearest-outlet / nearest-current fallback.
    fn find_junction(&self, current: u32, outlet: u32, origin: (usize, usize)) -> Option<JunctionSite> {
        let both = |(r, c): (usize, usize)| self.map.contains(r, c, current) && self.map.contains(r, c, outlet);
        if let Some(cell) = self.nearest(origin, both) {
            return Some(JunctionSite { current: cell, outlet: cell });
        }

        let outlet_cell = self.nearest(origin, |(r, c)| self.map.contains(r, c, outlet))?;
        let current_cell = self.nearest(outlet_cell, |(r, c)| self.map.contains(r, c, current))?;
        Some(JunctionSite { current: current_cell, outlet: outlet_cell })
    }

    /// First cell matching `pred` in rings of radius 0..=max around `center`.
    fn nearest(&self, center: (usize, usize), pred: impl Fn((usize, usize)) -> bool) -> Option<(usize, usize)> {
        (0..=self.params.max_search_radius).find_map(|radius| ring(self.map, center, radius).find(|&cell| pred(cell)))
    }
}

/// Cells at Chebyshev distance exactly `radius` from `center`, row-major,
/// clipped to the map.
fn ring(map: &ChannelMap, center: (usize, usize), radius: usize) -> impl Iterator<Item = (usize, usize)> {
    let rows = map.rows() as isize;
    let cols = map.cols() as isize;
    let r = radius as isize;
    let (r0, c0) = (center.0 as isize, center.1 as isize);
    (-r..=r)
        .flat_map(move |dr| (-r..=r).map(move |dc| (dr, dc)))
        .filter(move |&(dr, dc)| dr.abs().max(dc.abs()) == r)
        .filter_map(move |(dr, dc)| {
            let (nr, nc) = (r0 + dr, c0 + dc);
            (nr >= 0 && nc >= 0 && nr < rows && nc < cols).then_some((nr as usize, nc as usize))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelCellRecord, SegmentId, SegmentSpec};
    use approx::assert_relative_eq;

    fn seg(id: u32, outlet: Option<u32>, slope: f64) -> SegmentSpec {
        SegmentSpec { id: SegmentId(id), outlet: outlet.map(SegmentId), slope }
    }

    fn rec(row: usize, col: usize, id: u32, aspect_deg: f64, sink: bool) -> ChannelCellRecord {
        ChannelCellRecord { row, col, segment: SegmentId(id), length: 10.0, aspect: aspect_deg.to_radians(), sink }
    }

    struct Fixture {
        net: ChannelNetwork,
        map: ChannelMap,
        params: MassWastingParams,
    }

    impl Fixture {
        fn new(rows: usize, cols: usize, segs: &[SegmentSpec], recs: &[ChannelCellRecord]) -> Self {
            let params = MassWastingParams::default();
            let net = ChannelNetwork::new(segs, params.size_classes()).unwrap();
            let map = ChannelMap::build(rows, cols, recs, &net).unwrap();
            Self { net, map, params }
        }

        fn buffers(&self) -> SedimentBuffers {
            SedimentBuffers::new(self.net.len(), self.params.size_classes()).unwrap()
        }

        fn inject(&self, volume: f64, row: usize, col: usize, aspect_deg: f64) -> Result<SedimentBuffers> {
            let mut buf = self.buffers();
            self.inject_into(&mut buf, volume, row, col, aspect_deg)?;
            Ok(buf)
        }

        fn inject_into(
            &self,
            buf: &mut SedimentBuffers,
            volume: f64,
            row: usize,
            col: usize,
            aspect_deg: f64,
        ) -> Result<()> {
            ChannelInjector::new(&self.net, &self.map, &self.params).inject(
                volume,
                row,
                col,
                aspect_deg.to_radians(),
                buf,
            )
        }

        fn index(&self, id: u32) -> u32 {
            self.net.index_of(SegmentId(id)).unwrap()
        }

        fn volume(&self, buf: &SedimentBuffers, id: u32) -> f64 {
            buf.volume(self.index(id))
        }
    }

    #[test]
    fn angular_difference_wraps_and_rejects_negative_aspects() {
        let d = angular_difference(350f64.to_radians(), 10f64.to_radians(), 0, 0).unwrap();
        assert_relative_eq!(d.to_degrees(), 20.0, epsilon = 1e-9);
        let d = angular_difference(0.0, PI, 0, 0).unwrap();
        assert_relative_eq!(d, PI);
        let err = angular_difference(-0.2, 1.0, 3, 4).unwrap_err();
        assert!(matches!(err, MassWastingError::InvalidGeometry { row: 3, col: 4, .. }));
    }

    #[test]
    fn junction_at_exactly_seventy_degrees_continues() {
        // 1 → 2 → 3 all meet in one cell; 2→3 is perfectly aligned.
        let segs = [seg(1, Some(2), 0.2), seg(2, Some(3), 0.2), seg(3, None, 0.2)];
        let aligned = Fixture::new(
            1,
            1,
            &segs,
            &[rec(0, 0, 1, 0.0, false), rec(0, 0, 2, 70.0, false), rec(0, 0, 3, 70.0, false)],
        );
        let buf = aligned.inject(12.0, 0, 0, 0.0).unwrap();
        assert_relative_eq!(aligned.volume(&buf, 3), 12.0);
        assert_eq!(aligned.volume(&buf, 2), 0.0);

        let bent = Fixture::new(
            1,
            1,
            &segs,
            &[rec(0, 0, 1, 0.0, false), rec(0, 0, 2, 71.0, false), rec(0, 0, 3, 71.0, false)],
        );
        let buf = bent.inject(12.0, 0, 0, 0.0).unwrap();
        assert_relative_eq!(bent.volume(&buf, 1), 6.0);
        assert_relative_eq!(bent.volume(&buf, 2), 6.0);
        assert_eq!(bent.volume(&buf, 3), 0.0);
    }

    #[test]
    fn misaligned_junction_splits_between_current_and_outlet() {
        let f = Fixture::new(
            1,
            1,
            &[seg(1, Some(2), 0.2), seg(2, None, 0.2)],
            &[rec(0, 0, 1, 0.0, false), rec(0, 0, 2, 90.0, false)],
        );
        let buf = f.inject(10.0, 0, 0, 0.0).unwrap();
        assert_relative_eq!(f.volume(&buf, 1), 5.0);
        assert_relative_eq!(f.volume(&buf, 2), 5.0);
        assert_relative_eq!(buf.mass(f.index(1), 2), buf.mass(f.index(2), 2), epsilon = 1e-9);
    }

    #[test]
    fn flat_outlet_takes_everything() {
        // Outlet slope 0.05 m/m ≈ 2.9°, below the 3.5° channel-forming slope.
        let f = Fixture::new(
            1,
            1,
            &[seg(1, Some(2), 0.2), seg(2, None, 0.05)],
            &[rec(0, 0, 1, 90.0, false), rec(0, 0, 2, 100.0, false)],
        );
        let buf = f.inject(8.0, 0, 0, 90.0).unwrap();
        assert_eq!(f.volume(&buf, 1), 0.0);
        assert_relative_eq!(f.volume(&buf, 2), 8.0);
    }

    #[test]
    fn stored_sediment_moves_on_with_the_next_flow() {
        let segs = [seg(1, Some(2), 0.2), seg(2, None, 0.2)];
        let partition = SizePartition::from_params(&MassWastingParams::default());

        // Misaligned: the first flow leaves half in segment 1, the second
        // collects it and splits the combined load again.
        let bent = Fixture::new(1, 1, &segs, &[rec(0, 0, 1, 0.0, false), rec(0, 0, 2, 90.0, false)]);
        let mut buf = bent.buffers();
        bent.inject_into(&mut buf, 10.0, 0, 0, 0.0).unwrap();
        bent.inject_into(&mut buf, 4.0, 0, 0, 0.0).unwrap();
        assert_relative_eq!(bent.volume(&buf, 1), 4.5, epsilon = 1e-12);
        assert_relative_eq!(bent.volume(&buf, 2), 9.5, epsilon = 1e-12);
        assert_relative_eq!(buf.mass(bent.index(1), 0), partition.mass_in_bin(4.5, 0), epsilon = 1e-9);
        assert_relative_eq!(buf.mass(bent.index(2), 0), partition.mass_in_bin(9.5, 0), epsilon = 1e-9);

        // Aligned: whatever sat in segment 1 is flushed into the outlet.
        let straight = Fixture::new(1, 1, &segs, &[rec(0, 0, 1, 0.0, false), rec(0, 0, 2, 10.0, false)]);
        let mut buf = straight.buffers();
        buf.deposit(straight.index(1), 2.0, &partition);
        straight.inject_into(&mut buf, 3.0, 0, 0, 0.0).unwrap();
        assert_eq!(straight.volume(&buf, 1), 0.0);
        assert_relative_eq!(straight.volume(&buf, 2), 5.0);
        assert_eq!(buf.mass(straight.index(1), 1), 0.0);
    }

    #[test]
    fn every_junction_is_searched_from_the_entry_cell() {
        // 1 → 2 meet at (0, 4).  Segments 2 and 3 share two cells: (1, 1)
        // next to the entry, aligned, and (1, 4) next to the first junction,
        // reversed.  Searching from the entry picks the aligned one.
        let f = Fixture::new(
            2,
            5,
            &[seg(1, Some(2), 0.2), seg(2, Some(3), 0.2), seg(3, None, 0.2)],
            &[
                rec(0, 0, 1, 0.0, false),
                rec(0, 4, 1, 0.0, false),
                rec(0, 4, 2, 0.0, false),
                rec(1, 1, 2, 0.0, false),
                rec(1, 1, 3, 0.0, false),
                rec(1, 4, 2, 0.0, false),
                rec(1, 4, 3, 180.0, false),
            ],
        );
        let buf = f.inject(5.0, 0, 0, 0.0).unwrap();
        assert_eq!(f.volume(&buf, 2), 0.0);
        assert_relative_eq!(f.volume(&buf, 3), 5.0);
    }

    #[test]
    fn perpendicular_flow_splits_between_antiparallel_segments() {
        let f = Fixture::new(
            1,
            1,
            &[seg(1, None, 0.1), seg(2, None, 0.1)],
            &[rec(0, 0, 1, 0.0, false), rec(0, 0, 2, 180.0, false)],
        );
        let buf = f.inject(10.0, 0, 0, 90.0).unwrap();
        assert_relative_eq!(f.volume(&buf, 1), 5.0, epsilon = 1e-12);
        assert_relative_eq!(f.volume(&buf, 2), 5.0, epsilon = 1e-12);
        assert_relative_eq!(buf.mass(0, 0), buf.mass(1, 0), epsilon = 1e-9);
    }

    #[test]
    fn ring_search_finds_a_distant_junction() {
        // Segment 1 enters at (0, 0); the junction with 2 is two rings out.
        let f = Fixture::new(
            4,
            4,
            &[seg(1, Some(2), 0.2), seg(2, None, 0.2)],
            &[
                rec(0, 0, 1, 135.0, false),
                rec(1, 1, 1, 135.0, false),
                rec(2, 2, 1, 135.0, false),
                rec(2, 2, 2, 180.0, false),
                rec(3, 2, 2, 180.0, false),
            ],
        );
        let buf = f.inject(6.0, 0, 0, 140.0).unwrap();
        assert_relative_eq!(f.volume(&buf, 2), 6.0);
    }

    #[test]
    fn two_phase_fallback_handles_segments_that_never_share_a_cell() {
        let f = Fixture::new(
            1,
            4,
            &[seg(1, Some(2), 0.2), seg(2, None, 0.2)],
            &[rec(0, 0, 1, 90.0, false), rec(0, 1, 1, 90.0, false), rec(0, 3, 2, 90.0, false)],
        );
        let buf = f.inject(3.0, 0, 0, 90.0).unwrap();
        assert_relative_eq!(f.volume(&buf, 2), 3.0);
        assert_eq!(f.volume(&buf, 1), 0.0);
    }

    #[test]
    fn exhausted_search_is_fatal_unless_the_segment_ends_in_a_sink() {
        let segs = [seg(1, Some(2), 0.2), seg(2, None, 0.2)];
        let mut f = Fixture::new(1, 4, &segs, &[rec(0, 0, 1, 90.0, false), rec(0, 3, 2, 90.0, false)]);
        f.params.max_search_radius = 1;
        let err = f.inject(3.0, 0, 0, 90.0).unwrap_err();
        assert!(matches!(
            err,
            MassWastingError::SearchExhausted { current: SegmentId(1), outlet: SegmentId(2), radius: 1 }
        ));

        let mut f = Fixture::new(1, 4, &segs, &[rec(0, 0, 1, 90.0, true), rec(0, 3, 2, 90.0, false)]);
        f.params.max_search_radius = 1;
        let buf = f.inject(3.0, 0, 0, 90.0).unwrap();
        assert_relative_eq!(f.volume(&buf, 1), 3.0);
    }

    #[test]
    fn negative_flow_aspect_is_fatal() {
        let f = Fixture::new(1, 1, &[seg(1, None, 0.1)], &[rec(0, 0, 1, 0.0, false)]);
        let mut buf = SedimentBuffers::new(1, 3).unwrap();
        let err = ChannelInjector::new(&f.net, &f.map, &f.params).inject(1.0, 0, 0, -1.0, &mut buf).unwrap_err();
        assert!(matches!(err, MassWastingError::InvalidGeometry { what: "flow aspect", .. }));
    }

    #[test]
    fn rings_are_clipped_to_the_map() {
        let map = ChannelMap::empty(3, 3).unwrap();
        assert_eq!(ring(&map, (0, 0), 0).collect::<Vec<_>>(), vec![(0, 0)]);
        assert_eq!(ring(&map, (0, 0), 1).collect::<Vec<_>>(), vec![(0, 1), (1, 0), (1, 1)]);
        assert_eq!(ring(&map, (1, 1), 1).count(), 8);
        assert_eq!(ring(&map, (1, 1), 2).count(), 0);
    }
}
