//! Channel network, its raster map and the grid-to-network sediment injector.
//!
//! Segments live in an arena owned by [`ChannelNetwork`]; everything else
//! refers to them by arena index (`u32`) internally and by [`SegmentId`] at
//! the public boundary.
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod injector;
pub mod map;
pub mod network;
pub mod sediment;

pub use injector::{angular_difference, junction_decision, ChannelInjector, JunctionDecision};
pub use map::{ChannelCellRecord, ChannelMap, SegmentRecord};
pub use network::{ChannelNetwork, ChannelSegment, SegmentSpec};
pub use sediment::{SedimentBuffers, SedimentLoad, SedimentSink, SizePartition};

/// External identifier of a channel segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u32);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
