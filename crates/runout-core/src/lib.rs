//! Shallow-landslide initiation, debris-flow runout and sediment delivery
//! into a channel network.
//!
//! Pipeline order (leaves first):
//!   topographic index → soil-moisture redistribution → stability sampling →
//!   failure cascade → runout redistribution → channel injection, driven
//!   `N` times by the Monte-Carlo aggregator in [`montecarlo`].
pub mod channel;
pub mod config;
pub mod debris;
pub mod error;
pub mod grid;
pub mod hydrology;
pub mod montecarlo;
pub mod scenario;
pub mod stability;
pub mod summary;
pub mod synthetic;

pub use config::{GridConfig, MassWastingParams};
pub use error::{MassWastingError, Result};
pub use grid::{CoarseCell, FineCell, Terrain};
pub use montecarlo::{run_mass_wasting, CancelToken, RunOutput};
pub use summary::RunSummary;
