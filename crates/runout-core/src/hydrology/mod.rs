//! Static terrain analysis and moisture forcing for the fine grid.
//!
//! `descent` is shared by every downslope walker; `topo_index` and
//! `soil_moisture` prepare the inputs the stability test reads.
pub mod descent;
pub mod soil_moisture;
pub mod topo_index;

pub use descent::{steepest_descent, Descent, NEIGHBOR_ASPECT_DEG, NEIGHBOR_OFFSETS};
pub use soil_moisture::redistribute_soil_moisture;
pub use topo_index::{apply_topographic_index, compute_topographic_index};
