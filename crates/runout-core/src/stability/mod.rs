//! Stochastic parameter sampling and infinite-slope stability.
pub mod properties;
pub mod safety;
pub mod sampler;

pub use properties::{PropertyTables, SoilProperties, VegetationProperties};
pub use safety::{
    factor_of_safety, GeotechnicalDraw, StabilityEvaluator, FLAT_SLOPE_FACTOR, INVALID_SLOPE, UNCONDITIONALLY_UNSTABLE,
};
pub use sampler::{Distribution, ParameterSampler};
