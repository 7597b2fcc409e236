//! Procedural density generation

pub mod density;
pub use density::{DensitySampler, FbmDensity, FnDensity, NoiseKind, NoiseParams, PlaneDensity};
