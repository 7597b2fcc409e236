//! Brickmap - ray-guided voxel brick streaming

pub mod core;
pub mod voxel;
pub mod render;
pub mod terrain;
