//! Voxel data structures and operations

pub mod brick;
pub mod grid;
pub mod streaming;

pub use brick::{encode_density, BrickLayout, BrickMask, EncodedBrick};
pub use grid::Grid;
pub use streaming::{BrickPool, BrickRequestQueue, CellState, IndexTable, StreamingConfig, StreamingManager};
