//! Brick streaming system
//!
//! Key concepts:
//! - Brick Pool: Fixed-size GPU buffer holding resident bricks, append-only
//! - Index Table: One tagged entry per grid cell (unloaded, empty, resident)
//! - Ray-Guided Loading: Rays request missing bricks during traversal
//! - Streaming Manager: Drains requests once per frame and resolves them

pub mod brick_pool;
pub mod index_table;
pub mod request_queue;
pub mod consumer;
pub mod config;
pub mod manager;

pub use brick_pool::{BrickPool, DEFAULT_BRICK_POOL_SIZE};
pub use index_table::{CellState, IndexTable};
pub use request_queue::{BrickRequestQueue, Drain, MAX_REQUESTS_PER_FRAME};
pub use consumer::{ConsumerPass, PassStats, Visit};
pub use config::{GenerationParams, StreamingConfig};
pub use manager::{FrameStats, StreamingManager};
