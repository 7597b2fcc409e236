//! Error types for brick streaming

use glam::IVec3;
use thiserror::Error;

/// Main error type for the streaming core
#[derive(Debug, Error)]
pub enum Error {
    /// The brick pool has no free slot left. Non-fatal: the requesting
    /// cell stays unloaded and is retried on its next request.
    #[error("brick pool capacity exceeded ({capacity} slots)")]
    CapacityExceeded { capacity: u32 },

    /// A slot index outside the populated pool range. Indicates the index
    /// table and the pool have drifted apart.
    #[error("invalid brick slot {slot} (pool length {len})")]
    InvalidSlot { slot: u32, len: u32 },

    /// More requests were enqueued in one frame than the queue holds.
    #[error("load queue overflow: {observed} requests for {capacity} entries")]
    QueueOverflow { observed: u32, capacity: u32 },

    #[error("grid cell {0} is outside the world grid")]
    CellOutOfBounds(IVec3),

    #[error("index entry {0:#010x} carries no valid state tag")]
    InvalidIndexTag(u32),

    #[error("buffer access [{offset}, {offset}+{len}) exceeds buffer size {size}")]
    BufferRange { offset: u64, len: u64, size: u64 },

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the frame loop may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::CapacityExceeded { .. } | Error::QueueOverflow { .. } | Error::CellOutOfBounds(_)
        )
    }
}
