//! Core type aliases and re-exports

pub use glam::{IVec3, UVec3};

/// Standard Result type for the streaming core
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;
