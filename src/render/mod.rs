//! GPU interfaces

pub mod context;
pub mod buffer;
pub mod shader;
