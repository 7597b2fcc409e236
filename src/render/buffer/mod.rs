//! GPU buffer management

pub mod gpu_buffer;
pub mod wgpu_buffer;
pub mod world_config;

pub use gpu_buffer::{BufferAllocator, GpuBuffer, HostAllocator, HostBuffer};
pub use wgpu_buffer::{WgpuAllocator, WgpuBuffer};
pub use world_config::GpuWorldConfig;
