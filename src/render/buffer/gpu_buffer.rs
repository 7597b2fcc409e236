//! Raw GPU-resident buffer abstraction
//!
//! The streaming core only ever talks to GPU memory through sized sub-range
//! uploads and downloads. Everything it shares with the raycaster is laid
//! out as plain bytes at fixed offsets, so any backend that can move bytes
//! in and out of a linear buffer can host it.

use crate::core::{Error, Result};

/// Byte-addressable buffer shared with the GPU
pub trait GpuBuffer {
    /// Total size in bytes
    fn size(&self) -> u64;

    /// Copy `data` into the buffer starting at `offset`
    fn upload(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Copy `out.len()` bytes starting at `offset` into `out`
    fn download(&self, offset: u64, out: &mut [u8]) -> Result<()>;
}

/// Creates buffers for a backend
pub trait BufferAllocator {
    type Buffer: GpuBuffer;

    /// Create a zero-initialized buffer of `size` bytes
    fn create_buffer(&self, label: &str, size: u64) -> Result<Self::Buffer>;
}

/// Fail with `BufferRange` unless `[offset, offset + len)` lies within `size`
pub fn check_range(offset: u64, len: u64, size: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::BufferRange { offset, len, size }),
    }
}

/// Buffer backed by host memory.
///
/// Used for headless runs and tests. It keeps byte-for-byte the same layout a
/// GPU buffer would, so wire-format code paths are exercised unchanged.
#[derive(Clone, Debug, Default)]
pub struct HostBuffer {
    label: String,
    bytes: Vec<u8>,
    uploads: u64,
    uploaded_bytes: u64,
}

impl HostBuffer {
    /// Create a zeroed host buffer
    pub fn new(label: &str, size: u64) -> Self {
        Self {
            label: label.to_string(),
            bytes: vec![0; size as usize],
            uploads: 0,
            uploaded_bytes: 0,
        }
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Raw contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of upload calls so far
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    /// Total bytes uploaded so far
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }
}

impl GpuBuffer for HostBuffer {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn upload(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(offset, data.len() as u64, self.size())?;
        let start = offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self.uploads += 1;
        self.uploaded_bytes += data.len() as u64;
        Ok(())
    }

    fn download(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        check_range(offset, out.len() as u64, self.size())?;
        let start = offset as usize;
        out.copy_from_slice(&self.bytes[start..start + out.len()]);
        Ok(())
    }
}

/// Allocator for [`HostBuffer`]
#[derive(Clone, Copy, Debug, Default)]
pub struct HostAllocator;

impl BufferAllocator for HostAllocator {
    type Buffer = HostBuffer;

    fn create_buffer(&self, label: &str, size: u64) -> Result<HostBuffer> {
        Ok(HostBuffer::new(label, size))
    }
}
