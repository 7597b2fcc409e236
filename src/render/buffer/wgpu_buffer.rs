//! wgpu storage buffer backend

use super::gpu_buffer::{check_range, BufferAllocator, GpuBuffer};
use crate::core::{Error, Result};

/// Storage buffer living in GPU memory.
///
/// Uploads go through `Queue::write_buffer` and land before the next
/// submission. Downloads copy the range into a staging buffer and block on
/// the map, so they are meant for the once-per-frame queue readback only.
pub struct WgpuBuffer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffer: wgpu::Buffer,
    label: String,
}

impl WgpuBuffer {
    /// Create a zeroed storage buffer
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, size: u64) -> Self {
        // wgpu rejects zero-sized bindings, and sizes must be 4-byte aligned
        let size = size.max(wgpu::COPY_BUFFER_ALIGNMENT).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            device: device.clone(),
            queue: queue.clone(),
            buffer,
            label: label.to_string(),
        }
    }

    /// Underlying buffer for bind group creation
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    fn check_aligned(&self, offset: u64, len: u64) -> Result<()> {
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(Error::Gpu(format!(
                "{}: unaligned access at offset {} len {}",
                self.label, offset, len
            )));
        }
        Ok(())
    }
}

impl GpuBuffer for WgpuBuffer {
    fn size(&self) -> u64 {
        self.buffer.size()
    }

    fn upload(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(offset, data.len() as u64, self.size())?;
        self.check_aligned(offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }
        self.queue.write_buffer(&self.buffer, offset, data);
        Ok(())
    }

    fn download(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let len = out.len() as u64;
        check_range(offset, len, self.size())?;
        self.check_aligned(offset, len)?;
        if out.is_empty() {
            return Ok(());
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("brickmap_readback_staging"),
            size: len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("brickmap_readback"),
        });
        encoder.copy_buffer_to_buffer(&self.buffer, offset, &staging, 0, len);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| Error::Gpu(format!("{}: poll failed: {:?}", self.label, e)))?;

        rx.recv()
            .map_err(|e| Error::Gpu(format!("{}: map callback dropped: {}", self.label, e)))?
            .map_err(|e| Error::Gpu(format!("{}: map failed: {}", self.label, e)))?;

        {
            let data = slice.get_mapped_range();
            out.copy_from_slice(&data);
        }
        staging.unmap();
        Ok(())
    }
}

/// Allocator creating [`WgpuBuffer`]s on one device
pub struct WgpuAllocator {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuAllocator {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
        }
    }
}

impl BufferAllocator for WgpuAllocator {
    type Buffer = WgpuBuffer;

    fn create_buffer(&self, label: &str, size: u64) -> Result<WgpuBuffer> {
        let max = self.device.limits().max_buffer_size;
        if size > max {
            return Err(Error::Gpu(format!(
                "{} needs {}MB, device limit is {}MB",
                label,
                size / 1024 / 1024,
                max / 1024 / 1024
            )));
        }
        Ok(WgpuBuffer::new(&self.device, &self.queue, label, size))
    }
}
