//! Streaming world configuration

use std::path::Path;

use glam::UVec3;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::terrain::density::NoiseParams;
use crate::voxel::brick::{BrickLayout, MAX_BRICK_SIZE};
use crate::voxel::grid::Grid;
use crate::voxel::streaming::brick_pool::DEFAULT_BRICK_POOL_SIZE;
use crate::voxel::streaming::index_table::MAX_SLOT;
use crate::voxel::streaming::request_queue::MAX_REQUESTS_PER_FRAME;

/// Density field parameters used when a brick is generated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Random seed
    pub seed: u32,
    /// Sampling frequency in voxel space
    pub frequency: f32,
    /// Fractal noise parameters
    pub noise: NoiseParams,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: 2,
            frequency: 0.005,
            noise: NoiseParams::default(),
        }
    }
}

/// Everything fixed at world creation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Grid dimensions in cells
    pub grid_dims: [u32; 3],
    /// Voxels per brick axis
    pub brick_size: u32,
    /// Maximum resident bricks
    pub pool_capacity: u32,
    /// Maximum requests read per frame
    pub queue_capacity: u32,
    /// Density field parameters
    pub generation: GenerationParams,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            grid_dims: [64, 64, 64],
            brick_size: 8,
            pool_capacity: DEFAULT_BRICK_POOL_SIZE,
            queue_capacity: MAX_REQUESTS_PER_FRAME,
            generation: GenerationParams::default(),
        }
    }
}

impl StreamingConfig {
    /// Load and validate a JSON config file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the config as JSON
    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reject configurations the wire formats cannot express
    pub fn validate(&self) -> Result<()> {
        if self.grid_dims.contains(&0) {
            return Err(Error::Config(format!("grid dimensions {:?} must be non-zero", self.grid_dims)));
        }
        if !(1..=MAX_BRICK_SIZE).contains(&self.brick_size) {
            return Err(Error::Config(format!(
                "brick size {} outside 1..={}",
                self.brick_size, MAX_BRICK_SIZE
            )));
        }
        // Voxel coordinates of the far corner must fit i32 for the sampler and the GPU
        if self
            .grid_dims
            .iter()
            .any(|&d| d as u64 * self.brick_size as u64 > i32::MAX as u64)
        {
            return Err(Error::Config(format!(
                "grid {:?} x brick {} overflows voxel coordinates",
                self.grid_dims, self.brick_size
            )));
        }
        // Linear cell indices are i32 on the GPU and u32 in the index counters
        let cells: u64 = self.grid_dims.iter().map(|&d| d as u64).product();
        if cells > i32::MAX as u64 {
            return Err(Error::Config(format!(
                "grid {:?} has {} cells, limit is {}",
                self.grid_dims,
                cells,
                i32::MAX
            )));
        }
        if self.pool_capacity == 0 || self.pool_capacity > MAX_SLOT + 1 {
            return Err(Error::Config(format!(
                "pool capacity {} outside 1..={}",
                self.pool_capacity,
                MAX_SLOT as u64 + 1
            )));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be at least 1".to_string()));
        }
        if !self.generation.frequency.is_finite() {
            return Err(Error::Config("generation frequency must be finite".to_string()));
        }
        Ok(())
    }

    pub fn grid(&self) -> Grid {
        Grid::new(UVec3::from_array(self.grid_dims))
    }

    pub fn layout(&self) -> BrickLayout {
        BrickLayout::new(self.brick_size)
    }
}
