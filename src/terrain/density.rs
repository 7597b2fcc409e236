//! Procedural density fields
//!
//! A density sampler fills a regular voxel grid with scalar values. Values
//! `<= 0` are solid. Samplers must be deterministic: the same origin, extent,
//! frequency and seed always give the same field, otherwise a brick that is
//! requested twice could come out different.

use glam::{IVec3, UVec3};
use noise::{Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin, Seedable, Simplex, SuperSimplex, Value};
use serde::{Deserialize, Serialize};

/// Scalar field generator consumed by the streaming manager
pub trait DensitySampler {
    /// Sample `extent` voxels starting at voxel-space `origin`.
    ///
    /// Returns one value per voxel, x fastest, then y, then z.
    fn sample_3d(&self, origin: IVec3, extent: UVec3, frequency: f32, seed: u32) -> Vec<f32>;
}

/// Visit every voxel of a box in x-fastest order
pub fn sample_grid(origin: IVec3, extent: UVec3, mut f: impl FnMut(IVec3) -> f32) -> Vec<f32> {
    let mut out = Vec::with_capacity((extent.x * extent.y * extent.z) as usize);
    for z in 0..extent.z as i32 {
        for y in 0..extent.y as i32 {
            for x in 0..extent.x as i32 {
                out.push(f(origin + IVec3::new(x, y, z)));
            }
        }
    }
    out
}

/// Base noise used by the fractal sampler
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseKind {
    Perlin,
    #[default]
    Simplex,
    OpenSimplex,
    SuperSimplex,
    Value,
}

/// Fractal noise parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Base noise function
    pub kind: NoiseKind,
    /// FBM octaves (detail levels)
    pub octaves: u32,
    /// Amplitude falloff per octave (0.5 typical)
    pub gain: f32,
    /// Frequency growth per octave (2.0 typical)
    pub lacunarity: f32,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            kind: NoiseKind::Simplex,
            octaves: 1,
            gain: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Fractal Brownian motion density field
#[derive(Clone, Debug, Default)]
pub struct FbmDensity {
    params: NoiseParams,
}

impl FbmDensity {
    pub fn new(params: NoiseParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    fn sample_with<T>(&self, origin: IVec3, extent: UVec3, frequency: f32, seed: u32) -> Vec<f32>
    where
        T: Default + Seedable,
        Fbm<T>: NoiseFn<f64, 3>,
    {
        let fbm = Fbm::<T>::new(seed)
            .set_octaves(self.params.octaves.max(1) as usize)
            .set_persistence(self.params.gain as f64)
            .set_lacunarity(self.params.lacunarity as f64)
            .set_frequency(frequency as f64);

        sample_grid(origin, extent, |p| {
            fbm.get([p.x as f64, p.y as f64, p.z as f64]) as f32
        })
    }
}

impl DensitySampler for FbmDensity {
    fn sample_3d(&self, origin: IVec3, extent: UVec3, frequency: f32, seed: u32) -> Vec<f32> {
        match self.params.kind {
            NoiseKind::Perlin => self.sample_with::<Perlin>(origin, extent, frequency, seed),
            NoiseKind::Simplex => self.sample_with::<Simplex>(origin, extent, frequency, seed),
            NoiseKind::OpenSimplex => self.sample_with::<OpenSimplex>(origin, extent, frequency, seed),
            NoiseKind::SuperSimplex => self.sample_with::<SuperSimplex>(origin, extent, frequency, seed),
            NoiseKind::Value => self.sample_with::<Value>(origin, extent, frequency, seed),
        }
    }
}

/// Half-space that is solid below a horizontal plane.
///
/// Voxel rows with `y < surface` are solid. Frequency and seed are ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneDensity {
    /// Voxel-space height of the surface
    pub surface: f32,
}

impl PlaneDensity {
    pub fn new(surface: f32) -> Self {
        Self { surface }
    }
}

impl DensitySampler for PlaneDensity {
    fn sample_3d(&self, origin: IVec3, extent: UVec3, _frequency: f32, _seed: u32) -> Vec<f32> {
        // Sample at voxel centers so integer surfaces never land on zero
        sample_grid(origin, extent, |p| p.y as f32 + 0.5 - self.surface)
    }
}

/// Density from an arbitrary function of the voxel coordinate
pub struct FnDensity<F>(pub F);

impl<F> DensitySampler for FnDensity<F>
where
    F: Fn(IVec3) -> f32,
{
    fn sample_3d(&self, origin: IVec3, extent: UVec3, _frequency: f32, _seed: u32) -> Vec<f32> {
        sample_grid(origin, extent, &self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_order() {
        let values = sample_grid(IVec3::new(10, 20, 30), UVec3::new(2, 2, 2), |p| {
            (p.x * 100 + p.y * 10 + p.z) as f32
        });
        assert_eq!(values.len(), 8);
        assert_eq!(values[0], 1230.0);
        assert_eq!(values[1], 1330.0);
        // y steps after a full x row
        assert_eq!(values[2], 1240.0);
        // z steps after a full xy slice
        assert_eq!(values[4], 1231.0);
    }

    #[test]
    fn test_fbm_deterministic() {
        let params = NoiseParams { octaves: 3, ..Default::default() };
        let a = FbmDensity::new(params.clone());
        let b = FbmDensity::new(params);

        let origin = IVec3::new(16, -8, 40);
        let first = a.sample_3d(origin, UVec3::splat(8), 0.05, 2);
        let second = a.sample_3d(origin, UVec3::splat(8), 0.05, 2);
        let fresh = b.sample_3d(origin, UVec3::splat(8), 0.05, 2);

        assert_eq!(first.len(), 512);
        assert_eq!(first, second);
        assert_eq!(first, fresh);
    }

    #[test]
    fn test_fbm_seed_changes_field() {
        let sampler = FbmDensity::new(NoiseParams { kind: NoiseKind::Perlin, ..Default::default() });
        let origin = IVec3::new(3, 5, 7);
        let a = sampler.sample_3d(origin, UVec3::splat(4), 0.13, 1);
        let b = sampler.sample_3d(origin, UVec3::splat(4), 0.13, 99);
        assert_ne!(a, b);
    }

    #[test]
    fn test_all_kinds_sample() {
        for kind in [
            NoiseKind::Perlin,
            NoiseKind::Simplex,
            NoiseKind::OpenSimplex,
            NoiseKind::SuperSimplex,
            NoiseKind::Value,
        ] {
            let sampler = FbmDensity::new(NoiseParams { kind, octaves: 2, ..Default::default() });
            let values = sampler.sample_3d(IVec3::ZERO, UVec3::new(4, 2, 3), 0.1, 7);
            assert_eq!(values.len(), 24, "{:?}", kind);
            assert!(values.iter().all(|v| v.is_finite()), "{:?}", kind);
        }
    }

    #[test]
    fn test_plane() {
        let plane = PlaneDensity::new(16.0);
        let below = plane.sample_3d(IVec3::new(0, 8, 0), UVec3::splat(8), 0.0, 0);
        assert!(below.iter().all(|&d| d <= 0.0));

        let above = plane.sample_3d(IVec3::new(0, 16, 0), UVec3::splat(8), 0.0, 0);
        assert!(above.iter().all(|&d| d > 0.0));
    }
}
