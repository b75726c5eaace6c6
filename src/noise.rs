//! Noise generation for shape wobble.
//!
//! Wobble needs a smooth, deterministic 2D noise so consecutive index/time
//! samples vary continuously. Perlin gradient noise gives that.

use noise::{NoiseFn, Perlin};

/// Source of coherent 2D noise in [-1, 1]
pub trait NoiseSource {
    /// Sample noise at (x, y); same inputs always give the same value
    fn noise_2d(&self, x: f64, y: f64) -> f32;
}

/// Perlin noise generator
pub struct PerlinNoise {
    perlin: Perlin,
}

impl PerlinNoise {
    /// Create new noise generator with seed
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
        }
    }
}

impl NoiseSource for PerlinNoise {
    fn noise_2d(&self, x: f64, y: f64) -> f32 {
        (self.perlin.get([x, y]) as f32).clamp(-1.0, 1.0)
    }
}
