//! Geometry and wobble configuration.

use super::normalized;

/// Procedural geometry parameters
#[derive(Debug, Clone)]
pub struct GeometryConfig {
    /// Points per polygon (every sequence in a frame shares this length)
    pub num_points: usize,

    /// Radius at size 50 (canvas units)
    /// Size 0 renders at half this radius, size 100 at 1.5x
    pub base_radius: f32,

    /// Radial displacement at wobble 100 (canvas units)
    pub max_wobble: f32,

    /// Index spacing fed into the wobble noise and sine terms
    pub noise_scale: f32,

    /// Perlin noise seed
    pub noise_seed: u32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            num_points: 64,
            base_radius: 100.0,
            max_wobble: 20.0,
            noise_scale: 0.5,
            noise_seed: 42,
        }
    }
}

impl GeometryConfig {
    /// Polygon radius for a size slider value
    pub fn radius_for_size(&self, size: f32) -> f32 {
        self.base_radius * (0.5 + normalized(size))
    }

    /// Wobble displacement for a wobble slider value
    pub fn wobble_amount(&self, wobble: f32) -> f32 {
        normalized(wobble) * self.max_wobble
    }
}
