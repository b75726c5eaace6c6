//! Per-tick shape pipeline: preset -> morph toward circle -> wobble.

use super::{apply_wobble, generate_circle_points, generate_points, morph_points, Point, ShapeError};
use crate::noise::{NoiseSource, PerlinNoise};
use crate::params::{normalized, GeometryConfig, ShapeParameters};

/// Shape generator combining geometry config with a noise source
pub struct ShapeGeometry {
    config: GeometryConfig,
    noise: Box<dyn NoiseSource>,
}

impl ShapeGeometry {
    /// Create a geometry pipeline with Perlin noise seeded from the config
    pub fn new(config: GeometryConfig) -> Self {
        let noise = Box::new(PerlinNoise::new(config.noise_seed));
        Self::with_noise(config, noise)
    }

    /// Create a geometry pipeline with a custom noise source
    pub fn with_noise(config: GeometryConfig, noise: Box<dyn NoiseSource>) -> Self {
        Self { config, noise }
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    /// Compute the rendered point sequence for one animation tick
    ///
    /// Points are in shape-local space (origin at the shape center); the
    /// renderer places them at `(params.x, params.y)`.
    ///
    /// # Arguments
    /// * `params` - Parameter snapshot
    /// * `time` - Wobble phase from a `WobbleClock`
    pub fn frame(&self, params: &ShapeParameters, time: f32) -> Result<Vec<Point>, ShapeError> {
        let radius = self.config.radius_for_size(params.size);
        let n = self.config.num_points;

        let base = generate_points(params.preset, Point::ZERO, radius, n);
        let circle = generate_circle_points(Point::ZERO, radius, n);
        let morphed = morph_points(&base, &circle, normalized(params.roundness))?;

        Ok(apply_wobble(
            &morphed,
            time,
            self.config.wobble_amount(params.wobble),
            normalized(params.wobble_randomness),
            self.config.noise_scale,
            self.noise.as_ref(),
        ))
    }
}

/// Wobble phase driver advanced once per animation frame
#[derive(Debug, Clone, Default)]
pub struct WobbleClock {
    time: f32,
}

impl WobbleClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current wobble phase
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Advance by a frame delta scaled by the speed slider
    ///
    /// Speed 50 runs at real time, 100 at double speed, 0 freezes the phase.
    pub fn advance(&mut self, delta_s: f32, wobble_speed: f32) -> f32 {
        let speed_multiplier = wobble_speed.max(0.0) / 50.0;
        self.time += delta_s.max(0.0) * speed_multiplier;
        self.time
    }
}
