//! Time-varying radial displacement of polygon points.

use super::Point;
use crate::noise::NoiseSource;

/// Displace points radially with a blend of sine and coherent noise
///
/// Each point moves along the ray from the shape-local origin through it,
/// never tangentially. With `amount == 0` the points come back unchanged.
///
/// # Arguments
/// * `points` - Shape in local space (origin at the shape center)
/// * `time` - Wobble phase (externally driven, see `WobbleClock`)
/// * `amount` - Peak displacement (canvas units)
/// * `randomness` - 0 = pure sine, 1 = pure noise (clamped)
/// * `noise_scale` - Index spacing for both terms (0.5 by default)
pub fn apply_wobble(
    points: &[Point],
    time: f32,
    amount: f32,
    randomness: f32,
    noise_scale: f32,
    noise: &dyn NoiseSource,
) -> Vec<Point> {
    if amount == 0.0 {
        return points.to_vec();
    }

    let randomness = randomness.clamp(0.0, 1.0);

    points
        .iter()
        .enumerate()
        .map(|(i, &point)| {
            let phase = i as f32 * noise_scale;
            let noise_value = noise.noise_2d(phase as f64, time as f64);
            let sine_value = (time * 2.0 + phase).sin();
            let blended = sine_value * (1.0 - randomness) + noise_value * randomness;
            let displacement = blended * amount;

            let angle = point.y.atan2(point.x);
            point + Point::new(angle.cos(), angle.sin()) * displacement
        })
        .collect()
}
