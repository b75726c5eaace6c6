//! Procedural polygon geometry: preset generation, morphing, and wobble.

mod frame;
mod morph;
mod points;
mod wobble;

use thiserror::Error;

// Re-export public types
pub use frame::{ShapeGeometry, WobbleClock};
pub use morph::morph_points;
pub use points::{distribute_edge_points, generate_circle_points, generate_points};
pub use wobble::apply_wobble;

/// 2D point in shape-local space
pub type Point = glam::Vec2;

/// Errors raised by geometry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Morph endpoints must have the same number of points
    #[error("point sequences must have the same length, got {from} and {to}")]
    LengthMismatch { from: usize, to: usize },
}

/// Flatten points into an interleaved `[x0, y0, x1, y1, ...]` buffer
pub fn flatten_points(points: &[Point]) -> &[f32] {
    bytemuck::cast_slice(points)
}
