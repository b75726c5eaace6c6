//! Parameter definitions with units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Units (seconds, canvas units, percent of a 0-100 slider)
//! - Documented ranges and meanings
//! - Type safety where possible

mod envelope;
mod geometry;
mod render;
mod shape;

// Re-export all types
pub use envelope::EnvelopeConfig;
pub use geometry::GeometryConfig;
pub use render::CanvasConfig;
pub use shape::{Preset, ShapeParameters};

/// Clamp a value to [0, 1].
pub(crate) fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Normalize a 0-100 slider value to [0, 1], clamping overshoot.
pub(crate) fn normalized(percent: f32) -> f32 {
    clamp01(percent / 100.0)
}
