//! Shape parameter snapshot owned by the UI layer.

use std::fmt;
use std::str::FromStr;

use crate::audio::Note;

/// Base polygon preset (before morphing toward a circle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Preset {
    Triangle,
    #[default]
    Square,
    Circle,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Triangle, Preset::Square, Preset::Circle];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Triangle => "triangle",
            Preset::Square => "square",
            Preset::Circle => "circle",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "triangle" => Ok(Preset::Triangle),
            "square" => Ok(Preset::Square),
            "circle" => Ok(Preset::Circle),
            other => Err(format!("unknown preset '{}'", other)),
        }
    }
}

/// Shape parameters (read-only snapshot per invocation)
///
/// Slider values are percentages in 0-100. The core clamps them before use,
/// so transient overshoot while dragging is harmless.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeParameters {
    /// Base polygon
    pub preset: Preset,

    /// Morph from preset (0) to circle (100); also the oscillator cross-fade
    pub roundness: f32,

    /// Visual radius and output volume (0-100)
    pub size: f32,

    /// Radial wobble amount (0-100)
    pub wobble: f32,

    /// Wobble animation speed (50 = 1x, 100 = 2x, 0 = frozen)
    pub wobble_speed: f32,

    /// Blend of sine wobble (0) and noise wobble (100)
    pub wobble_randomness: f32,

    /// White noise mix (0-100)
    pub grain: f32,

    /// Pitch class
    pub note: Note,

    /// Octave (1-8)
    pub octave: u8,

    /// Canvas position (canvas units, fed back from drag events)
    pub x: f32,
    pub y: f32,
}

impl Default for ShapeParameters {
    fn default() -> Self {
        Self {
            preset: Preset::Square,
            roundness: 15.0,
            size: 50.0,
            wobble: 20.0, // subtle
            wobble_speed: 50.0,
            wobble_randomness: 50.0,
            grain: 0.0,
            note: Note::C,
            octave: 4, // middle octave
            x: 0.0,
            y: 0.0,
        }
    }
}

impl ShapeParameters {
    /// Octave clamped to the supported 1-8 range
    pub fn clamped_octave(&self) -> u8 {
        self.octave.clamp(1, 8)
    }
}
