//! Mapping from shape parameters to synthesis controls.
//!
//! Every function clamps its normalized input to [0, 1] first, so values a
//! slider overshoots to during a drag still land on a defined output.

use std::f32::consts::TAU;

use super::backend::OscillatorKind;
use crate::params::{normalized, Preset, ShapeParameters};

/// Gain at size 0 (dB)
pub const MIN_GAIN_DB: f32 = -30.0;
/// Gain at size 100 (dB)
pub const MAX_GAIN_DB: f32 = -6.0;
/// Noise level just above silence (dB)
pub const MIN_NOISE_DB: f32 = -40.0;
/// Noise level at full grain (dB)
pub const MAX_NOISE_DB: f32 = -12.0;
/// Detune depth at wobble 100 (cents)
pub const MAX_DETUNE_CENTS: f32 = 50.0;

/// Synthesis controls derived from a parameter snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthControlSet {
    /// Waveform of the preset oscillator (cross-faded against a sine)
    pub oscillator_type: OscillatorKind,

    /// 0 = preset oscillator only, 1 = sine only
    pub cross_fade_ratio: f32,

    /// Output level (dB)
    pub gain_db: f32,

    /// Noise level (dB, `-inf` = silent)
    pub noise_db: f32,

    /// Oscillator detune (cents)
    pub detune_cents: f32,
}

impl SynthControlSet {
    /// Map a parameter snapshot at detune phase `phase_s`
    pub fn from_params(params: &ShapeParameters, phase_s: f64) -> Self {
        Self {
            oscillator_type: map_preset_to_osc(params.preset),
            cross_fade_ratio: map_roundness_to_fade(params.roundness),
            gain_db: map_size_to_gain(params.size),
            noise_db: map_grain_to_noise(params.grain),
            detune_cents: map_wobble_to_detune(params.wobble, phase_s),
        }
    }

    /// Linear output gain
    pub fn gain(&self) -> f32 {
        db_to_gain(self.gain_db)
    }
}

pub fn map_preset_to_osc(preset: Preset) -> OscillatorKind {
    match preset {
        Preset::Triangle => OscillatorKind::Sawtooth,
        Preset::Square => OscillatorKind::Square,
        Preset::Circle => OscillatorKind::Sine,
    }
}

pub fn map_roundness_to_fade(roundness: f32) -> f32 {
    normalized(roundness)
}

pub fn map_size_to_gain(size: f32) -> f32 {
    MIN_GAIN_DB + (MAX_GAIN_DB - MIN_GAIN_DB) * normalized(size)
}

/// Noise level in dB; a mix of exactly zero is silence
pub fn map_grain_to_noise(grain: f32) -> f32 {
    let mix = normalized(grain);
    if mix == 0.0 {
        return f32::NEG_INFINITY;
    }
    MIN_NOISE_DB + (MAX_NOISE_DB - MIN_NOISE_DB) * mix
}

/// Peak detune for a wobble value (cents)
pub fn wobble_detune_depth(wobble: f32) -> f32 {
    normalized(wobble) * MAX_DETUNE_CENTS
}

/// Detune at `phase_s`: the depth swung by a 1 Hz sine, bounded by the depth
pub fn map_wobble_to_detune(wobble: f32, phase_s: f64) -> f32 {
    let phase = (phase_s.fract() as f32) * TAU;
    wobble_detune_depth(wobble) * phase.sin()
}

/// Convert decibels to linear amplitude (`-inf` dB is 0)
pub fn db_to_gain(db: f32) -> f32 {
    if db == f32::NEG_INFINITY {
        return 0.0;
    }
    10f32.powf(db / 20.0)
}
