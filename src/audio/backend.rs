//! Synthesis primitive capability driven by the voice engine.
//!
//! The engine never touches an audio graph directly: it creates, wires,
//! ramps and disposes nodes through this trait. Everything runs on the
//! control thread, so implementations use interior mutability and return
//! `!Send` futures.

use std::fmt;

use futures::future::LocalBoxFuture;

use super::error::AudioError;

/// Handle to a node owned by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OscillatorKind {
    Sine,
    Square,
    Sawtooth,
}

/// Connection target for a node's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Summing input of a gain node
    Input(NodeId),
    /// First (ratio 0) input of a cross-fade
    CrossFadeA(NodeId),
    /// Second (ratio 1) input of a cross-fade
    CrossFadeB(NodeId),
    /// Master output
    Output,
}

/// Audio graph primitives plus the shared output state
pub trait SynthBackend {
    /// Monotonic audio clock (seconds)
    fn now(&self) -> f64;

    /// Master mute flag
    fn is_muted(&self) -> bool;
    fn set_muted(&self, muted: bool);

    /// Start (or resume) audio output; may stay pending until playback is allowed
    fn start_audio(&self) -> LocalBoxFuture<'static, Result<(), AudioError>>;

    fn create_oscillator(&self, kind: OscillatorKind, frequency_hz: f32, detune_cents: f32) -> NodeId;
    fn set_oscillator(&self, id: NodeId, kind: OscillatorKind, frequency_hz: f32, detune_cents: f32);

    fn create_noise(&self, volume_db: f32) -> NodeId;
    fn set_noise_volume(&self, id: NodeId, volume_db: f32);

    fn create_cross_fade(&self, ratio: f32) -> NodeId;
    fn set_cross_fade(&self, id: NodeId, ratio: f32);

    fn create_gain(&self, value: f32) -> NodeId;

    /// Current (possibly mid-ramp) value of a gain node; 0 for unknown nodes
    fn gain(&self, id: NodeId) -> f32;

    /// Jump to a value, cancelling any ramp in progress
    fn set_gain(&self, id: NodeId, value: f32);

    /// Linear ramp from the current value to `target` over `duration_s`
    fn ramp_gain(&self, id: NodeId, target: f32, duration_s: f64);

    fn connect(&self, from: NodeId, to: Port);

    /// Release a node; unknown or already disposed ids are ignored
    fn dispose(&self, id: NodeId);
}

/// Linear gain ramp on the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    pub from: f32,
    pub to: f32,
    pub start_s: f64,
    pub end_s: f64,
}

impl GainRamp {
    /// Constant value (a ramp that already finished)
    pub fn hold(value: f32) -> Self {
        Self {
            from: value,
            to: value,
            start_s: 0.0,
            end_s: 0.0,
        }
    }

    /// Ramp from the value at `now_s` toward `target`
    pub fn retarget(&self, now_s: f64, target: f32, duration_s: f64) -> Self {
        Self {
            from: self.value_at(now_s),
            to: target,
            start_s: now_s,
            end_s: now_s + duration_s.max(0.0),
        }
    }

    pub fn value_at(&self, t: f64) -> f32 {
        if t >= self.end_s {
            return self.to;
        }
        if t <= self.start_s {
            return self.from;
        }
        let progress = ((t - self.start_s) / (self.end_s - self.start_s)) as f32;
        self.from + (self.to - self.from) * progress
    }
}
