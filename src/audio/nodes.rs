//! Voice node graph shared by preview voices and the live synth.
//!
//! ```text
//! osc A (preset waveform) ─┐
//!                          ├─ cross-fade ─┐
//! osc B (sine) ────────────┘              ├─ gain ─ output
//! noise ──────────────────────────────────┘
//! ```

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use super::backend::{NodeId, OscillatorKind, Port, SynthBackend};
use super::mapping::SynthControlSet;
use crate::params::ShapeParameters;

/// Nodes making up one voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceNodes {
    pub osc_a: NodeId,
    pub osc_b: NodeId,
    pub cross_fade: NodeId,
    pub noise: NodeId,
    pub gain: NodeId,
}

impl VoiceNodes {
    /// Create and wire a voice with its gain starting at `initial_gain`
    pub fn build<B: SynthBackend + ?Sized>(
        backend: &B,
        controls: &SynthControlSet,
        frequency_hz: f32,
        initial_gain: f32,
    ) -> Self {
        let osc_a =
            backend.create_oscillator(controls.oscillator_type, frequency_hz, controls.detune_cents);
        let osc_b =
            backend.create_oscillator(OscillatorKind::Sine, frequency_hz, controls.detune_cents);
        let cross_fade = backend.create_cross_fade(controls.cross_fade_ratio);
        let noise = backend.create_noise(controls.noise_db);
        let gain = backend.create_gain(initial_gain);

        backend.connect(osc_a, Port::CrossFadeA(cross_fade));
        backend.connect(osc_b, Port::CrossFadeB(cross_fade));
        backend.connect(cross_fade, Port::Input(gain));
        backend.connect(noise, Port::Input(gain));
        backend.connect(gain, Port::Output);

        Self {
            osc_a,
            osc_b,
            cross_fade,
            noise,
            gain,
        }
    }

    /// Push new controls to every node except the gain
    pub fn apply<B: SynthBackend + ?Sized>(
        &self,
        backend: &B,
        controls: &SynthControlSet,
        frequency_hz: f32,
    ) {
        backend.set_oscillator(
            self.osc_a,
            controls.oscillator_type,
            frequency_hz,
            controls.detune_cents,
        );
        backend.set_oscillator(
            self.osc_b,
            OscillatorKind::Sine,
            frequency_hz,
            controls.detune_cents,
        );
        backend.set_cross_fade(self.cross_fade, controls.cross_fade_ratio);
        backend.set_noise_volume(self.noise, controls.noise_db);
    }

    pub fn dispose<B: SynthBackend + ?Sized>(&self, backend: &B) {
        for id in [self.osc_a, self.osc_b, self.cross_fade, self.noise, self.gain] {
            backend.dispose(id);
        }
    }
}

/// Continuous voice that follows the shape parameters while the app runs
///
/// Preview voices never touch it directly: the preview session silences and
/// restores its gain around auditions.
pub struct LiveSynth<B: SynthBackend> {
    backend: Rc<B>,
    nodes: VoiceNodes,
    silenced: Cell<bool>,
    disposed: Cell<bool>,
}

impl<B: SynthBackend> LiveSynth<B> {
    /// Create the live voice sounding at the parameters' level
    pub fn new(backend: Rc<B>, params: &ShapeParameters, phase_s: f64) -> Self {
        let controls = SynthControlSet::from_params(params, phase_s);
        let frequency = params.note.frequency(params.clamped_octave());
        let nodes = VoiceNodes::build(backend.as_ref(), &controls, frequency, controls.gain());
        debug!("Live synth started at {:.2} Hz", frequency);

        Self {
            backend,
            nodes,
            silenced: Cell::new(false),
            disposed: Cell::new(false),
        }
    }

    /// Follow a parameter change (called on every edit and animation tick)
    pub fn apply(&self, params: &ShapeParameters, phase_s: f64) {
        if self.disposed.get() {
            return;
        }
        let controls = SynthControlSet::from_params(params, phase_s);
        let frequency = params.note.frequency(params.clamped_octave());
        self.nodes.apply(self.backend.as_ref(), &controls, frequency);

        // While silenced the session owns the gain
        if !self.silenced.get() {
            self.backend.set_gain(self.nodes.gain, controls.gain());
        }
    }

    pub fn gain(&self) -> f32 {
        self.backend.gain(self.nodes.gain)
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced.get()
    }

    pub fn nodes(&self) -> &VoiceNodes {
        &self.nodes
    }

    /// Drop the gain to zero so a preview is heard in isolation
    pub(crate) fn silence(&self) {
        self.silenced.set(true);
        self.backend.set_gain(self.nodes.gain, 0.0);
    }

    /// Put back the gain captured before silencing
    pub(crate) fn restore_gain(&self, gain: f32) {
        self.silenced.set(false);
        if !self.disposed.get() {
            self.backend.set_gain(self.nodes.gain, gain);
        }
    }

    pub fn dispose(&self) {
        if !self.disposed.replace(true) {
            self.nodes.dispose(self.backend.as_ref());
        }
    }
}

impl<B: SynthBackend> Drop for LiveSynth<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
