//! Preview synthesis for shapes.
//!
//! Shape parameters map onto a small voice graph (two oscillators through a
//! crossfade, plus noise, into a gain). Preview voices share one session that
//! unmutes the master output while any of them is sounding, and keyboard
//! triggers are reference-counted per note.

mod backend;
mod error;
mod glicol;
mod keyboard;
mod mapping;
mod nodes;
mod note;
mod scheduler;
mod session;
mod voice;

#[cfg(test)]
mod testing;

pub use backend::{GainRamp, NodeId, OscillatorKind, Port, SynthBackend};
pub use error::AudioError;
pub use glicol::GlicolBackend;
pub use keyboard::HeldNotes;
pub use mapping::{
    db_to_gain, map_grain_to_noise, map_preset_to_osc, map_roundness_to_fade, map_size_to_gain,
    map_wobble_to_detune, wobble_detune_depth, SynthControlSet, MAX_DETUNE_CENTS, MAX_GAIN_DB,
    MAX_NOISE_DB, MIN_GAIN_DB, MIN_NOISE_DB,
};
pub use nodes::{LiveSynth, VoiceNodes};
pub use note::{Note, NoteError, NoteKey};
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerId, TokioScheduler};
pub use session::{PreviewSession, SessionToken};
pub use voice::{VoiceEngine, VoiceHandle, VoiceState};
