//! Held-note triggers ref-counted onto shared preview voices.
//!
//! Several physical keys can resolve to the same `(note, octave)`. They share
//! one voice, which stops only when the last of them is released.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use super::backend::SynthBackend;
use super::note::NoteKey;
use super::voice::{VoiceEngine, VoiceHandle};
use crate::params::ShapeParameters;

struct HeldNote {
    triggers: HashSet<String>,
    /// Set once the voice start resolves
    voice: Option<VoiceHandle>,
    /// Distinguishes this hold from a later re-press of the same key
    generation: u64,
}

#[derive(Default)]
struct HeldState {
    triggers: HashMap<String, NoteKey>,
    notes: HashMap<NoteKey, HeldNote>,
    next_generation: u64,
}

/// Press/release front end for held preview notes
pub struct HeldNotes<B: SynthBackend + 'static> {
    engine: VoiceEngine<B>,
    state: Rc<RefCell<HeldState>>,
}

impl<B: SynthBackend + 'static> Clone for HeldNotes<B> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl<B: SynthBackend + 'static> HeldNotes<B> {
    pub fn new(engine: VoiceEngine<B>) -> Self {
        Self {
            engine,
            state: Rc::new(RefCell::new(HeldState::default())),
        }
    }

    pub fn engine(&self) -> &VoiceEngine<B> {
        &self.engine
    }

    /// Press `trigger` with the note in `params`
    ///
    /// Returns the voice the trigger joined, or `None` if it was already held
    /// or was released (or everything was stopped) before the voice started.
    pub async fn press(&self, trigger: &str, params: &ShapeParameters) -> Option<VoiceHandle> {
        let key = NoteKey::new(params.note, params.clamped_octave());

        let generation = {
            let mut state = self.state.borrow_mut();
            if state.triggers.contains_key(trigger) {
                return None; // key repeat
            }
            state.triggers.insert(trigger.to_string(), key);

            if let Some(note) = state.notes.get_mut(&key) {
                note.triggers.insert(trigger.to_string());
                debug!("Trigger '{}' joined held {}", trigger, key);
                return note.voice;
            }

            let generation = state.next_generation;
            state.next_generation += 1;
            state.notes.insert(
                key,
                HeldNote {
                    triggers: HashSet::from([trigger.to_string()]),
                    voice: None,
                    generation,
                },
            );
            generation
        };

        let handle = self.engine.start_voice(params).await;

        let still_held = {
            let mut state = self.state.borrow_mut();
            match state.notes.get_mut(&key) {
                Some(note) if note.generation == generation => {
                    note.voice = Some(handle);
                    true
                }
                _ => false,
            }
        };

        if still_held {
            Some(handle)
        } else {
            debug!("{} released before its voice started, stopping", key);
            self.engine.stop_voice(handle);
            None
        }
    }

    /// Release `trigger`; the voice stops when no trigger holds it
    pub fn release(&self, trigger: &str) {
        let handle = {
            let mut state = self.state.borrow_mut();
            let Some(key) = state.triggers.remove(trigger) else {
                return;
            };
            let Some(note) = state.notes.get_mut(&key) else {
                return;
            };
            note.triggers.remove(trigger);
            if !note.triggers.is_empty() {
                return;
            }
            state.notes.remove(&key).and_then(|note| note.voice)
        };

        if let Some(handle) = handle {
            self.engine.stop_voice(handle);
        }
    }

    /// Forget every held trigger and stop all voices (e.g. on focus loss)
    pub fn release_all(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.triggers.clear();
            state.notes.clear();
        }
        self.engine.stop_all();
    }

    /// Voice currently held for a key
    pub fn held_voice(&self, key: NoteKey) -> Option<VoiceHandle> {
        self.state.borrow().notes.get(&key).and_then(|note| note.voice)
    }

    /// Number of triggers currently down
    pub fn held_triggers(&self) -> usize {
        self.state.borrow().triggers.len()
    }
}
