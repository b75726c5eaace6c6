//! Preview voice lifecycle: start, release, one-shot auditions, stop-all.
//!
//! Each voice moves `Starting -> Sounding -> Releasing -> Disposed`. The only
//! suspension point is the session acquisition in `Starting`; disposal runs
//! from scheduler callbacks after the release ramp. Every voice holds one
//! session token from `Sounding` until disposal, so the output state is
//! restored only after the last voice is gone, whatever order the timers
//! fire in.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::backend::SynthBackend;
use super::mapping::{wobble_detune_depth, SynthControlSet};
use super::nodes::{LiveSynth, VoiceNodes};
use super::note::NoteKey;
use super::scheduler::{Scheduler, TimerId};
use super::session::{PreviewSession, SessionToken};
use crate::params::{EnvelopeConfig, ShapeParameters};

/// Lifecycle phase of a preview voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Waiting for the preview session (audio start)
    Starting,
    /// Attack done or in progress, sounding until stopped
    Sounding,
    /// Fading out, disposal scheduled
    Releasing,
    /// Nodes released; the handle is dead
    Disposed,
}

/// Handle to a preview voice; stale handles are harmless
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(u64);

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

struct PreviewVoice {
    key: NoteKey,
    /// Snapshot read at start; the detune keeps following the wobble phase
    params: ShapeParameters,
    frequency_hz: f32,
    state: Cell<VoiceState>,
    nodes: Cell<Option<VoiceNodes>>,
    token: RefCell<Option<SessionToken>>,
    /// Stop arrived while still starting
    stop_requested: Cell<bool>,
    /// Pending one-shot hold timer
    hold_timer: Cell<Option<TimerId>>,
}

struct EngineInner<B: SynthBackend + 'static> {
    backend: Rc<B>,
    scheduler: Rc<dyn Scheduler>,
    session: PreviewSession<B>,
    envelope: EnvelopeConfig,
    live: RefCell<Option<Rc<LiveSynth<B>>>>,
    voices: RefCell<BTreeMap<VoiceHandle, Rc<PreviewVoice>>>,
    next_id: Cell<u64>,
    /// Pending detune update for sounding voices
    modulation_timer: Cell<Option<TimerId>>,
}

/// Preview voice manager
///
/// Cheap to clone; clones share the same voices and session.
pub struct VoiceEngine<B: SynthBackend + 'static> {
    inner: Rc<EngineInner<B>>,
}

impl<B: SynthBackend + 'static> Clone for VoiceEngine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<B: SynthBackend + 'static> VoiceEngine<B> {
    pub fn new(backend: Rc<B>, scheduler: Rc<dyn Scheduler>, envelope: EnvelopeConfig) -> Self {
        let session = PreviewSession::new(Rc::clone(&backend));
        Self {
            inner: Rc::new(EngineInner {
                backend,
                scheduler,
                session,
                envelope,
                live: RefCell::new(None),
                voices: RefCell::new(BTreeMap::new()),
                next_id: Cell::new(1),
                modulation_timer: Cell::new(None),
            }),
        }
    }

    /// Set (or clear) the continuous voice the session silences and restores
    pub fn attach_live_synth(&self, live: Option<Rc<LiveSynth<B>>>) {
        *self.inner.live.borrow_mut() = live;
    }

    pub fn backend(&self) -> &Rc<B> {
        &self.inner.backend
    }

    pub fn session(&self) -> &PreviewSession<B> {
        &self.inner.session
    }

    pub fn envelope(&self) -> &EnvelopeConfig {
        &self.inner.envelope
    }

    /// Start a held preview voice that sounds until `stop_voice`
    ///
    /// The parameters are read once, before the session is acquired. If the
    /// output cannot be started the voice still exists but stays silent.
    /// Dropping the future before the session answers forgets the voice.
    pub async fn start_voice(&self, params: &ShapeParameters) -> VoiceHandle {
        let inner = &self.inner;
        let key = NoteKey::new(params.note, params.clamped_octave());
        let frequency = key.note.frequency(key.octave);
        let handle = inner.register(key, params.clone(), frequency);

        let mut abandoned = AbandonedStart {
            inner,
            handle,
            armed: true,
        };
        let live = inner.live.borrow().clone();
        let token = inner.session.acquire(live.as_deref()).await;
        abandoned.armed = false;

        let Some(voice) = inner.voice(handle) else {
            inner.session.release(token, live.as_deref());
            return handle;
        };

        let controls = SynthControlSet::from_params(params, inner.backend.now());
        let target = if token.is_audible() { controls.gain() } else { 0.0 };
        let nodes = VoiceNodes::build(inner.backend.as_ref(), &controls, frequency, 0.0);
        inner
            .backend
            .ramp_gain(nodes.gain, target, inner.envelope.attack_s);

        voice.nodes.set(Some(nodes));
        *voice.token.borrow_mut() = Some(token);
        voice.state.set(VoiceState::Sounding);
        debug!("{} sounding {} at {:.2} Hz", handle, voice.key, frequency);
        inner.ensure_modulation();

        if voice.stop_requested.get() {
            debug!("{} was stopped while starting", handle);
            inner.begin_release(handle, &voice, inner.envelope.release_s);
        }

        handle
    }

    /// Release a voice: fade out, then dispose and hand back its session token
    ///
    /// Stopping a voice that is still starting releases it as soon as it
    /// starts. Releasing or disposed voices are left alone.
    pub fn stop_voice(&self, handle: VoiceHandle) {
        let Some(voice) = self.inner.voice(handle) else {
            return;
        };

        match voice.state.get() {
            VoiceState::Starting => voice.stop_requested.set(true),
            VoiceState::Sounding => {
                self.inner
                    .begin_release(handle, &voice, self.inner.envelope.release_s);
            }
            VoiceState::Releasing | VoiceState::Disposed => {}
        }
    }

    /// Audition a note: attack, hold, then a linear fade to silence
    pub async fn play_one_shot(&self, params: &ShapeParameters) -> VoiceHandle {
        let handle = self.start_voice(params).await;
        let inner = &self.inner;

        if let Some(voice) = inner.voice(handle) {
            if voice.state.get() == VoiceState::Sounding {
                let weak = Rc::downgrade(inner);
                let fade_s = inner.envelope.one_shot_fade_s;
                let timer = inner.scheduler.schedule(
                    inner.envelope.one_shot_release_delay(),
                    Box::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.end_hold(handle, fade_s);
                        }
                    }),
                );
                voice.hold_timer.set(Some(timer));
            }
        }

        handle
    }

    /// Ask every voice to stop, whatever its timers are doing
    pub fn stop_all(&self) {
        let handles: Vec<VoiceHandle> = self.inner.voices.borrow().keys().copied().collect();
        debug!("Stopping all {} preview voices", handles.len());
        for handle in handles {
            self.stop_voice(handle);
        }
    }

    /// Current phase of a voice (`Disposed` for unknown handles)
    pub fn voice_state(&self, handle: VoiceHandle) -> VoiceState {
        self.inner
            .voice(handle)
            .map_or(VoiceState::Disposed, |voice| voice.state.get())
    }

    /// Voices not yet disposed
    pub fn active_voices(&self) -> usize {
        self.inner.voices.borrow().len()
    }

    /// Graph nodes of a voice that has started
    pub fn voice_nodes(&self, handle: VoiceHandle) -> Option<VoiceNodes> {
        self.inner.voice(handle).and_then(|voice| voice.nodes.get())
    }
}

impl<B: SynthBackend + 'static> EngineInner<B> {
    fn register(&self, key: NoteKey, params: ShapeParameters, frequency_hz: f32) -> VoiceHandle {
        let handle = VoiceHandle(self.next_id.get());
        self.next_id.set(handle.0 + 1);

        let voice = PreviewVoice {
            key,
            params,
            frequency_hz,
            state: Cell::new(VoiceState::Starting),
            nodes: Cell::new(None),
            token: RefCell::new(None),
            stop_requested: Cell::new(false),
            hold_timer: Cell::new(None),
        };
        self.voices.borrow_mut().insert(handle, Rc::new(voice));
        handle
    }

    fn voice(&self, handle: VoiceHandle) -> Option<Rc<PreviewVoice>> {
        self.voices.borrow().get(&handle).cloned()
    }

    /// Sounding -> Releasing: ramp to zero and schedule disposal
    fn begin_release(self: &Rc<Self>, handle: VoiceHandle, voice: &PreviewVoice, ramp_s: f64) {
        if let Some(timer) = voice.hold_timer.take() {
            self.scheduler.cancel(timer);
        }

        voice.state.set(VoiceState::Releasing);
        if let Some(nodes) = voice.nodes.get() {
            self.backend.ramp_gain(nodes.gain, 0.0, ramp_s);
        }

        let weak: Weak<Self> = Rc::downgrade(self);
        self.scheduler.schedule(
            self.envelope.disposal_delay(ramp_s),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.finish(handle);
                }
            }),
        );
        debug!("{} releasing over {:.3}s", handle, ramp_s);
    }

    /// Keep a detune update pending while any started voice wobbles
    fn ensure_modulation(self: &Rc<Self>) {
        if self.modulation_timer.get().is_some() || !self.has_wobbling_voice() {
            return;
        }

        let weak: Weak<Self> = Rc::downgrade(self);
        let timer = self.scheduler.schedule(
            self.envelope.modulation_interval(),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.modulate();
                }
            }),
        );
        self.modulation_timer.set(Some(timer));
    }

    fn has_wobbling_voice(&self) -> bool {
        self.voices.borrow().values().any(|voice| {
            voice.nodes.get().is_some() && wobble_detune_depth(voice.params.wobble) > 0.0
        })
    }

    /// Re-sample the wobble detune of every sounding or releasing voice
    fn modulate(self: &Rc<Self>) {
        self.modulation_timer.set(None);
        let phase_s = self.backend.now();
        let voices: Vec<Rc<PreviewVoice>> = self.voices.borrow().values().cloned().collect();

        for voice in voices {
            if let Some(nodes) = voice.nodes.get() {
                let controls = SynthControlSet::from_params(&voice.params, phase_s);
                nodes.apply(self.backend.as_ref(), &controls, voice.frequency_hz);
            }
        }
        self.ensure_modulation();
    }

    /// One-shot hold elapsed
    fn end_hold(self: &Rc<Self>, handle: VoiceHandle, fade_s: f64) {
        let Some(voice) = self.voice(handle) else {
            return;
        };
        voice.hold_timer.set(None);
        if voice.state.get() == VoiceState::Sounding {
            self.begin_release(handle, &voice, fade_s);
        }
    }

    /// Releasing -> Disposed; a no-op for handles already gone
    fn finish(&self, handle: VoiceHandle) {
        let Some(voice) = self.voices.borrow_mut().remove(&handle) else {
            return;
        };

        if let Some(nodes) = voice.nodes.take() {
            nodes.dispose(self.backend.as_ref());
        }
        voice.state.set(VoiceState::Disposed);

        if let Some(token) = voice.token.borrow_mut().take() {
            let live = self.live.borrow().clone();
            self.session.release(token, live.as_deref());
        }
        if !self.has_wobbling_voice() {
            if let Some(timer) = self.modulation_timer.take() {
                self.scheduler.cancel(timer);
            }
        }
        debug!("{} disposed ({} still active)", handle, self.voices.borrow().len());
    }
}

/// Forgets a voice whose `start_voice` future was dropped while starting
struct AbandonedStart<'a, B: SynthBackend + 'static> {
    inner: &'a EngineInner<B>,
    handle: VoiceHandle,
    armed: bool,
}

impl<B: SynthBackend + 'static> Drop for AbandonedStart<'_, B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let removed = self.inner.voices.borrow_mut().remove(&self.handle);
        if let Some(voice) = removed {
            voice.state.set(VoiceState::Disposed);
            debug!("{} start abandoned", self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::scheduler::ManualScheduler;
    use crate::audio::testing::{RecordingBackend, StartMode};
    use crate::audio::Note;
    use crate::audio::MAX_NOISE_DB;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use futures::FutureExt;
    use std::time::Duration;

    struct Harness {
        backend: Rc<RecordingBackend>,
        scheduler: Rc<ManualScheduler>,
        engine: VoiceEngine<RecordingBackend>,
    }

    fn harness() -> Harness {
        let backend = Rc::new(RecordingBackend::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let engine = VoiceEngine::new(
            Rc::clone(&backend),
            scheduler.clone(),
            EnvelopeConfig::default(),
        );
        Harness {
            backend,
            scheduler,
            engine,
        }
    }

    const ONE_MS: Duration = Duration::from_millis(1);

    /// No wobble, so no detune updates are scheduled
    fn steady() -> ShapeParameters {
        ShapeParameters {
            wobble: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_start_then_stop_runs_full_lifecycle() {
        let h = harness();
        let params = ShapeParameters::default();
        let handle = block_on(h.engine.start_voice(&params));

        assert_eq!(h.engine.voice_state(handle), VoiceState::Sounding);
        assert!(!h.backend.is_muted());
        let nodes = h.engine.voice_nodes(handle).unwrap();
        let expected = SynthControlSet::from_params(&params, 0.0).gain();
        assert_eq!(h.backend.gain_target(nodes.gain), Some(expected));

        h.engine.stop_voice(handle);
        assert_eq!(h.engine.voice_state(handle), VoiceState::Releasing);
        assert_eq!(h.backend.gain_target(nodes.gain), Some(0.0));

        let disposal = h.engine.envelope().disposal_delay(h.engine.envelope().release_s);
        h.scheduler.advance(disposal - ONE_MS);
        assert_eq!(h.engine.voice_state(handle), VoiceState::Releasing);

        h.scheduler.advance(ONE_MS);
        assert_eq!(h.engine.voice_state(handle), VoiceState::Disposed);
        assert_eq!(h.backend.live_node_count(), 0);
        assert_eq!(h.engine.session().active_count(), 0);
        assert!(h.backend.is_muted());
    }

    #[test]
    fn test_voice_sounds_until_stopped() {
        let h = harness();
        let handle = block_on(h.engine.start_voice(&steady()));

        h.scheduler.advance(Duration::from_secs(60));
        assert_eq!(h.engine.voice_state(handle), VoiceState::Sounding);
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn test_repeated_stop_disposes_once() {
        let h = harness();
        let handle = block_on(h.engine.start_voice(&steady()));

        h.engine.stop_voice(handle);
        h.engine.stop_voice(handle);
        assert_eq!(h.scheduler.pending(), 1);

        h.scheduler.run_all();
        h.engine.stop_voice(handle);
        assert_eq!(h.backend.dispose_count(), 5);
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn test_stop_while_starting_releases_on_creation() {
        let h = harness();
        h.backend.set_start_mode(StartMode::Deferred);
        let mut pool = LocalPool::new();

        let started = Rc::new(Cell::new(None));
        let engine = h.engine.clone();
        let slot = Rc::clone(&started);
        pool.spawner()
            .spawn_local(async move {
                slot.set(Some(engine.start_voice(&ShapeParameters::default()).await));
            })
            .unwrap();
        pool.run_until_stalled();

        assert_eq!(h.engine.active_voices(), 1);
        h.engine.stop_all();

        h.backend.resolve_start(Ok(()));
        pool.run_until_stalled();

        let handle = started.get().unwrap();
        assert_eq!(h.engine.voice_state(handle), VoiceState::Releasing);

        h.scheduler.run_all();
        assert_eq!(h.engine.voice_state(handle), VoiceState::Disposed);
        assert!(h.backend.is_muted());
    }

    #[test]
    fn test_one_shot_attack_hold_fade() {
        let h = harness();
        let envelope = h.engine.envelope().clone();
        let handle = block_on(h.engine.play_one_shot(&ShapeParameters::default()));
        assert_eq!(h.engine.voice_state(handle), VoiceState::Sounding);

        h.scheduler
            .advance(envelope.one_shot_release_delay() - ONE_MS);
        assert_eq!(h.engine.voice_state(handle), VoiceState::Sounding);

        h.scheduler.advance(ONE_MS);
        assert_eq!(h.engine.voice_state(handle), VoiceState::Releasing);

        h.scheduler
            .advance(envelope.disposal_delay(envelope.one_shot_fade_s));
        assert_eq!(h.engine.voice_state(handle), VoiceState::Disposed);
        assert_eq!(h.engine.session().active_count(), 0);
    }

    #[test]
    fn test_early_stop_cancels_one_shot_hold() {
        let h = harness();
        let handle = block_on(h.engine.play_one_shot(&steady()));
        assert_eq!(h.scheduler.pending(), 1);

        h.engine.stop_voice(handle);
        // Hold timer gone, only the disposal remains
        assert_eq!(h.scheduler.pending(), 1);

        h.scheduler.run_all();
        assert_eq!(h.engine.voice_state(handle), VoiceState::Disposed);
        assert_eq!(h.backend.dispose_count(), 5);
    }

    #[test]
    fn test_session_outlives_out_of_order_disposals() {
        let h = harness();
        let long = block_on(h.engine.play_one_shot(&ShapeParameters::default()));
        let short = block_on(h.engine.start_voice(&ShapeParameters {
            note: Note::E,
            ..Default::default()
        }));

        // The later voice is disposed first
        h.engine.stop_voice(short);
        h.scheduler.advance(Duration::from_millis(500));
        assert_eq!(h.engine.voice_state(short), VoiceState::Disposed);
        assert_ne!(h.engine.voice_state(long), VoiceState::Disposed);
        assert!(!h.backend.is_muted());
        assert_eq!(h.engine.session().active_count(), 1);

        h.scheduler.run_all();
        assert_eq!(h.engine.voice_state(long), VoiceState::Disposed);
        assert!(h.backend.is_muted());
    }

    #[test]
    fn test_stop_all_requests_every_voice() {
        let h = harness();
        let a = block_on(h.engine.start_voice(&ShapeParameters::default()));
        let b = block_on(h.engine.play_one_shot(&ShapeParameters {
            note: Note::G,
            octave: 5,
            ..Default::default()
        }));
        h.engine.stop_voice(a);

        h.engine.stop_all();
        assert_eq!(h.engine.voice_state(a), VoiceState::Releasing);
        assert_eq!(h.engine.voice_state(b), VoiceState::Releasing);

        h.scheduler.run_all();
        assert_eq!(h.engine.active_voices(), 0);
        assert_eq!(h.backend.live_node_count(), 0);
        assert!(h.backend.is_muted());
    }

    #[test]
    fn test_failed_start_gives_silent_voice() {
        let h = harness();
        h.backend.set_start_mode(StartMode::Fail);
        let handle = block_on(h.engine.start_voice(&ShapeParameters::default()));

        assert_eq!(h.engine.voice_state(handle), VoiceState::Sounding);
        let nodes = h.engine.voice_nodes(handle).unwrap();
        assert_eq!(h.backend.gain_target(nodes.gain), Some(0.0));

        h.engine.stop_voice(handle);
        h.scheduler.run_all();
        assert_eq!(h.engine.session().active_count(), 0);
        assert!(h.backend.is_muted());
    }

    #[test]
    fn test_live_synth_restored_after_preview() {
        let h = harness();
        let live = Rc::new(LiveSynth::new(
            Rc::clone(&h.backend),
            &ShapeParameters::default(),
            0.0,
        ));
        let live_gain = live.gain();
        h.engine.attach_live_synth(Some(Rc::clone(&live)));

        let handle = block_on(h.engine.start_voice(&ShapeParameters::default()));
        assert!(live.is_silenced());
        assert_eq!(live.gain(), 0.0);

        h.engine.stop_voice(handle);
        h.scheduler.run_all();
        assert!(!live.is_silenced());
        assert_eq!(live.gain(), live_gain);
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let h = harness();
        let handle = block_on(h.engine.start_voice(&ShapeParameters::default()));
        h.engine.stop_voice(handle);
        h.scheduler.run_all();

        h.engine.stop_voice(handle);
        h.engine.stop_all();
        assert_eq!(h.scheduler.pending(), 0);
        assert_eq!(h.engine.voice_state(handle), VoiceState::Disposed);
    }

    #[test]
    fn test_dropped_start_leaves_nothing_behind() {
        let h = harness();
        h.backend.set_start_mode(StartMode::Deferred);
        let params = ShapeParameters::default();

        let mut start = h.engine.start_voice(&params).boxed_local();
        assert!((&mut start).now_or_never().is_none());
        assert_eq!(h.engine.active_voices(), 1);
        assert_eq!(h.engine.session().active_count(), 1);

        drop(start);
        assert_eq!(h.engine.active_voices(), 0);
        assert_eq!(h.engine.session().active_count(), 0);

        h.backend.resolve_start(Ok(()));
        h.engine.stop_all();
        h.scheduler.run_all();
        assert_eq!(h.engine.active_voices(), 0);
        assert_eq!(h.backend.live_node_count(), 0);
        assert!(h.backend.is_muted());
    }

    #[test]
    fn test_start_applies_mapped_controls() {
        let h = harness();
        let params = ShapeParameters {
            note: Note::A,
            octave: 4,
            roundness: 80.0,
            grain: 100.0,
            wobble: 0.0,
            ..Default::default()
        };
        let handle = block_on(h.engine.start_voice(&params));
        let nodes = h.engine.voice_nodes(handle).unwrap();

        let frequency = h.backend.oscillator_frequency(nodes.osc_a).unwrap();
        assert!((frequency - 440.0).abs() < 1e-3);
        assert_eq!(h.backend.oscillator_frequency(nodes.osc_b), Some(frequency));
        assert_eq!(h.backend.noise_volume(nodes.noise), Some(MAX_NOISE_DB));
        let ratio = h.backend.cross_fade_ratio(nodes.cross_fade).unwrap();
        assert!((ratio - 0.8).abs() < 1e-6);
        assert_eq!(h.backend.oscillator_detune(nodes.osc_a), Some(0.0));
    }

    #[test]
    fn test_detune_follows_wobble_phase() {
        let h = harness();
        let params = ShapeParameters {
            wobble: 100.0,
            ..Default::default()
        };
        h.backend.set_now(0.25);
        let handle = block_on(h.engine.start_voice(&params));
        let nodes = h.engine.voice_nodes(handle).unwrap();

        let detune = h.backend.oscillator_detune(nodes.osc_a).unwrap();
        assert!((detune - 50.0).abs() < 1e-3);

        h.backend.set_now(0.75);
        h.scheduler.advance(h.engine.envelope().modulation_interval());
        let detune = h.backend.oscillator_detune(nodes.osc_a).unwrap();
        assert!((detune + 50.0).abs() < 1e-3);
        assert_eq!(h.backend.oscillator_detune(nodes.osc_b), Some(detune));

        // Updates stop once the voice is gone
        h.engine.stop_voice(handle);
        h.scheduler.run_all();
        assert_eq!(h.scheduler.pending(), 0);
    }
}
