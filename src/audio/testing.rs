//! In-memory synthesis backend that records what the engine asks for.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};

use super::backend::{GainRamp, NodeId, OscillatorKind, Port, SynthBackend};
use super::error::AudioError;

/// How `start_audio` behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Resolves successfully right away
    Immediate,
    /// Stays pending until `resolve_start`
    Deferred,
    /// Resolves with an error right away
    Fail,
}

#[derive(Debug, Clone)]
enum TestNode {
    Oscillator {
        kind: OscillatorKind,
        frequency_hz: f32,
        detune_cents: f32,
    },
    Noise {
        volume_db: f32,
    },
    CrossFade {
        ratio: f32,
    },
    Gain {
        ramp: GainRamp,
    },
}

pub struct RecordingBackend {
    now: Cell<f64>,
    muted: Cell<bool>,
    next_id: Cell<u64>,
    nodes: RefCell<BTreeMap<NodeId, TestNode>>,
    connections: RefCell<Vec<(NodeId, Port)>>,
    start_mode: Cell<StartMode>,
    start_calls: Cell<usize>,
    pending_starts: RefCell<Vec<oneshot::Sender<Result<(), AudioError>>>>,
    gains_created: Cell<usize>,
    disposed: Cell<usize>,
}

impl RecordingBackend {
    /// Muted output with immediate starts, like a fresh page load
    pub fn new() -> Self {
        Self {
            now: Cell::new(0.0),
            muted: Cell::new(true),
            next_id: Cell::new(1),
            nodes: RefCell::new(BTreeMap::new()),
            connections: RefCell::new(Vec::new()),
            start_mode: Cell::new(StartMode::Immediate),
            start_calls: Cell::new(0),
            pending_starts: RefCell::new(Vec::new()),
            gains_created: Cell::new(0),
            disposed: Cell::new(0),
        }
    }

    pub fn set_now(&self, now_s: f64) {
        self.now.set(now_s);
    }

    pub fn set_start_mode(&self, mode: StartMode) {
        self.start_mode.set(mode);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.get()
    }

    /// Complete every pending deferred start
    pub fn resolve_start(&self, result: Result<(), AudioError>) {
        for sender in self.pending_starts.borrow_mut().drain(..) {
            let _ = sender.send(result.clone());
        }
    }

    pub fn live_node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn gains_created(&self) -> usize {
        self.gains_created.get()
    }

    pub fn dispose_count(&self) -> usize {
        self.disposed.get()
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.borrow().contains_key(&id)
    }

    pub fn is_connected(&self, from: NodeId, to: Port) -> bool {
        self.connections.borrow().contains(&(from, to))
    }

    pub fn oscillator_kind(&self, id: NodeId) -> Option<OscillatorKind> {
        match self.nodes.borrow().get(&id) {
            Some(TestNode::Oscillator { kind, .. }) => Some(*kind),
            _ => None,
        }
    }

    pub fn oscillator_frequency(&self, id: NodeId) -> Option<f32> {
        match self.nodes.borrow().get(&id) {
            Some(TestNode::Oscillator { frequency_hz, .. }) => Some(*frequency_hz),
            _ => None,
        }
    }

    pub fn oscillator_detune(&self, id: NodeId) -> Option<f32> {
        match self.nodes.borrow().get(&id) {
            Some(TestNode::Oscillator { detune_cents, .. }) => Some(*detune_cents),
            _ => None,
        }
    }

    pub fn noise_volume(&self, id: NodeId) -> Option<f32> {
        match self.nodes.borrow().get(&id) {
            Some(TestNode::Noise { volume_db }) => Some(*volume_db),
            _ => None,
        }
    }

    pub fn cross_fade_ratio(&self, id: NodeId) -> Option<f32> {
        match self.nodes.borrow().get(&id) {
            Some(TestNode::CrossFade { ratio }) => Some(*ratio),
            _ => None,
        }
    }

    /// Value the gain node is heading to (end of its current ramp)
    pub fn gain_target(&self, id: NodeId) -> Option<f32> {
        match self.nodes.borrow().get(&id) {
            Some(TestNode::Gain { ramp }) => Some(ramp.to),
            _ => None,
        }
    }

    fn insert(&self, node: TestNode) -> NodeId {
        let id = NodeId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.nodes.borrow_mut().insert(id, node);
        id
    }
}

impl SynthBackend for RecordingBackend {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn is_muted(&self) -> bool {
        self.muted.get()
    }

    fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }

    fn start_audio(&self) -> LocalBoxFuture<'static, Result<(), AudioError>> {
        self.start_calls.set(self.start_calls.get() + 1);
        match self.start_mode.get() {
            StartMode::Immediate => future::ready(Ok(())).boxed_local(),
            StartMode::Fail => {
                future::ready(Err(AudioError::Start("blocked".to_string()))).boxed_local()
            }
            StartMode::Deferred => {
                let (sender, receiver) = oneshot::channel();
                self.pending_starts.borrow_mut().push(sender);
                receiver
                    .map(|result| result.unwrap_or(Err(AudioError::StartCancelled)))
                    .boxed_local()
            }
        }
    }

    fn create_oscillator(&self, kind: OscillatorKind, frequency_hz: f32, detune_cents: f32) -> NodeId {
        self.insert(TestNode::Oscillator {
            kind,
            frequency_hz,
            detune_cents,
        })
    }

    fn set_oscillator(&self, id: NodeId, kind: OscillatorKind, frequency_hz: f32, detune_cents: f32) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&id) {
            if matches!(node, TestNode::Oscillator { .. }) {
                *node = TestNode::Oscillator {
                    kind,
                    frequency_hz,
                    detune_cents,
                };
            }
        }
    }

    fn create_noise(&self, volume_db: f32) -> NodeId {
        self.insert(TestNode::Noise { volume_db })
    }

    fn set_noise_volume(&self, id: NodeId, volume_db: f32) {
        if let Some(TestNode::Noise { volume_db: current }) = self.nodes.borrow_mut().get_mut(&id) {
            *current = volume_db;
        }
    }

    fn create_cross_fade(&self, ratio: f32) -> NodeId {
        self.insert(TestNode::CrossFade { ratio })
    }

    fn set_cross_fade(&self, id: NodeId, ratio: f32) {
        if let Some(TestNode::CrossFade { ratio: current }) = self.nodes.borrow_mut().get_mut(&id) {
            *current = ratio;
        }
    }

    fn create_gain(&self, value: f32) -> NodeId {
        self.gains_created.set(self.gains_created.get() + 1);
        self.insert(TestNode::Gain {
            ramp: GainRamp::hold(value),
        })
    }

    fn gain(&self, id: NodeId) -> f32 {
        match self.nodes.borrow().get(&id) {
            Some(TestNode::Gain { ramp }) => ramp.value_at(self.now.get()),
            _ => 0.0,
        }
    }

    fn set_gain(&self, id: NodeId, value: f32) {
        if let Some(TestNode::Gain { ramp }) = self.nodes.borrow_mut().get_mut(&id) {
            *ramp = GainRamp::hold(value);
        }
    }

    fn ramp_gain(&self, id: NodeId, target: f32, duration_s: f64) {
        let now = self.now.get();
        if let Some(TestNode::Gain { ramp }) = self.nodes.borrow_mut().get_mut(&id) {
            *ramp = ramp.retarget(now, target, duration_s);
        }
    }

    fn connect(&self, from: NodeId, to: Port) {
        self.connections.borrow_mut().push((from, to));
    }

    fn dispose(&self, id: NodeId) {
        if self.nodes.borrow_mut().remove(&id).is_some() {
            self.disposed.set(self.disposed.get() + 1);
            self.connections.borrow_mut().retain(|(from, _)| *from != id);
        }
    }
}
