//! Real-time synthesis backend: the node graph rendered as Glicol code.
//!
//! The control thread edits a `GlicolGraph` behind a mutex. The cpal callback
//! recomposes the Glicol code only when the graph revision changes or a gain
//! ramp crosses a control step, and hot-swaps it into the engine when the
//! code differs.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use futures::future::{self, FutureExt, LocalBoxFuture};
use glicol::Engine;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

use super::backend::{GainRamp, NodeId, OscillatorKind, Port, SynthBackend};
use super::error::AudioError;
use super::mapping::db_to_gain;

/// Audio block size (samples per buffer)
/// 128 = 2.9ms @ 44.1kHz
const BLOCK_SIZE: usize = 128;

/// Seed for every white noise node
const NOISE_SEED: u32 = 42;

/// Control rate for gain ramps (seconds per step)
const RAMP_STEP_S: f64 = 0.01;

#[derive(Debug, Clone)]
enum GraphNode {
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
        a: Option<NodeId>,
        b: Option<NodeId>,
    },
    Gain {
        ramp: GainRamp,
        inputs: Vec<NodeId>,
    },
}

/// Node graph shared between the control thread and the audio callback
#[derive(Debug, Default)]
struct GlicolGraph {
    nodes: BTreeMap<NodeId, GraphNode>,
    outputs: Vec<NodeId>,
    /// Bumped on every edit
    revision: u64,
}

impl GlicolGraph {
    fn insert(&mut self, id: NodeId, node: GraphNode) {
        self.revision += 1;
        self.nodes.insert(id, node);
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.revision += 1;
        self.nodes.get_mut(&id)
    }

    fn connect(&mut self, from: NodeId, to: Port) {
        self.revision += 1;
        match to {
            Port::Output => {
                if !self.outputs.contains(&from) {
                    self.outputs.push(from);
                }
            }
            Port::Input(target) | Port::CrossFadeA(target) | Port::CrossFadeB(target) => {
                match (self.nodes.get_mut(&target), to) {
                    (Some(GraphNode::Gain { inputs, .. }), _) => {
                        if !inputs.contains(&from) {
                            inputs.push(from);
                        }
                    }
                    (Some(GraphNode::CrossFade { b, .. }), Port::CrossFadeB(_)) => *b = Some(from),
                    (Some(GraphNode::CrossFade { a, .. }), _) => *a = Some(from),
                    _ => {}
                }
            }
        }
    }

    fn remove(&mut self, id: NodeId) {
        if self.nodes.remove(&id).is_none() {
            return;
        }
        self.revision += 1;
        self.outputs.retain(|&out| out != id);
        for node in self.nodes.values_mut() {
            match node {
                GraphNode::Gain { inputs, .. } => inputs.retain(|&input| input != id),
                GraphNode::CrossFade { a, b, .. } => {
                    if *a == Some(id) {
                        *a = None;
                    }
                    if *b == Some(id) {
                        *b = None;
                    }
                }
                _ => {}
            }
        }
    }

    fn gain_ramp(&mut self, id: NodeId) -> Option<&mut GainRamp> {
        match self.node_mut(id) {
            Some(GraphNode::Gain { ramp, .. }) => Some(ramp),
            _ => None,
        }
    }

    /// Control step of `t` while any gain is mid-ramp
    fn ramp_step(&self, t: f64) -> Option<u64> {
        let ramping = self
            .nodes
            .values()
            .any(|node| matches!(node, GraphNode::Gain { ramp, .. } if t < ramp.end_s));
        ramping.then(|| (t.max(0.0) / RAMP_STEP_S).floor() as u64)
    }

    /// Render the graph as a Glicol composition at audio time `t`
    fn compose(&self, t: f64) -> String {
        let mut lines = Vec::with_capacity(self.nodes.len() + 1);

        for (id, node) in &self.nodes {
            match node {
                GraphNode::Oscillator {
                    kind,
                    frequency_hz,
                    detune_cents,
                } => {
                    let frequency = frequency_hz * 2f32.powf(detune_cents / 1200.0);
                    lines.push(format!("~{}: {} {:.3}", id, glicol_oscillator(*kind), frequency));
                }
                GraphNode::Noise { volume_db } => {
                    lines.push(format!(
                        "~{}: noise {} >> mul {:.5}",
                        id,
                        NOISE_SEED,
                        db_to_gain(*volume_db)
                    ));
                }
                GraphNode::CrossFade { ratio, a, b } => {
                    // Equal-power fade keeps loudness steady mid-way
                    let angle = ratio.clamp(0.0, 1.0) * FRAC_PI_2;
                    let mut refs = Vec::new();
                    for (suffix, input, level) in [("a", a, angle.cos()), ("b", b, angle.sin())] {
                        if let Some(input) = input {
                            lines.push(format!("~{}{}: ~{} >> mul {:.4}", id, suffix, input, level));
                            refs.push(format!("~{}{}", id, suffix));
                        }
                    }
                    lines.push(format!("~{}: {}", id, mix_or_silence(&refs)));
                }
                GraphNode::Gain { ramp, inputs } => {
                    let refs: Vec<String> = inputs.iter().map(|input| format!("~{}", input)).collect();
                    lines.push(format!(
                        "~{}: {} >> mul {:.4}",
                        id,
                        mix_or_silence(&refs),
                        ramp.value_at(t)
                    ));
                }
            }
        }

        let outputs: Vec<String> = self.outputs.iter().map(|out| format!("~{}", out)).collect();
        lines.push(format!("o: {}", mix_or_silence(&outputs)));
        lines.join("\n")
    }
}

fn glicol_oscillator(kind: OscillatorKind) -> &'static str {
    match kind {
        OscillatorKind::Sine => "sin",
        OscillatorKind::Square => "squ",
        OscillatorKind::Sawtooth => "saw",
    }
}

fn mix_or_silence(refs: &[String]) -> String {
    if refs.is_empty() {
        "sin 0 >> mul 0".to_string()
    } else {
        format!("mix {}", refs.join(" "))
    }
}

/// Synthesis backend playing through the default output device
pub struct GlicolBackend {
    graph: Arc<Mutex<GlicolGraph>>,
    muted: Arc<AtomicBool>,
    clock: Instant,
    next_id: Cell<u64>,
    sample_rate_hz: u32,
    device_name: String,

    /// Audio output stream (kept alive)
    stream: cpal::Stream,
}

impl GlicolBackend {
    /// Open the default output device; output starts muted and paused
    pub fn new() -> Result<Self, AudioError> {
        let graph = Arc::new(Mutex::new(GlicolGraph::default()));
        let muted = Arc::new(AtomicBool::new(true));
        let clock = Instant::now();

        // Setup audio output device
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let sample_rate_hz = config.sample_rate().0;
        let channels = config.channels() as usize;
        info!("Audio: {} @ {}Hz", device_name, sample_rate_hz);

        let mut engine = Engine::<BLOCK_SIZE>::new();
        engine.set_sr(sample_rate_hz as usize);
        let initial = GlicolGraph::default().compose(0.0);
        engine.update_with_code(&initial);
        engine
            .update()
            .map_err(|e| AudioError::Engine(format!("{:?}", e)))?;

        let graph_audio = Arc::clone(&graph);
        let muted_audio = Arc::clone(&muted);
        let mut current_code = initial;
        let mut composed_for: Option<(u64, Option<u64>)> = None;

        // Build audio output stream
        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames_needed = data.len() / channels;
                    let block_start_s = clock.elapsed().as_secs_f64();
                    let muted = muted_audio.load(Ordering::Relaxed);
                    let mut frame_idx = 0;

                    // Generate multiple blocks if needed to fill the entire buffer
                    while frame_idx < frames_needed {
                        let t = block_start_s + frame_idx as f64 / sample_rate_hz as f64;
                        if let Ok(graph) = graph_audio.lock() {
                            let key = (graph.revision, graph.ramp_step(t));
                            if composed_for != Some(key) {
                                let control_t = key.1.map_or(t, |step| step as f64 * RAMP_STEP_S);
                                let code = graph.compose(control_t);
                                if code != current_code {
                                    engine.update_with_code(&code);
                                    if let Err(e) = engine.update() {
                                        warn!("Glicol rejected composition: {:?}", e);
                                    }
                                    current_code = code;
                                }
                                composed_for = Some(key);
                            }
                        }

                        let (buffers, _) = engine.next_block(vec![]);
                        let samples_to_copy = (frames_needed - frame_idx).min(BLOCK_SIZE);

                        for i in 0..samples_to_copy {
                            // Safety limiter: hard clip to ±0.5 to prevent ear damage
                            let left = if muted { 0.0 } else { buffers[0][i].clamp(-0.5, 0.5) };
                            let right = if muted { 0.0 } else { buffers[1][i].clamp(-0.5, 0.5) };

                            let out_idx = (frame_idx + i) * channels;
                            for channel in 0..channels {
                                data[out_idx + channel] = if channel % 2 == 0 { left } else { right };
                            }
                        }

                        frame_idx += samples_to_copy;
                    }
                },
                |err| warn!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        Ok(Self {
            graph,
            muted,
            clock,
            next_id: Cell::new(1),
            sample_rate_hz,
            device_name,
            stream,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn with_graph<R>(&self, f: impl FnOnce(&mut GlicolGraph) -> R) -> Option<R> {
        self.graph.lock().ok().map(|mut graph| f(&mut graph))
    }

    fn add(&self, node: GraphNode) -> NodeId {
        let id = NodeId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.with_graph(|graph| graph.insert(id, node));
        id
    }
}

impl SynthBackend for GlicolBackend {
    fn now(&self) -> f64 {
        self.clock.elapsed().as_secs_f64()
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    fn start_audio(&self) -> LocalBoxFuture<'static, Result<(), AudioError>> {
        let result = self
            .stream
            .play()
            .map_err(|e| AudioError::Start(e.to_string()));
        future::ready(result).boxed_local()
    }

    fn create_oscillator(&self, kind: OscillatorKind, frequency_hz: f32, detune_cents: f32) -> NodeId {
        self.add(GraphNode::Oscillator {
            kind,
            frequency_hz,
            detune_cents,
        })
    }

    fn set_oscillator(&self, id: NodeId, kind: OscillatorKind, frequency_hz: f32, detune_cents: f32) {
        self.with_graph(|graph| {
            if let Some(GraphNode::Oscillator {
                kind: current_kind,
                frequency_hz: current_frequency,
                detune_cents: current_detune,
            }) = graph.node_mut(id)
            {
                *current_kind = kind;
                *current_frequency = frequency_hz;
                *current_detune = detune_cents;
            }
        });
    }

    fn create_noise(&self, volume_db: f32) -> NodeId {
        self.add(GraphNode::Noise { volume_db })
    }

    fn set_noise_volume(&self, id: NodeId, volume_db: f32) {
        self.with_graph(|graph| {
            if let Some(GraphNode::Noise { volume_db: current }) = graph.node_mut(id) {
                *current = volume_db;
            }
        });
    }

    fn create_cross_fade(&self, ratio: f32) -> NodeId {
        self.add(GraphNode::CrossFade {
            ratio,
            a: None,
            b: None,
        })
    }

    fn set_cross_fade(&self, id: NodeId, ratio: f32) {
        self.with_graph(|graph| {
            if let Some(GraphNode::CrossFade { ratio: current, .. }) = graph.node_mut(id) {
                *current = ratio;
            }
        });
    }

    fn create_gain(&self, value: f32) -> NodeId {
        self.add(GraphNode::Gain {
            ramp: GainRamp::hold(value),
            inputs: Vec::new(),
        })
    }

    fn gain(&self, id: NodeId) -> f32 {
        let now = self.now();
        self.with_graph(|graph| match graph.nodes.get(&id) {
            Some(GraphNode::Gain { ramp, .. }) => ramp.value_at(now),
            _ => 0.0,
        })
        .unwrap_or(0.0)
    }

    fn set_gain(&self, id: NodeId, value: f32) {
        self.with_graph(|graph| {
            if let Some(ramp) = graph.gain_ramp(id) {
                *ramp = GainRamp::hold(value);
            }
        });
    }

    fn ramp_gain(&self, id: NodeId, target: f32, duration_s: f64) {
        let now = self.now();
        self.with_graph(|graph| {
            if let Some(ramp) = graph.gain_ramp(id) {
                *ramp = ramp.retarget(now, target, duration_s);
            }
        });
    }

    fn connect(&self, from: NodeId, to: Port) {
        self.with_graph(|graph| graph.connect(from, to));
    }

    fn dispose(&self, id: NodeId) {
        self.with_graph(|graph| graph.remove(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice_graph() -> GlicolGraph {
        let mut graph = GlicolGraph::default();
        let osc_a = NodeId(1);
        let osc_b = NodeId(2);
        let fade = NodeId(3);
        let noise = NodeId(4);
        let gain = NodeId(5);

        graph.insert(
            osc_a,
            GraphNode::Oscillator {
                kind: OscillatorKind::Sawtooth,
                frequency_hz: 220.0,
                detune_cents: 0.0,
            },
        );
        graph.insert(
            osc_b,
            GraphNode::Oscillator {
                kind: OscillatorKind::Sine,
                frequency_hz: 220.0,
                detune_cents: 1200.0,
            },
        );
        graph.insert(
            fade,
            GraphNode::CrossFade {
                ratio: 0.0,
                a: None,
                b: None,
            },
        );
        graph.insert(
            noise,
            GraphNode::Noise {
                volume_db: f32::NEG_INFINITY,
            },
        );
        graph.insert(
            gain,
            GraphNode::Gain {
                ramp: GainRamp::hold(0.0).retarget(0.0, 0.5, 1.0),
                inputs: Vec::new(),
            },
        );

        graph.connect(osc_a, Port::CrossFadeA(fade));
        graph.connect(osc_b, Port::CrossFadeB(fade));
        graph.connect(fade, Port::Input(gain));
        graph.connect(noise, Port::Input(gain));
        graph.connect(gain, Port::Output);
        graph
    }

    #[test]
    fn test_empty_graph_is_silent() {
        assert_eq!(GlicolGraph::default().compose(0.0), "o: sin 0 >> mul 0");
    }

    #[test]
    fn test_compose_voice_graph() {
        let code = voice_graph().compose(0.5);

        assert!(code.contains("~n1: saw 220.000"));
        // Detune of one octave doubles the frequency
        assert!(code.contains("~n2: sin 440.000"));
        assert!(code.contains("~n3a: ~n1 >> mul 1.0000"));
        assert!(code.contains("~n3b: ~n2 >> mul 0.0000"));
        assert!(code.contains("~n3: mix ~n3a ~n3b"));
        assert!(code.contains("~n4: noise 42 >> mul 0.00000"));
        assert!(code.contains("~n5: mix ~n3 ~n4 >> mul 0.2500"));
        assert!(code.ends_with("o: mix ~n5"));
    }

    #[test]
    fn test_dispose_drops_references() {
        let mut graph = voice_graph();
        graph.remove(NodeId(1));
        graph.remove(NodeId(4));

        let code = graph.compose(2.0);
        assert!(!code.contains("~n1"));
        assert!(!code.contains("~n4"));
        assert!(code.contains("~n3: mix ~n3b"));
        assert!(code.contains("~n5: mix ~n3 >> mul 0.5000"));

        graph.remove(NodeId(5));
        assert!(graph.compose(2.0).ends_with("o: sin 0 >> mul 0"));
    }

    #[test]
    fn test_ramp_steps_only_while_ramping() {
        let graph = voice_graph();

        // Ramp runs from 0 to 1 s
        assert_eq!(graph.ramp_step(0.004), Some(0));
        assert_eq!(graph.ramp_step(0.5), Some(50));
        assert_eq!(graph.ramp_step(1.0), None);
        assert_eq!(GlicolGraph::default().ramp_step(0.5), None);

        // Times inside one control step compose the same code
        let step = |t: f64| graph.ramp_step(t).map_or(t, |s| s as f64 * RAMP_STEP_S);
        assert_eq!(graph.compose(step(0.501)), graph.compose(step(0.509)));
    }

    #[test]
    fn test_edits_bump_revision() {
        let mut graph = voice_graph();
        let before = graph.revision;

        graph.compose(0.5);
        graph.ramp_step(0.5);
        assert_eq!(graph.revision, before);

        if let Some(ramp) = graph.gain_ramp(NodeId(5)) {
            *ramp = GainRamp::hold(1.0);
        }
        assert!(graph.revision > before);

        let after_edit = graph.revision;
        graph.remove(NodeId(42));
        assert_eq!(graph.revision, after_edit);
        graph.remove(NodeId(4));
        assert!(graph.revision > after_edit);
    }
}
