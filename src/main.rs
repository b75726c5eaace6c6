//! Shapesynth - Polygon shapes that sound like they look
//!
//! Render a shape frame, dump its points, or audition it as a note.

use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shapesynth::audio::{
    GlicolBackend, HeldNotes, LiveSynth, SynthBackend, TokioScheduler, VoiceEngine,
};
use shapesynth::cli::{Args, Command, PlayArgs, PointsArgs, RenderArgs};
use shapesynth::params::{EnvelopeConfig, GeometryConfig, ShapeParameters};
use shapesynth::rendering::{PngCanvas, ShapeCanvas};
use shapesynth::shape::{flatten_points, ShapeGeometry, WobbleClock};

/// Live synth control update interval (~60 Hz, one UI frame)
const LIVE_TICK: Duration = Duration::from_millis(16);

/// Trigger name used for the held note
const CLI_TRIGGER: &str = "cli";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match args.command {
        Command::Render(render) => run_render(&render),
        Command::Points(points) => run_points(&points),
        Command::Play(play) => {
            let local = tokio::task::LocalSet::new();
            local.run_until(run_play(play)).await
        }
    }
}

fn run_render(args: &RenderArgs) -> anyhow::Result<()> {
    let params = args.to_params();
    let geometry = ShapeGeometry::new(GeometryConfig::default());
    let points = geometry.frame(&params, args.time)?;

    let mut canvas = PngCanvas::new(&args.canvas_config());
    canvas.draw_polygon(
        flatten_points(&points),
        params.note.color(),
        (params.x, params.y),
    );
    canvas.save(&args.out)?;

    println!(
        "Rendered {} {}{} ({} points) to {}",
        params.preset,
        params.note,
        params.clamped_octave(),
        points.len(),
        args.out.display()
    );
    Ok(())
}

fn run_points(args: &PointsArgs) -> anyhow::Result<()> {
    let params = args.shape.to_params();
    let geometry = ShapeGeometry::new(args.geometry_config());
    let points = geometry.frame(&params, args.time)?;

    for point in &points {
        println!("{:.3} {:.3}", point.x, point.y);
    }
    Ok(())
}

async fn run_play(args: PlayArgs) -> anyhow::Result<()> {
    let params = args.shape.to_params();
    let backend = Rc::new(GlicolBackend::new().context("Audio init failed")?);
    let scheduler = Rc::new(TokioScheduler::new());
    let envelope = EnvelopeConfig::default();
    let engine = VoiceEngine::new(Rc::clone(&backend), scheduler, envelope.clone());

    // Output is already unmuted, so previews mix over the live synth
    let live = if args.live {
        backend
            .start_audio()
            .await
            .context("Failed to start audio output")?;
        backend.set_muted(false);

        let live = Rc::new(LiveSynth::new(Rc::clone(&backend), &params, 0.0));
        engine.attach_live_synth(Some(Rc::clone(&live)));
        spawn_live_ticker(Rc::clone(&live), params.clone(), args.live_duration);
        Some(live)
    } else {
        None
    };

    println!(
        "\nPlaying {}{} ({}, {:.1} Hz) on {} @ {}Hz",
        params.note,
        params.clamped_octave(),
        params.preset,
        params.note.frequency(params.clamped_octave()),
        backend.device_name(),
        backend.sample_rate_hz()
    );

    match args.hold {
        Some(hold_s) => {
            let hold = Duration::try_from_secs_f32(hold_s).context("Invalid --hold")?;
            let keyboard = HeldNotes::new(engine.clone());
            keyboard.press(CLI_TRIGGER, &params).await;
            tokio::time::sleep(hold).await;
            keyboard.release(CLI_TRIGGER);
            tokio::time::sleep(envelope.disposal_delay(envelope.release_s)).await;
        }
        None => {
            engine.play_one_shot(&params).await;
            tokio::time::sleep(envelope.one_shot_total()).await;
        }
    }

    if let Some(live) = live {
        let live_duration =
            Duration::try_from_secs_f32(args.live_duration).context("Invalid --live-duration")?;
        let remaining = live_duration.saturating_sub(Duration::from_secs_f64(backend.now()));
        tokio::time::sleep(remaining).await;
        engine.attach_live_synth(None);
        live.dispose();
    }

    println!("Done ({} voices left)", engine.active_voices());
    Ok(())
}

/// Drive the live synth's wobble detune from a wobble clock
fn spawn_live_ticker(
    live: Rc<LiveSynth<GlicolBackend>>,
    params: ShapeParameters,
    duration_s: f32,
) {
    tokio::task::spawn_local(async move {
        let mut clock = WobbleClock::new();
        let mut interval = tokio::time::interval(LIVE_TICK);
        let ticks = (duration_s.max(0.0) / LIVE_TICK.as_secs_f32()) as u32;

        for _ in 0..ticks {
            interval.tick().await;
            let phase = clock.advance(LIVE_TICK.as_secs_f32(), params.wobble_speed);
            live.apply(&params, phase as f64);
        }
    });
}
