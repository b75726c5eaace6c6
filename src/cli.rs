//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::audio::Note;
use crate::params::{CanvasConfig, GeometryConfig, Preset, ShapeParameters};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "Shapesynth")]
#[command(about = "Polygon shapes that sound like they look", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one animation frame of the shape to a PNG
    Render(RenderArgs),

    /// Print the point sequence of one animation frame
    Points(PointsArgs),

    /// Audition the shape as a note through the default output device
    Play(PlayArgs),
}

/// Shape sliders shared by every subcommand
#[derive(ClapArgs, Debug, Clone)]
pub struct ShapeArgs {
    /// Base polygon: triangle, square (default), circle
    #[arg(long, value_name = "PRESET", default_value = "square")]
    pub preset: Preset,

    /// Morph toward a circle (0-100)
    #[arg(long, value_name = "PERCENT", default_value = "15")]
    pub roundness: f32,

    /// Radius and loudness (0-100)
    #[arg(long, value_name = "PERCENT", default_value = "50")]
    pub size: f32,

    /// Radial wobble amount (0-100)
    #[arg(long, value_name = "PERCENT", default_value = "20")]
    pub wobble: f32,

    /// Wobble speed (50 = real time)
    #[arg(long, value_name = "PERCENT", default_value = "50")]
    pub wobble_speed: f32,

    /// Sine (0) to noise (100) wobble blend
    #[arg(long, value_name = "PERCENT", default_value = "50")]
    pub randomness: f32,

    /// White noise mix (0-100)
    #[arg(long, value_name = "PERCENT", default_value = "0")]
    pub grain: f32,

    /// Note name (C, C#, D, ... B)
    #[arg(long, value_name = "NOTE", default_value = "C")]
    pub note: Note,

    /// Octave (1-8)
    #[arg(long, value_name = "OCTAVE", default_value = "4")]
    pub octave: u8,
}

impl ShapeArgs {
    /// Build a parameter snapshot from the flags
    pub fn to_params(&self) -> ShapeParameters {
        ShapeParameters {
            preset: self.preset,
            roundness: self.roundness,
            size: self.size,
            wobble: self.wobble,
            wobble_speed: self.wobble_speed,
            wobble_randomness: self.randomness,
            grain: self.grain,
            note: self.note,
            octave: self.octave,
            ..ShapeParameters::default()
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub shape: ShapeArgs,

    /// Wobble phase to render (seconds at speed 50)
    #[arg(long, value_name = "SECONDS", default_value = "0")]
    pub time: f32,

    /// Output image path
    #[arg(long, value_name = "PATH", default_value = "shape.png")]
    pub out: PathBuf,

    /// Image width (pixels)
    #[arg(long, value_name = "PIXELS", default_value = "512")]
    pub width: u32,

    /// Image height (pixels)
    #[arg(long, value_name = "PIXELS", default_value = "512")]
    pub height: u32,

    /// Shape center X on the canvas (pixels, default: canvas center)
    #[arg(long, value_name = "PIXELS")]
    pub x: Option<f32>,

    /// Shape center Y on the canvas (pixels, default: canvas center)
    #[arg(long, value_name = "PIXELS")]
    pub y: Option<f32>,
}

impl RenderArgs {
    /// Parameter snapshot positioned on the canvas
    pub fn to_params(&self) -> ShapeParameters {
        let (center_x, center_y) = self.canvas_config().center();
        ShapeParameters {
            x: self.x.unwrap_or(center_x),
            y: self.y.unwrap_or(center_y),
            ..self.shape.to_params()
        }
    }

    pub fn canvas_config(&self) -> CanvasConfig {
        CanvasConfig {
            width: self.width,
            height: self.height,
            ..CanvasConfig::default()
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct PointsArgs {
    #[command(flatten)]
    pub shape: ShapeArgs,

    /// Wobble phase to sample (seconds at speed 50)
    #[arg(long, value_name = "SECONDS", default_value = "0")]
    pub time: f32,

    /// Points per shape
    #[arg(long, value_name = "COUNT", default_value = "64")]
    pub num_points: usize,
}

impl PointsArgs {
    pub fn geometry_config(&self) -> GeometryConfig {
        GeometryConfig {
            num_points: self.num_points,
            ..GeometryConfig::default()
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct PlayArgs {
    #[command(flatten)]
    pub shape: ShapeArgs,

    /// Hold the note for this long instead of playing a one-shot
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub hold: Option<f32>,

    /// Run the continuous live synth under the preview
    #[arg(long)]
    pub live: bool,

    /// How long the live synth keeps playing (seconds)
    #[arg(long, value_name = "SECONDS", default_value = "3", value_parser = parse_seconds)]
    pub live_duration: f32,
}

/// Parse a finite, non-negative number of seconds
fn parse_seconds(s: &str) -> Result<f32, String> {
    let seconds: f32 = s
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", s, e))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("'{}' is not a finite, non-negative duration", s));
    }
    Ok(seconds)
}
