//! Shapesynth library - Polygon shapes that sound like they look

pub mod audio;
pub mod cli;
pub mod noise;
pub mod params;
pub mod rendering;
pub mod shape;
