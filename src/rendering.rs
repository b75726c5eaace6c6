//! Raster canvas for shape frames.

use std::path::Path;

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::params::CanvasConfig;

/// Errors raised while writing a rendered frame
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to save {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Drawing surface for polygon frames
pub trait ShapeCanvas {
    /// Fill a closed polygon
    ///
    /// # Arguments
    /// * `flat_points` - Interleaved `[x0, y0, x1, y1, ...]` in shape-local space
    /// * `fill` - RGB fill color
    /// * `position` - Canvas coordinates of the shape origin
    fn draw_polygon(&mut self, flat_points: &[f32], fill: [u8; 3], position: (f32, f32));
}

/// In-memory RGBA canvas that can be saved as PNG
pub struct PngCanvas {
    image: RgbaImage,
}

impl PngCanvas {
    pub fn new(config: &CanvasConfig) -> Self {
        let image = RgbaImage::from_pixel(config.width, config.height, Rgba(config.background));
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Write the canvas as a PNG (format inferred from the extension)
    pub fn save(&self, path: &Path) -> Result<(), RenderError> {
        self.image.save(path).map_err(|source| RenderError::Save {
            path: path.display().to_string(),
            source,
        })
    }
}

impl ShapeCanvas for PngCanvas {
    fn draw_polygon(&mut self, flat_points: &[f32], fill: [u8; 3], position: (f32, f32)) {
        let vertices: Vec<(f32, f32)> = flat_points
            .chunks_exact(2)
            .map(|xy| (xy[0] + position.0, xy[1] + position.1))
            .collect();
        if vertices.len() < 3 {
            return;
        }

        let color = Rgba([fill[0], fill[1], fill[2], 255]);
        let (width, height) = self.image.dimensions();
        let mut crossings = Vec::with_capacity(vertices.len());

        // Even-odd scanline fill sampled at pixel centers
        for py in 0..height {
            let y = py as f32 + 0.5;
            crossings.clear();

            for (i, &(x0, y0)) in vertices.iter().enumerate() {
                let (x1, y1) = vertices[(i + 1) % vertices.len()];
                // Half-open test so shared vertices count once
                if (y0 <= y) != (y1 <= y) {
                    crossings.push(x0 + (y - y0) / (y1 - y0) * (x1 - x0));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil().max(0.0) as u32;
                let end = (span[1] - 0.5).floor().min(width as f32 - 1.0);
                if end < 0.0 {
                    continue;
                }
                for px in start..=end as u32 {
                    self.image.put_pixel(px, py, color);
                }
            }
        }
    }
}
