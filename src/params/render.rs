//! Canvas rendering configuration.

/// Raster canvas configuration
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Image width (pixels)
    pub width: u32,

    /// Image height (pixels)
    pub height: u32,

    /// Background color (RGBA)
    pub background: [u8; 4],
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            background: [18, 18, 24, 255],
        }
    }
}

impl CanvasConfig {
    /// Canvas center (where the shape sits by default)
    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }
}
