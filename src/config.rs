//! Renderer configuration
//!
//! Plain values with builder-style setters. There is no file-based
//! configuration; applications construct a [`RendererConfig`] in code.

/// Settings applied when a [`Renderer`](crate::gfx::rendering::Renderer) is created
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Drawable surface width before the first `set_size`
    pub default_width: u32,
    /// Drawable surface height before the first `set_size`
    pub default_height: u32,
    /// Device pixels per logical pixel
    pub pixel_ratio: f32,
    /// Background clear color [R, G, B, A] (0.0-1.0 range)
    pub clear_color: [f32; 4],
    /// Log a warning when rendering with an out-of-date projection matrix
    pub warn_on_stale_projection: bool,
}

impl RendererConfig {
    pub fn new() -> Self {
        Self {
            default_width: 300,
            default_height: 150,
            pixel_ratio: 1.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            warn_on_stale_projection: true,
        }
    }

    /// Set the initial surface size
    pub fn with_default_size(mut self, width: u32, height: u32) -> Self {
        self.default_width = width.max(1);
        self.default_height = height.max(1);
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        if ratio.is_finite() && ratio > 0.0 {
            self.pixel_ratio = ratio;
        } else {
            log::warn!("Ignoring invalid pixel ratio {}", ratio);
        }
        self
    }

    /// Set background clear color [R, G, B, A] (0.0-1.0 range)
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_stale_projection_warning(mut self, enabled: bool) -> Self {
        self.warn_on_stale_projection = enabled;
        self
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}
