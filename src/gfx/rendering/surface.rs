//! Drawable surfaces and the host they are attached to

use super::engine::SurfaceId;
use crate::error::Result;

/// Render target owned by a renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawableSurface {
    pub(crate) id: SurfaceId,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) pixel_ratio: f32,
}

impl DrawableSurface {
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Logical width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Logical height
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Size of the backing pixel buffer
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        (
            scale(self.width, self.pixel_ratio),
            scale(self.height, self.pixel_ratio),
        )
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

pub(crate) fn scale(logical: u32, ratio: f32) -> u32 {
    ((logical as f32 * ratio).round() as u32).max(1)
}

/// Display region that drawable surfaces are appended to
pub trait HostSurface {
    fn append(&mut self, surface: &DrawableSurface) -> Result<()>;
}

/// Host that keeps an ordered record of appended surfaces
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    attached: Vec<DrawableSurface>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appended surfaces in attach order; a surface attached twice appears twice
    pub fn attached(&self) -> &[DrawableSurface] {
        &self.attached
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}

impl HostSurface for SurfaceRegistry {
    fn append(&mut self, surface: &DrawableSurface) -> Result<()> {
        log::debug!(
            "Appending surface {:?} ({}x{}) to host",
            surface.id,
            surface.width,
            surface.height
        );
        self.attached.push(*surface);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drawing_buffer_size() {
        let surface = DrawableSurface {
            id: SurfaceId(1),
            width: 300,
            height: 150,
            pixel_ratio: 2.0,
        };
        assert_eq!(surface.drawing_buffer_size(), (600, 300));
        assert_eq!(surface.aspect(), 2.0);
    }

    #[test]
    fn test_registry_keeps_duplicates() {
        let surface = DrawableSurface {
            id: SurfaceId(1),
            width: 1,
            height: 1,
            pixel_ratio: 1.0,
        };
        let mut registry = SurfaceRegistry::new();
        registry.append(&surface).unwrap();
        registry.append(&surface).unwrap();
        assert_eq!(registry.len(), 2);
    }
}
