//! Engine that records calls instead of drawing
//!
//! Used for headless testing of the renderer's traversal and upload logic.

use std::collections::HashMap;

use super::engine::{AttributeUpload, DrawSubmission, FrameSetup, RenderEngine, SurfaceId};
use crate::{
    error::{Result, TartanError},
    gfx::geometry::AttributeId,
};

/// One call received by a [`RecordingEngine`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SurfaceCreated {
        surface: SurfaceId,
        width: u32,
        height: u32,
    },
    SurfaceResized {
        surface: SurfaceId,
        width: u32,
        height: u32,
    },
    Upload {
        attribute: AttributeId,
        name: String,
        version: u64,
        len: usize,
    },
    Release(AttributeId),
    BeginFrame(FrameSetup),
    Draw(DrawSubmission),
    EndFrame,
    AbortFrame,
}

/// Call-logging engine with no device behind it
#[derive(Debug, Default)]
pub struct RecordingEngine {
    surfaces: HashMap<SurfaceId, (u32, u32)>,
    resident: HashMap<AttributeId, u64>,
    events: Vec<EngineEvent>,
    next_surface: u64,
    in_frame: bool,
    fail_next: Option<String>,
    fail_upload: Option<String>,
    fail_draw: Option<String>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far, oldest first
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// The draws of the most recent complete or partial frame
    pub fn last_frame_draws(&self) -> Vec<&DrawSubmission> {
        let start = self
            .events
            .iter()
            .rposition(|event| matches!(event, EngineEvent::BeginFrame(_)))
            .map_or(0, |i| i + 1);

        self.events[start..]
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    /// Upload events for one attribute
    pub fn uploads_of(&self, attribute: AttributeId) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, EngineEvent::Upload { attribute: id, .. } if *id == attribute))
            .count()
    }

    /// Version of the last uploaded contents of an attribute
    pub fn resident_version(&self, attribute: AttributeId) -> Option<u64> {
        self.resident.get(&attribute).copied()
    }

    /// Number of attributes currently held on the "device"
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn surface_size(&self, surface: SurfaceId) -> Option<(u32, u32)> {
        self.surfaces.get(&surface).copied()
    }

    /// Whether `begin_frame` was called without a matching end or abort
    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// Makes the next engine call fail with the given message
    pub fn fail_next(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }

    /// Makes the next attribute upload fail, letting other calls through
    pub fn fail_next_upload(&mut self, message: impl Into<String>) {
        self.fail_upload = Some(message.into());
    }

    /// Makes the next draw fail, letting other calls through
    pub fn fail_next_draw(&mut self, message: impl Into<String>) {
        self.fail_draw = Some(message.into());
    }

    fn check_failure(&mut self) -> Result<()> {
        match self.fail_next.take() {
            Some(message) => Err(TartanError::engine(message)),
            None => Ok(()),
        }
    }
}

impl RenderEngine for RecordingEngine {
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId> {
        self.check_failure()?;

        self.next_surface += 1;
        let surface = SurfaceId(self.next_surface);
        self.surfaces.insert(surface, (width, height));
        self.events.push(EngineEvent::SurfaceCreated {
            surface,
            width,
            height,
        });
        Ok(surface)
    }

    fn resize_surface(&mut self, surface: SurfaceId, width: u32, height: u32) -> Result<()> {
        self.check_failure()?;

        let size = self
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| TartanError::engine(format!("unknown surface {:?}", surface)))?;
        *size = (width, height);
        self.events.push(EngineEvent::SurfaceResized {
            surface,
            width,
            height,
        });
        Ok(())
    }

    fn is_resident(&self, attribute: AttributeId) -> bool {
        self.resident.contains_key(&attribute)
    }

    fn upload_attribute(&mut self, upload: &AttributeUpload<'_>) -> Result<()> {
        self.check_failure()?;
        if let Some(message) = self.fail_upload.take() {
            return Err(TartanError::engine(message));
        }

        self.resident.insert(upload.id, upload.version);
        self.events.push(EngineEvent::Upload {
            attribute: upload.id,
            name: upload.name.to_string(),
            version: upload.version,
            len: upload.data.len(),
        });
        Ok(())
    }

    fn release_attribute(&mut self, attribute: AttributeId) -> bool {
        let resident = self.resident.remove(&attribute).is_some();
        if resident {
            self.events.push(EngineEvent::Release(attribute));
        }
        resident
    }

    fn begin_frame(&mut self, frame: &FrameSetup) -> Result<()> {
        self.check_failure()?;

        if !self.surfaces.contains_key(&frame.surface) {
            return Err(TartanError::engine(format!(
                "unknown surface {:?}",
                frame.surface
            )));
        }
        self.in_frame = true;
        self.events.push(EngineEvent::BeginFrame(frame.clone()));
        Ok(())
    }

    fn draw(&mut self, draw: &DrawSubmission) -> Result<()> {
        self.check_failure()?;
        if let Some(message) = self.fail_draw.take() {
            return Err(TartanError::engine(message));
        }

        if !self.in_frame {
            return Err(TartanError::engine("draw outside of a frame"));
        }
        if let Some(missing) = draw
            .attributes
            .iter()
            .find(|binding| !self.resident.contains_key(&binding.id))
        {
            return Err(TartanError::engine(format!(
                "attribute '{}' drawn before upload",
                missing.name
            )));
        }
        self.events.push(EngineEvent::Draw(draw.clone()));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.check_failure()?;

        self.in_frame = false;
        self.events.push(EngineEvent::EndFrame);
        Ok(())
    }

    fn abort_frame(&mut self) {
        self.in_frame = false;
        self.events.push(EngineEvent::AbortFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{rendering::engine::Topology, scene::NodeId};
    use cgmath::{Matrix4, SquareMatrix};

    #[test]
    fn test_surface_lifecycle() {
        let mut engine = RecordingEngine::new();
        let surface = engine.create_surface(300, 150).unwrap();
        engine.resize_surface(surface, 640, 480).unwrap();
        assert_eq!(engine.surface_size(surface), Some((640, 480)));
        assert!(engine.resize_surface(SurfaceId(99), 1, 1).is_err());
    }

    #[test]
    fn test_fail_next_is_one_shot() {
        let mut engine = RecordingEngine::new();
        engine.fail_next("device lost");
        assert_eq!(
            engine.create_surface(1, 1),
            Err(TartanError::Engine("device lost".to_string()))
        );
        assert!(engine.create_surface(1, 1).is_ok());
    }

    #[test]
    fn test_draw_requires_frame() {
        let mut engine = RecordingEngine::new();
        let surface = engine.create_surface(1, 1).unwrap();
        let draw = DrawSubmission {
            node: NodeId(1),
            topology: Topology::Points,
            model: Matrix4::identity(),
            attributes: Vec::new(),
            vertex_count: 0,
            color: [1.0; 4],
            point_size: 1.0,
            vertex_colors: false,
        };
        assert!(engine.draw(&draw).is_err());

        engine
            .begin_frame(&FrameSetup {
                surface,
                clear_color: [0.0; 4],
                view: Matrix4::identity(),
                projection: Matrix4::identity(),
            })
            .unwrap();
        engine.draw(&draw).unwrap();
        engine.end_frame().unwrap();
        assert_eq!(engine.last_frame_draws().len(), 1);
    }

    #[test]
    fn test_upload_failure_and_release() {
        let mut engine = RecordingEngine::new();
        let id = AttributeId(7);
        let data = [0.0; 3];
        let upload = AttributeUpload {
            id,
            name: "position",
            version: 0,
            item_size: 3,
            data: &data,
        };

        engine.fail_next_upload("out of memory");
        assert!(engine.create_surface(1, 1).is_ok());
        assert!(engine.upload_attribute(&upload).is_err());
        assert!(!engine.is_resident(id));

        engine.upload_attribute(&upload).unwrap();
        assert_eq!(engine.resident_count(), 1);
        assert!(engine.release_attribute(id));
        assert!(!engine.release_attribute(id));
        assert_eq!(engine.resident_count(), 0);
        assert_eq!(engine.events().last(), Some(&EngineEvent::Release(id)));
    }

    #[test]
    fn test_abort_closes_frame() {
        let mut engine = RecordingEngine::new();
        let surface = engine.create_surface(1, 1).unwrap();
        engine
            .begin_frame(&FrameSetup {
                surface,
                clear_color: [0.0; 4],
                view: Matrix4::identity(),
                projection: Matrix4::identity(),
            })
            .unwrap();
        assert!(engine.is_in_frame());
        engine.abort_frame();
        assert!(!engine.is_in_frame());
        assert_eq!(engine.events().last(), Some(&EngineEvent::AbortFrame));
    }
}
