//! Rendering engine abstraction
//!
//! The [`Renderer`](super::Renderer) walks the scene tree and decides what to
//! upload and draw; a [`RenderEngine`] owns the device-side resources and
//! executes those decisions. Two engines ship with the crate:
//! [`WgpuEngine`](super::WgpuEngine) for real offscreen rendering and
//! [`RecordingEngine`](super::RecordingEngine) which only logs the calls it
//! receives.

use cgmath::Matrix4;

use crate::{
    error::Result,
    gfx::{geometry::AttributeId, scene::NodeId},
};

/// Handle to a drawable surface stored in the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// How the vertices of one draw are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Every three vertices form a triangle
    Triangles,
    /// Consecutive vertices are joined by segments
    LineStrip,
    /// Every vertex is a point
    Points,
}

/// Attribute contents handed to the engine for upload
#[derive(Debug, Clone, Copy)]
pub struct AttributeUpload<'a> {
    pub id: AttributeId,
    pub name: &'a str,
    pub version: u64,
    pub item_size: usize,
    pub data: &'a [f32],
}

/// Per-frame state, fixed for every draw of the frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSetup {
    pub surface: SurfaceId,
    pub clear_color: [f32; 4],
    /// World-to-camera transform
    pub view: Matrix4<f32>,
    /// Camera projection in OpenGL clip-space convention
    pub projection: Matrix4<f32>,
}

/// Named vertex stream used by a draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    pub name: String,
    pub id: AttributeId,
    pub item_size: usize,
}

/// One draw call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSubmission {
    pub node: NodeId,
    pub topology: Topology,
    /// Node-to-world transform
    pub model: Matrix4<f32>,
    pub attributes: Vec<AttributeBinding>,
    pub vertex_count: u32,
    /// Material colour as linear RGBA
    pub color: [f32; 4],
    pub point_size: f32,
    /// Multiply the material colour by the `color` attribute
    pub vertex_colors: bool,
}

impl DrawSubmission {
    pub fn attribute(&self, name: &str) -> Option<&AttributeBinding> {
        self.attributes.iter().find(|binding| binding.name == name)
    }
}

/// Device-side half of the renderer
///
/// Calls arrive in a fixed order per frame: any number of uploads, then
/// `begin_frame`, then `draw` once per renderable, then `end_frame`. Uploads
/// for a draw always happen before its `draw` call, possibly between other
/// draws of the same frame. A frame whose upload or draw fails is closed with
/// `abort_frame` instead of `end_frame`.
pub trait RenderEngine {
    /// Allocate a drawable surface of the given pixel size
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId>;

    /// Reallocate a surface's render targets at a new pixel size
    fn resize_surface(&mut self, surface: SurfaceId, width: u32, height: u32) -> Result<()>;

    /// Whether the attribute has been uploaded before
    fn is_resident(&self, attribute: AttributeId) -> bool;

    /// Copy attribute contents into device memory
    fn upload_attribute(&mut self, upload: &AttributeUpload<'_>) -> Result<()>;

    /// Free the device copy of an attribute that no longer exists
    ///
    /// Returns whether the attribute was resident.
    fn release_attribute(&mut self, attribute: AttributeId) -> bool;

    fn begin_frame(&mut self, frame: &FrameSetup) -> Result<()>;

    fn draw(&mut self, draw: &DrawSubmission) -> Result<()>;

    /// Finish the frame and submit it
    fn end_frame(&mut self) -> Result<()>;

    /// Drop the frame in progress without submitting it
    fn abort_frame(&mut self);
}

impl<E: RenderEngine + ?Sized> RenderEngine for Box<E> {
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId> {
        (**self).create_surface(width, height)
    }

    fn resize_surface(&mut self, surface: SurfaceId, width: u32, height: u32) -> Result<()> {
        (**self).resize_surface(surface, width, height)
    }

    fn is_resident(&self, attribute: AttributeId) -> bool {
        (**self).is_resident(attribute)
    }

    fn upload_attribute(&mut self, upload: &AttributeUpload<'_>) -> Result<()> {
        (**self).upload_attribute(upload)
    }

    fn release_attribute(&mut self, attribute: AttributeId) -> bool {
        (**self).release_attribute(attribute)
    }

    fn begin_frame(&mut self, frame: &FrameSetup) -> Result<()> {
        (**self).begin_frame(frame)
    }

    fn draw(&mut self, draw: &DrawSubmission) -> Result<()> {
        (**self).draw(draw)
    }

    fn end_frame(&mut self) -> Result<()> {
        (**self).end_frame()
    }

    fn abort_frame(&mut self) {
        (**self).abort_frame()
    }
}
