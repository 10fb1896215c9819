//! Frame rendering
//!
//! [`Renderer`] turns a scene tree and a camera into uploads and draw calls
//! for a [`RenderEngine`]. [`WgpuEngine`] renders offscreen through wgpu;
//! [`RecordingEngine`] records the calls for inspection.

pub mod engine;
pub mod recording;
pub mod renderer;
pub mod surface;
pub mod wgpu_engine;

pub use engine::{
    AttributeBinding, AttributeUpload, DrawSubmission, FrameSetup, RenderEngine, SurfaceId,
    Topology,
};
pub use recording::{EngineEvent, RecordingEngine};
pub use renderer::{RenderInfo, Renderer};
pub use surface::{DrawableSurface, HostSurface, SurfaceRegistry};
pub use wgpu_engine::WgpuEngine;
