//! # Tartan Prelude
//!
//! Commonly used types in one import:
//!
//! ```rust
//! use tartan::prelude::*;
//!
//! let scene = Scene::new();
//! let camera = PerspectiveCamera::new(50.0, 1.0, 0.1, 100.0).unwrap();
//! let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
//! renderer.render(&scene, &camera).unwrap();
//! ```

pub use crate::{
    config::RendererConfig,
    error::{Result, TartanError},
    gfx::{
        camera::{PerspectiveCamera, Projection},
        geometry::{
            box_geometry, BufferAttribute, BufferGeometry, Face3, FlattenMode, Geometry,
            ImmediateGeometry,
        },
        material::{Material, MaterialKind, MaterialParameters, ParameterValue},
        rendering::{
            DrawableSurface, HostSurface, RecordingEngine, RenderEngine, RenderInfo, Renderer,
            SurfaceRegistry, WgpuEngine,
        },
        scene::{Group, Line, Mesh, NodeType, Object3D, Points, Scene},
    },
    math::{vec3, Vector3},
};
