//! # Graphics Module
//!
//! Scene graph, geometry, materials, cameras and rendering for Tartan.
//!
//! ## Architecture Overview
//!
//! - **Scene Graph** ([`scene`]) - `Object3D` node tree with local transforms
//! - **Geometry** ([`geometry`]) - Immediate vertex/face lists and attribute buffers
//! - **Materials** ([`material`]) - Shareable parameter bags
//! - **Camera System** ([`camera`]) - Perspective camera with explicit projection updates
//! - **Rendering** ([`rendering`]) - Renderer, engine trait and engine adapters
//!
//! ## Usage
//!
//! ```rust
//! use tartan::gfx::{
//!     camera::PerspectiveCamera,
//!     geometry::box_geometry,
//!     material::{Material, MaterialParameters},
//!     rendering::{RecordingEngine, Renderer, SurfaceRegistry},
//!     scene::{Mesh, Scene},
//! };
//!
//! let scene = Scene::new();
//! let camera = PerspectiveCamera::new(75.0, 1.77, 0.1, 1000.0).unwrap();
//! camera.set_position(0.0, 0.0, 5.0);
//!
//! let cube = Mesh::new(
//!     box_geometry(2.0, 2.0, 2.0).unwrap(),
//!     Material::mesh_basic(MaterialParameters::new().color(0xff0000)),
//! );
//! scene.add_child(&cube).unwrap();
//!
//! let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
//! renderer.attach_to_host_surface(&mut SurfaceRegistry::new()).unwrap();
//! assert_eq!(renderer.render(&scene, &camera).unwrap().calls, 1);
//! ```

pub mod camera;
pub mod geometry;
pub mod material;
pub mod rendering;
pub mod scene;

// Re-export commonly used types
pub use camera::PerspectiveCamera;
pub use rendering::{RenderEngine, Renderer};
pub use scene::{Object3D, Scene};
