//! # Scene Graph
//!
//! Node hierarchy with local transforms. Every node is reachable through the
//! untyped [`Object3D`] handle; the typed handles ([`Scene`], [`Group`],
//! [`Points`], [`Line`], [`Mesh`]) add construction and content accessors
//! and dereference to it.
//!
//! ## Usage
//!
//! ```rust
//! use tartan::gfx::geometry::box_geometry;
//! use tartan::gfx::material::{Material, MaterialParameters};
//! use tartan::gfx::scene::{Group, Mesh, Scene};
//!
//! let scene = Scene::new();
//! let pivot = Group::new();
//! let cube = Mesh::new(
//!     box_geometry(2.0, 2.0, 2.0).unwrap(),
//!     Material::mesh_basic(MaterialParameters::new().color(0xff0000)),
//! );
//!
//! pivot.add_child(&cube).unwrap();
//! scene.add_child(&pivot).unwrap();
//! pivot.set_rotation(0.0, 0.5, 0.0);
//!
//! // A node cannot be placed below itself
//! assert!(cube.add_child(&scene).is_err());
//! ```

pub mod object;
pub mod scene;

pub use object::{NodeId, NodeType, Object3D, Renderable};
pub use scene::{Group, Line, Mesh, Points, Scene};
