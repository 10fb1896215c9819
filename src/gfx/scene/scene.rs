use std::{fmt, ops::Deref};

use super::object::{NodeKind, Object3D, Renderable};
use crate::gfx::{geometry::Geometry, material::Material};

/// Typed handle over an [`Object3D`] of one node type
macro_rules! node_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(Object3D);

        impl $name {
            pub fn object(&self) -> &Object3D {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = Object3D;

            fn deref(&self) -> &Object3D {
                &self.0
            }
        }

        impl AsRef<Object3D> for $name {
            fn as_ref(&self) -> &Object3D {
                &self.0
            }
        }

        impl From<$name> for Object3D {
            fn from(node: $name) -> Self {
                node.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }
    };
}

/// Renderable handle: adds construction and content accessors
macro_rules! renderable_handle {
    ($(#[$meta:meta])* $name:ident, $variant:ident) => {
        node_handle!($(#[$meta])* $name);

        impl $name {
            pub fn new(geometry: impl Into<Geometry>, material: Material) -> Self {
                Self(Object3D::from_kind(NodeKind::$variant(Renderable {
                    geometry: geometry.into(),
                    material,
                })))
            }

            pub fn geometry(&self) -> Geometry {
                self.renderable_content().geometry
            }

            pub fn material(&self) -> Material {
                self.renderable_content().material
            }

            fn renderable_content(&self) -> Renderable {
                self.0.with_kind(|kind| match kind {
                    NodeKind::$variant(renderable) => renderable.clone(),
                    _ => unreachable!(concat!(stringify!($name), " always wraps a renderable node")),
                })
            }
        }
    };
}

node_handle!(
    /// Root of a scene tree
    Scene
);

impl Scene {
    pub fn new() -> Self {
        Self(Object3D::from_kind(NodeKind::Scene))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

node_handle!(
    /// Transform-only container
    Group
);

impl Group {
    pub fn new() -> Self {
        Self(Object3D::from_kind(NodeKind::Group))
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

renderable_handle!(
    /// Draws every vertex as a point sprite
    Points,
    Points
);

renderable_handle!(
    /// Draws the vertices as one connected polyline
    Line,
    Line
);

renderable_handle!(
    /// Draws triangles
    ///
    /// Immediate geometry is flattened face by face; buffer geometry is
    /// treated as a non-indexed triangle list.
    Mesh,
    Mesh
);
