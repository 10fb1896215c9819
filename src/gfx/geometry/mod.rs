//! # Geometry
//!
//! Renderable shape data in two flavours:
//!
//! - **Immediate** ([`ImmediateGeometry`]): a free-form list of vertices and
//!   triangle faces, filled by the application.
//! - **Buffer** ([`BufferGeometry`]): a map from attribute name (`"position"`,
//!   `"color"`, ...) to a strided [`BufferAttribute`].
//!
//! ## Usage
//!
//! ```rust
//! use tartan::gfx::geometry::{box_geometry, BufferAttribute, BufferGeometry, Geometry};
//!
//! let cube: Geometry = box_geometry(2.0, 2.0, 2.0).unwrap().into();
//!
//! let cloud = BufferGeometry::new();
//! let positions = BufferAttribute::float32(vec![0.0; 300], 3).unwrap();
//! cloud.add_attribute("position", positions.clone());
//!
//! // Later: rewrite the data, then request a single re-upload
//! positions.set_array(vec![1.0; 300]).unwrap();
//! positions.set_needs_update(true);
//! ```

pub mod buffer;
pub mod immediate;
pub mod primitives;

pub use buffer::{AttributeId, BufferAttribute, BufferGeometry};
pub use immediate::{Face3, FlattenMode, ImmediateGeometry};
pub use primitives::box_geometry;

use crate::error::Result;

/// Geometry attached to a renderable node
#[derive(Debug, Clone)]
pub enum Geometry {
    Immediate(ImmediateGeometry),
    Buffer(BufferGeometry),
}

impl Geometry {
    /// Buffer form handed to the rendering engine
    ///
    /// Buffer geometry is returned as-is; immediate geometry is flattened
    /// (and cached) according to `mode`.
    pub fn resolve(&self, mode: FlattenMode) -> Result<BufferGeometry> {
        match self {
            Geometry::Immediate(geometry) => geometry.buffer_geometry(mode),
            Geometry::Buffer(geometry) => Ok(geometry.clone()),
        }
    }

    pub fn as_immediate(&self) -> Option<&ImmediateGeometry> {
        match self {
            Geometry::Immediate(geometry) => Some(geometry),
            Geometry::Buffer(_) => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&BufferGeometry> {
        match self {
            Geometry::Buffer(geometry) => Some(geometry),
            Geometry::Immediate(_) => None,
        }
    }
}

impl From<ImmediateGeometry> for Geometry {
    fn from(geometry: ImmediateGeometry) -> Self {
        Geometry::Immediate(geometry)
    }
}

impl From<BufferGeometry> for Geometry {
    fn from(geometry: BufferGeometry) -> Self {
        Geometry::Buffer(geometry)
    }
}
