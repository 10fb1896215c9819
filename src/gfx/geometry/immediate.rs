//! Free-form vertex/face geometry
//!
//! An [`ImmediateGeometry`] is filled by the application one vertex and one
//! face at a time. Before drawing, the renderer flattens it into non-indexed
//! `position` (and optionally `color`) buffer attributes. The flattened
//! buffers are cached and rebuilt only after
//! [`ImmediateGeometry::set_vertices_need_update`] is called with `true`.

use std::{cell::RefCell, rc::Rc};

use super::buffer::{BufferAttribute, BufferGeometry};
use crate::{error::Result, math::Vector3};

/// Triangle referencing three vertices by index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face3 {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl Face3 {
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        Self { a, b, c }
    }
}

/// How vertices are laid out when flattening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlattenMode {
    /// Three vertices per face, in face order (meshes)
    Faces,
    /// The vertex list as-is (points and lines)
    Vertices,
}

#[derive(Debug, Default)]
struct FlattenCache {
    geometry: Option<BufferGeometry>,
    revision: u64,
}

#[derive(Debug, Default)]
struct ImmediateData {
    vertices: Vec<Vector3>,
    faces: Vec<Face3>,
    colors: Vec<[f32; 3]>,
    revision: u64,
    faces_cache: FlattenCache,
    vertices_cache: FlattenCache,
}

/// Shared handle to a free-form vertex/face container
#[derive(Debug, Clone, Default)]
pub struct ImmediateGeometry(Rc<RefCell<ImmediateData>>);

impl ImmediateGeometry {
    /// Creates an empty geometry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_vertex(&self, vertex: Vector3) -> u32 {
        let mut data = self.0.borrow_mut();
        data.vertices.push(vertex);
        (data.vertices.len() - 1) as u32
    }

    pub fn push_face(&self, a: u32, b: u32, c: u32) {
        self.0.borrow_mut().faces.push(Face3::new(a, b, c));
    }

    /// Adds a per-vertex colour; colours are only used once every vertex has one
    pub fn push_color(&self, rgb: [f32; 3]) {
        self.0.borrow_mut().colors.push(rgb);
    }

    /// Requests that the flattened buffers be rebuilt on next use
    pub fn set_vertices_need_update(&self, flag: bool) {
        if flag {
            self.0.borrow_mut().revision += 1;
        }
    }

    pub fn vertices(&self) -> Vec<Vector3> {
        self.0.borrow().vertices.clone()
    }

    pub fn faces(&self) -> Vec<Face3> {
        self.0.borrow().faces.clone()
    }

    pub fn vertex_count(&self) -> usize {
        self.0.borrow().vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.0.borrow().faces.len()
    }

    /// Builds a fresh, uncached buffer geometry from the current contents
    pub fn to_buffer_geometry(&self, mode: FlattenMode) -> Result<BufferGeometry> {
        let (positions, colors) = self.flatten(mode);
        let geometry = BufferGeometry::new();
        geometry.add_attribute("position", BufferAttribute::float32(positions, 3)?);
        if let Some(colors) = colors {
            geometry.add_attribute("color", BufferAttribute::float32(colors, 3)?);
        }
        Ok(geometry)
    }

    /// Cached flattened form used by the renderer
    ///
    /// On a revision change the cached attributes keep their identity: their
    /// arrays are replaced and flagged for upload.
    pub(crate) fn buffer_geometry(&self, mode: FlattenMode) -> Result<BufferGeometry> {
        let (cached, revision) = {
            let data = self.0.borrow();
            let cache = match mode {
                FlattenMode::Faces => &data.faces_cache,
                FlattenMode::Vertices => &data.vertices_cache,
            };
            (cache.geometry.clone(), data.revision)
        };

        let geometry = match cached {
            Some(geometry) if self.cache_revision(mode) == revision => return Ok(geometry),
            Some(geometry) => {
                let (positions, colors) = self.flatten(mode);
                refresh_attribute(&geometry, "position", positions)?;
                match colors {
                    Some(colors) => refresh_attribute(&geometry, "color", colors)?,
                    None => {
                        geometry.remove_attribute("color");
                    }
                }
                log::debug!("Rebuilt flattened geometry ({:?})", mode);
                geometry
            }
            None => self.to_buffer_geometry(mode)?,
        };

        let mut data = self.0.borrow_mut();
        let cache = match mode {
            FlattenMode::Faces => &mut data.faces_cache,
            FlattenMode::Vertices => &mut data.vertices_cache,
        };
        cache.geometry = Some(geometry.clone());
        cache.revision = revision;
        Ok(geometry)
    }

    fn cache_revision(&self, mode: FlattenMode) -> u64 {
        let data = self.0.borrow();
        match mode {
            FlattenMode::Faces => data.faces_cache.revision,
            FlattenMode::Vertices => data.vertices_cache.revision,
        }
    }

    fn flatten(&self, mode: FlattenMode) -> (Vec<f32>, Option<Vec<f32>>) {
        let data = self.0.borrow();
        let with_colors = !data.vertices.is_empty() && data.colors.len() >= data.vertices.len();

        let order: Vec<usize> = match mode {
            FlattenMode::Vertices => (0..data.vertices.len()).collect(),
            FlattenMode::Faces => {
                let count = data.vertices.len();
                let mut order = Vec::with_capacity(data.faces.len() * 3);
                let mut skipped = 0usize;
                for face in &data.faces {
                    let corners = [face.a as usize, face.b as usize, face.c as usize];
                    if corners.iter().all(|&i| i < count) {
                        order.extend_from_slice(&corners);
                    } else {
                        skipped += 1;
                    }
                }
                if skipped > 0 {
                    log::warn!(
                        "Skipped {} face(s) referencing vertices beyond {}",
                        skipped,
                        count
                    );
                }
                order
            }
        };

        let mut positions = Vec::with_capacity(order.len() * 3);
        let mut colors = Vec::with_capacity(if with_colors { order.len() * 3 } else { 0 });
        for &i in &order {
            let v = data.vertices[i];
            positions.extend_from_slice(&[v.x, v.y, v.z]);
            if with_colors {
                colors.extend_from_slice(&data.colors[i]);
            }
        }

        (positions, with_colors.then_some(colors))
    }

    pub fn ptr_eq(&self, other: &ImmediateGeometry) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

fn refresh_attribute(geometry: &BufferGeometry, name: &str, array: Vec<f32>) -> Result<()> {
    match geometry.attribute(name) {
        Some(attribute) => {
            attribute.set_array(array)?;
            attribute.set_needs_update(true);
        }
        None => geometry.add_attribute(name, BufferAttribute::float32(array, 3)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vec3;

    fn triangle() -> ImmediateGeometry {
        let geometry = ImmediateGeometry::new();
        geometry.push_vertex(vec3(0.0, 0.0, 0.0));
        geometry.push_vertex(vec3(1.0, 0.0, 0.0));
        geometry.push_vertex(vec3(0.0, 1.0, 0.0));
        geometry.push_face(0, 1, 2);
        geometry
    }

    #[test]
    fn test_flatten_faces() {
        let geometry = triangle();
        let buffers = geometry.to_buffer_geometry(FlattenMode::Faces).unwrap();
        assert_eq!(buffers.vertex_count(), 3);
        assert!(buffers.attribute("color").is_none());
    }

    #[test]
    fn test_out_of_range_faces_are_skipped() {
        let geometry = triangle();
        geometry.push_face(0, 1, 9);
        let buffers = geometry.to_buffer_geometry(FlattenMode::Faces).unwrap();
        assert_eq!(buffers.vertex_count(), 3);
    }

    #[test]
    fn test_colors_used_only_when_complete() {
        let geometry = triangle();
        geometry.push_color([1.0, 0.0, 0.0]);
        let partial = geometry.to_buffer_geometry(FlattenMode::Vertices).unwrap();
        assert!(partial.attribute("color").is_none());

        geometry.push_color([0.0, 1.0, 0.0]);
        geometry.push_color([0.0, 0.0, 1.0]);
        let full = geometry.to_buffer_geometry(FlattenMode::Vertices).unwrap();
        assert_eq!(full.attribute("color").unwrap().count(), 3);
    }

    #[test]
    fn test_cache_rebuilds_only_after_flag() {
        let geometry = triangle();
        let first = geometry.buffer_geometry(FlattenMode::Faces).unwrap();
        let position = first.attribute("position").unwrap();

        geometry.push_vertex(vec3(1.0, 1.0, 0.0));
        geometry.push_face(1, 3, 2);
        let cached = geometry.buffer_geometry(FlattenMode::Faces).unwrap();
        assert!(cached.ptr_eq(&first));
        assert_eq!(cached.vertex_count(), 3);

        geometry.set_vertices_need_update(true);
        let rebuilt = geometry.buffer_geometry(FlattenMode::Faces).unwrap();
        assert!(rebuilt.ptr_eq(&first));
        assert_eq!(rebuilt.vertex_count(), 6);
        assert!(position.needs_update());
    }
}
