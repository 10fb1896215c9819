//! # Primitive Shape Generation
//!
//! Procedural shapes built as [`ImmediateGeometry`].

use super::immediate::ImmediateGeometry;
use crate::{
    error::{Result, TartanError},
    math::vec3,
};

/// Generate a box centered at the origin
///
/// Each face has its own four vertices so faces can be coloured
/// independently: 24 vertices and 12 counter-clockwise triangles.
///
/// # Errors
/// `InvalidArgument` for a negative or non-finite dimension. Zero is allowed
/// and yields a flat (degenerate) box.
pub fn box_geometry(width: f32, height: f32, depth: f32) -> Result<ImmediateGeometry> {
    for (label, value) in [("width", width), ("height", height), ("depth", depth)] {
        if !value.is_finite() || value < 0.0 {
            return Err(TartanError::invalid(format!(
                "box {} must be a non-negative number, got {}",
                label, value
            )));
        }
    }

    let (hx, hy, hz) = (width * 0.5, height * 0.5, depth * 0.5);

    #[rustfmt::skip]
    let corners: [[f32; 3]; 24] = [
        // Front face
        [-1.0, -1.0,  1.0], [ 1.0, -1.0,  1.0], [ 1.0,  1.0,  1.0], [-1.0,  1.0,  1.0],
        // Back face
        [-1.0, -1.0, -1.0], [-1.0,  1.0, -1.0], [ 1.0,  1.0, -1.0], [ 1.0, -1.0, -1.0],
        // Left face
        [-1.0, -1.0, -1.0], [-1.0, -1.0,  1.0], [-1.0,  1.0,  1.0], [-1.0,  1.0, -1.0],
        // Right face
        [ 1.0, -1.0,  1.0], [ 1.0, -1.0, -1.0], [ 1.0,  1.0, -1.0], [ 1.0,  1.0,  1.0],
        // Top face
        [-1.0,  1.0,  1.0], [ 1.0,  1.0,  1.0], [ 1.0,  1.0, -1.0], [-1.0,  1.0, -1.0],
        // Bottom face
        [-1.0, -1.0, -1.0], [ 1.0, -1.0, -1.0], [ 1.0, -1.0,  1.0], [-1.0, -1.0,  1.0],
    ];

    let geometry = ImmediateGeometry::new();
    for [x, y, z] in corners {
        geometry.push_vertex(vec3(x * hx, y * hy, z * hz));
    }

    // Two triangles per face
    for face in 0..6u32 {
        let base = face * 4;
        geometry.push_face(base, base + 1, base + 2);
        geometry.push_face(base + 2, base + 3, base);
    }

    Ok(geometry)
}
