//! Small math layer over `cgmath`
//!
//! Positions and Euler rotations are plain `cgmath::Vector3<f32>` values.
//! Rotations use the XYZ order: the rotation matrix is `Rx * Ry * Rz`.

use cgmath::{InnerSpace, Matrix3, Matrix4, Rad, SquareMatrix};

/// Three-component `f32` vector used for positions, rotations and directions
pub type Vector3 = cgmath::Vector3<f32>;

/// Builds a [`Vector3`] from its components
pub fn vec3(x: f32, y: f32, z: f32) -> Vector3 {
    Vector3::new(x, y, z)
}

/// Rotation matrix for XYZ Euler angles in radians
pub fn rotation_from_euler(euler: Vector3) -> Matrix3<f32> {
    Matrix3::from_angle_x(Rad(euler.x))
        * Matrix3::from_angle_y(Rad(euler.y))
        * Matrix3::from_angle_z(Rad(euler.z))
}

/// XYZ Euler angles in radians for a pure rotation matrix
///
/// Near gimbal lock (`|sin y| ~ 1`) the Z angle is folded into X.
pub fn euler_from_rotation(m: &Matrix3<f32>) -> Vector3 {
    // cgmath indexes as m[column][row]
    let m11 = m[0][0];
    let m12 = m[1][0];
    let m13 = m[2][0];
    let m22 = m[1][1];
    let m23 = m[2][1];
    let m32 = m[1][2];
    let m33 = m[2][2];

    let y = m13.clamp(-1.0, 1.0).asin();
    if m13.abs() < 0.999_999_9 {
        vec3((-m23).atan2(m33), y, (-m12).atan2(m11))
    } else {
        vec3(m32.atan2(m22), y, 0.0)
    }
}

/// Orthonormal basis whose local +Z axis points from `target` to `eye`
///
/// `eye` and `target` must differ. When the view direction is parallel to
/// `up` the direction is nudged slightly so a basis still exists.
pub fn look_at_basis(eye: Vector3, target: Vector3, up: Vector3) -> Matrix3<f32> {
    let mut z = (eye - target).normalize();
    let mut x = up.cross(z);

    if x.magnitude2() == 0.0 {
        if up.z.abs() == 1.0 {
            z.x += 0.0001;
        } else {
            z.z += 0.0001;
        }
        z = z.normalize();
        x = up.cross(z);
    }

    let x = x.normalize();
    let y = z.cross(x);
    Matrix3::from_cols(x, y, z)
}

/// Local transform matrix from a translation and XYZ Euler rotation
pub fn compose_transform(position: Vector3, rotation: Vector3) -> Matrix4<f32> {
    Matrix4::from_translation(position) * Matrix4::from(rotation_from_euler(rotation))
}

/// Upper-left rotation block of a rigid transform
pub fn rotation_part(m: &Matrix4<f32>) -> Matrix3<f32> {
    Matrix3::from_cols(m.x.truncate(), m.y.truncate(), m.z.truncate())
}

/// Inverse of a rigid transform, falling back to identity for singular input
pub fn inverse_or_identity(m: &Matrix4<f32>) -> Matrix4<f32> {
    m.invert().unwrap_or_else(Matrix4::identity)
}

/// Column-major array form expected by GPU uniforms
pub fn matrix_to_array(matrix4: Matrix4<f32>) -> [[f32; 4]; 4] {
    let mut result = [[0.0; 4]; 4];

    for i in 0..4 {
        for j in 0..4 {
            result[i][j] = matrix4[i][j];
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::Matrix;

    #[test]
    fn test_euler_round_trip() {
        let euler = vec3(0.3, -0.7, 1.1);
        let back = euler_from_rotation(&rotation_from_euler(euler));
        assert_relative_eq!(back.x, euler.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, euler.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, euler.z, epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_basis_is_orthonormal() {
        let basis = look_at_basis(vec3(0.0, 0.0, 5.0), vec3(1.0, 2.0, 0.0), vec3(0.0, 1.0, 0.0));
        let product = basis * basis.transpose();
        let identity = Matrix3::<f32>::identity();
        for c in 0..3 {
            for r in 0..3 {
                assert_relative_eq!(product[c][r], identity[c][r], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_look_at_basis_parallel_to_up() {
        let basis = look_at_basis(vec3(0.0, 5.0, 0.0), vec3(0.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0));
        assert!(basis.x.x.is_finite());
        assert!(basis.y.magnitude() > 0.99);
    }

    #[test]
    fn test_matrix_to_array_is_column_major() {
        let m = Matrix4::from_translation(vec3(1.0, 2.0, 3.0));
        let array = matrix_to_array(m);
        assert_eq!(array[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
