use std::ops::Deref;

use cgmath::Matrix4;

use crate::{
    error::{Result, TartanError},
    gfx::scene::object::{NodeKind, Object3D},
    math,
};

/// Perspective frustum parameters
///
/// `fov` is the vertical field of view in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
}

impl Projection {
    /// Projection matrix in OpenGL clip-space convention (depth in -1..1)
    pub fn matrix(&self) -> Matrix4<f32> {
        let top = self.near * (0.5 * self.fov).to_radians().tan() / self.zoom;
        let height = 2.0 * top;
        let width = self.aspect * height;
        let left = -0.5 * width;

        cgmath::frustum(left, left + width, top - height, top, self.near, self.far)
    }

    fn validate(&self) -> Result<()> {
        let positive = |label: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(TartanError::invalid(format!(
                    "camera {} must be positive, got {}",
                    label, value
                )))
            }
        };

        positive("fov", self.fov)?;
        positive("aspect", self.aspect)?;
        positive("near", self.near)?;
        positive("far", self.far)?;
        positive("zoom", self.zoom)?;

        if self.near >= self.far {
            return Err(TartanError::invalid(format!(
                "camera near ({}) must be less than far ({})",
                self.near, self.far
            )));
        }
        Ok(())
    }
}

/// Camera payload stored in the scene node
#[derive(Debug)]
pub(crate) struct CameraState {
    projection: Projection,
    projection_matrix: Matrix4<f32>,
    stale: bool,
}

/// Perspective camera node
///
/// The projection matrix is a cache: it reflects the frustum parameters only
/// as of the last [`update_projection_matrix`] call. Every parameter setter
/// marks it stale and leaves the matrix untouched, so several parameters can
/// change before paying for one recomputation. Call
/// [`update_projection_matrix`] before rendering after any change.
///
/// Dereferences to [`Object3D`] for transform and tree operations.
///
/// ```rust
/// use tartan::gfx::camera::PerspectiveCamera;
///
/// let camera = PerspectiveCamera::new(75.0, 16.0 / 9.0, 0.1, 1000.0).unwrap();
/// camera.set_position(0.0, 0.0, 5.0);
///
/// // Window resized
/// camera.set_aspect(4.0 / 3.0).unwrap();
/// assert!(camera.is_projection_stale());
/// camera.update_projection_matrix();
/// ```
///
/// [`update_projection_matrix`]: PerspectiveCamera::update_projection_matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerspectiveCamera(Object3D);

impl PerspectiveCamera {
    /// Creates a camera with a freshly computed projection matrix
    ///
    /// # Errors
    /// `InvalidArgument` unless all parameters are positive and `near < far`.
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Result<Self> {
        let projection = Projection {
            fov,
            aspect,
            near,
            far,
            zoom: 1.0,
        };
        projection.validate()?;

        let node = Object3D::from_kind(NodeKind::PerspectiveCamera(CameraState {
            projection,
            projection_matrix: projection.matrix(),
            stale: false,
        }));
        Ok(Self(node))
    }

    /// Wraps a node if it is a perspective camera
    pub fn from_object(node: &Object3D) -> Option<Self> {
        let is_camera = node.with_kind(|kind| matches!(kind, NodeKind::PerspectiveCamera(_)));
        is_camera.then(|| Self(node.clone()))
    }

    fn state<R>(&self, f: impl FnOnce(&CameraState) -> R) -> R {
        self.0.with_kind(|kind| match kind {
            NodeKind::PerspectiveCamera(state) => f(state),
            _ => unreachable!("PerspectiveCamera always wraps a camera node"),
        })
    }

    fn state_mut<R>(&self, f: impl FnOnce(&mut CameraState) -> R) -> R {
        self.0.with_kind_mut(|kind| match kind {
            NodeKind::PerspectiveCamera(state) => f(state),
            _ => unreachable!("PerspectiveCamera always wraps a camera node"),
        })
    }

    /// Applies a parameter change, keeping the old value if it is invalid
    fn modify(&self, change: impl FnOnce(&mut Projection)) -> Result<()> {
        let mut projection = self.projection();
        change(&mut projection);
        projection.validate()?;

        self.state_mut(|state| {
            state.projection = projection;
            state.stale = true;
        });
        Ok(())
    }

    /// Overwrites the aspect ratio; the projection matrix is not recomputed
    pub fn set_aspect(&self, aspect: f32) -> Result<()> {
        self.modify(|p| p.aspect = aspect)
    }

    pub fn set_fov(&self, fov: f32) -> Result<()> {
        self.modify(|p| p.fov = fov)
    }

    pub fn set_near(&self, near: f32) -> Result<()> {
        self.modify(|p| p.near = near)
    }

    pub fn set_far(&self, far: f32) -> Result<()> {
        self.modify(|p| p.far = far)
    }

    pub fn set_zoom(&self, zoom: f32) -> Result<()> {
        self.modify(|p| p.zoom = zoom)
    }

    /// Recomputes the projection matrix from the current parameters
    pub fn update_projection_matrix(&self) {
        self.state_mut(|state| {
            state.projection_matrix = state.projection.matrix();
            state.stale = false;
        });
        log::trace!("Updated projection matrix of camera {:?}", self.0.id());
    }

    pub fn projection(&self) -> Projection {
        self.state(|state| state.projection)
    }

    /// The cached matrix, as of the last recomputation
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.state(|state| state.projection_matrix)
    }

    /// Whether a parameter changed since the last recomputation
    pub fn is_projection_stale(&self) -> bool {
        self.state(|state| state.stale)
    }

    /// World-to-camera transform (inverse of the world matrix)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        math::inverse_or_identity(&self.0.world_matrix())
    }

    pub fn object(&self) -> &Object3D {
        &self.0
    }
}

impl Deref for PerspectiveCamera {
    type Target = Object3D;

    fn deref(&self) -> &Object3D {
        &self.0
    }
}

impl AsRef<Object3D> for PerspectiveCamera {
    fn as_ref(&self) -> &Object3D {
        &self.0
    }
}

impl From<PerspectiveCamera> for Object3D {
    fn from(camera: PerspectiveCamera) -> Self {
        camera.0
    }
}
