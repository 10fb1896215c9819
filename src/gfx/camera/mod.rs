//! Cameras
//!
//! Only perspective projection is provided. See [`PerspectiveCamera`] for the
//! explicit projection-update protocol.

pub mod perspective;

pub use perspective::{PerspectiveCamera, Projection};
