//! Error types for Tartan

use thiserror::Error;

/// Main error type for scene, geometry, camera and renderer operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TartanError {
    /// A size, dimension, stride or projection parameter was out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A mutation would break the single-parent, acyclic tree shape
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Failure reported by the rendering engine or the host surface
    #[error("Engine failure: {0}")]
    Engine(String),
}

/// Result type alias for Tartan operations
pub type Result<T> = std::result::Result<T, TartanError>;

impl TartanError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TartanError::InvalidArgument(message.into())
    }

    pub(crate) fn engine(message: impl Into<String>) -> Self {
        TartanError::Engine(message.into())
    }
}

impl From<wgpu::RequestAdapterError> for TartanError {
    fn from(e: wgpu::RequestAdapterError) -> Self {
        TartanError::Engine(e.to_string())
    }
}

impl From<wgpu::RequestDeviceError> for TartanError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        TartanError::Engine(e.to_string())
    }
}

impl From<wgpu::BufferAsyncError> for TartanError {
    fn from(e: wgpu::BufferAsyncError) -> Self {
        TartanError::Engine(e.to_string())
    }
}
