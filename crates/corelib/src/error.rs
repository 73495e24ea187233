//! Error types shared by the frame driver and rendering backends.

use asset::MeshError;
use thiserror::Error;

/// Fatal failure while bringing the scene up. The driver stays in
/// `Initializing` when one of these is returned.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Mesh could not be loaded: {0}")]
    Mesh(#[from] MeshError),
    #[error("Shader program setup failed: {0}")]
    Program(String),
    #[error("Vertex buffer setup failed: {0}")]
    Buffers(String),
    #[error("Texture setup failed: {0}")]
    Texture(String),
    #[error("Frame driver is already running")]
    AlreadyRunning,
}

/// Failure reported while drawing a frame.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("Frame driver has not finished initializing")]
    NotRunning,
    #[error("Presentation surface was lost or is outdated")]
    SurfaceLost,
    #[error("Unknown {0} handle")]
    UnknownHandle(String),
    #[error("Backend error: {0}")]
    Backend(String),
}
