//! Error types for the host abstraction layer.

use thiserror::Error;

/// Errors that can occur at the engine/host boundary.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host renderer rejected an operation (device lost, out of memory, etc.)
    #[error("Renderer error: {0}")]
    RendererError(String),

    /// The host map camera is not available (host torn down or not yet ready)
    #[error("Camera context unavailable")]
    CameraUnavailable,

    /// A handle the engine holds no longer names a live host resource
    #[error("Unknown resource handle: {0}")]
    UnknownHandle(u64),

    /// More instances were written than the buffer was created to hold
    #[error("Instance buffer overflow: wrote {requested} into capacity {capacity}")]
    BufferOverflow {
        /// Allocated slot count
        capacity: usize,
        /// Slots the write needed
        requested: usize,
    },
}

impl HostError {
    /// Creates a renderer error.
    pub fn renderer(msg: impl Into<String>) -> Self {
        Self::RendererError(msg.into())
    }
}
