//! Render host and frame scheduling abstractions for the overlay engine.

use crate::error::HostError;
use crate::types::{CameraPose, InstanceBufferHandle, InstanceRecord, MeshData, MeshHandle};

/// Abstraction over the host renderer the overlay engine drives.
///
/// # Implementations
///
/// - **Production**: wraps the map vendor's WebGL/Vulkan overlay surface
/// - **Simulation**: `MockRenderHost` - in-memory ledger of live resources
/// - **Visualization**: `RerunHost` - streams the scene to a Rerun viewer
///
/// # Resource Flow
///
/// ```text
/// Engine                          Host
///   |                               |
///   |-- create_mesh(data) -------->| allocate GPU buffers
///   |<------ MeshHandle -----------|
///   |                               |
///   |-- dispose_mesh(handle) ----->| free GPU buffers
///   |                               |
///   |-- request_redraw() --------->| (fire-and-forget)
/// ```
///
/// All methods take `&mut self`: the engine is single-threaded and owns the
/// host exclusively, so there is no interior locking anywhere on this path.
pub trait RenderHost {
    /// Uploads a triangle mesh and returns its handle.
    ///
    /// # Returns
    /// * `Ok(handle)` - Mesh is live on the host
    /// * `Err(HostError::RendererError)` - Upload failed
    fn create_mesh(&mut self, data: &MeshData) -> Result<MeshHandle, HostError>;

    /// Frees the GPU buffers behind a mesh handle.
    ///
    /// # Returns
    /// * `Err(HostError::UnknownHandle)` - Handle was already disposed
    ///
    /// # Note
    /// Teardown paths call this while the host may itself be shutting down;
    /// callers on those paths swallow the error.
    fn dispose_mesh(&mut self, handle: MeshHandle) -> Result<(), HostError>;

    /// Allocates a fixed-capacity instance buffer.
    ///
    /// Capacity is in instances; the active count is set by each
    /// `write_instances` call and never exceeds the capacity.
    fn create_instance_buffer(&mut self, capacity: usize)
        -> Result<InstanceBufferHandle, HostError>;

    /// Replaces the active prefix of an instance buffer.
    ///
    /// `records.len()` becomes the buffer's active instance count.
    ///
    /// # Returns
    /// * `Err(HostError::BufferOverflow)` - More records than capacity
    /// * `Err(HostError::UnknownHandle)` - Buffer was disposed
    fn write_instances(
        &mut self,
        handle: InstanceBufferHandle,
        records: &[InstanceRecord],
    ) -> Result<(), HostError>;

    /// Overwrites the color of a single live instance slot.
    ///
    /// Used by the color animator every frame; must not touch the transform.
    fn write_instance_color(
        &mut self,
        handle: InstanceBufferHandle,
        slot: usize,
        color: [f32; 3],
    ) -> Result<(), HostError>;

    /// Frees an instance buffer.
    fn dispose_instance_buffer(&mut self, handle: InstanceBufferHandle)
        -> Result<(), HostError>;

    /// True while the host's map camera can accept poses.
    ///
    /// Camera commands issued while this is false are dropped by the engine
    /// (logged at debug level, never surfaced).
    fn camera_ready(&self) -> bool;

    /// Applies a camera pose to the host's map camera.
    ///
    /// # Returns
    /// * `Err(HostError::CameraUnavailable)` - Host camera context is gone
    fn apply_camera(&mut self, pose: &CameraPose) -> Result<(), HostError>;

    /// Asks the host to repaint.
    ///
    /// One-way and fire-and-forget: the host coalesces repeated requests
    /// within a frame, and there is no completion signal.
    fn request_redraw(&mut self);
}

/// Abstraction over the host's frame-callback facility.
///
/// The engine keeps at most one callback outstanding: `schedule_frame` while
/// one is pending is a no-op, and the host calls the engine's `tick()` once
/// per granted frame. `cancel_frame` revokes a pending callback (teardown).
///
/// Implementable atop requestAnimationFrame, a vsync signal, or a test loop
/// that fires callbacks manually.
pub trait FrameScheduler {
    /// Requests one frame callback.
    fn schedule_frame(&mut self);

    /// Revokes the pending frame callback, if any.
    fn cancel_frame(&mut self);
}
