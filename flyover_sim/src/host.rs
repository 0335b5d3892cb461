//! Mock render host - an in-memory ledger of everything the engine asks a
//! host to do, with controllable faults for teardown-race testing.

use flyover_host::{
    CameraPose, FrameScheduler, HostError, InstanceBufferHandle, InstanceRecord, MeshData,
    MeshHandle, RenderHost,
};
use std::collections::BTreeMap;

/// One entry in the ordered ledger of host calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    MeshCreated(u64),
    MeshDisposed(u64),
    BufferCreated(u64),
    BufferDisposed(u64),
    CameraApplied,
    RedrawRequested,
    FrameScheduled,
    FrameCancelled,
}

/// Live state of one mock instance buffer.
#[derive(Debug, Clone)]
pub struct BufferState {
    /// Allocated slot count
    pub capacity: usize,

    /// Records from the last `write_instances` call
    pub records: Vec<InstanceRecord>,
}

/// In-memory render host for simulation runs.
///
/// Every create/dispose/redraw/camera call lands in an ordered event ledger,
/// so tests can assert not just *what* the engine did but in which order.
/// `fail_disposals` simulates a host that is already torn down.
pub struct MockRenderHost {
    next_handle: u64,

    /// Live meshes by handle
    pub meshes: BTreeMap<u64, MeshData>,

    /// Live instance buffers by handle
    pub buffers: BTreeMap<u64, BufferState>,

    /// Ordered ledger of host calls
    pub events: Vec<HostEvent>,

    /// Every camera pose the engine applied
    pub poses: Vec<CameraPose>,

    /// Redraw requests received
    pub redraws: usize,

    /// True while the engine has a frame callback outstanding
    pub frame_pending: bool,

    /// Reported to the engine via `camera_ready()`
    pub camera_ready: bool,

    /// When set, every dispose call fails (torn-down host)
    pub fail_disposals: bool,
}

impl Default for MockRenderHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRenderHost {
    /// Creates an empty, healthy mock host.
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            meshes: BTreeMap::new(),
            buffers: BTreeMap::new(),
            events: Vec::new(),
            poses: Vec::new(),
            redraws: 0,
            frame_pending: false,
            camera_ready: true,
            fail_disposals: false,
        }
    }

    /// Number of resources currently live on the host. Zero after a clean
    /// teardown - the single most important number the oracle checks.
    pub fn live_resource_count(&self) -> usize {
        self.meshes.len() + self.buffers.len()
    }

    /// Consumes the outstanding frame callback, if any.
    ///
    /// The runner calls this once per simulated frame: a `true` return means
    /// the host "fires" the callback and the engine should tick.
    pub fn consume_frame(&mut self) -> bool {
        let pending = self.frame_pending;
        self.frame_pending = false;
        pending
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderHost for MockRenderHost {
    fn create_mesh(&mut self, data: &MeshData) -> Result<MeshHandle, HostError> {
        let id = self.next();
        self.meshes.insert(id, data.clone());
        self.events.push(HostEvent::MeshCreated(id));
        Ok(MeshHandle(id))
    }

    fn dispose_mesh(&mut self, handle: MeshHandle) -> Result<(), HostError> {
        if self.fail_disposals {
            return Err(HostError::renderer("host torn down"));
        }
        self.meshes
            .remove(&handle.0)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        self.events.push(HostEvent::MeshDisposed(handle.0));
        Ok(())
    }

    fn create_instance_buffer(
        &mut self,
        capacity: usize,
    ) -> Result<InstanceBufferHandle, HostError> {
        let id = self.next();
        self.buffers.insert(
            id,
            BufferState {
                capacity,
                records: Vec::new(),
            },
        );
        self.events.push(HostEvent::BufferCreated(id));
        Ok(InstanceBufferHandle(id))
    }

    fn write_instances(
        &mut self,
        handle: InstanceBufferHandle,
        records: &[InstanceRecord],
    ) -> Result<(), HostError> {
        let buffer = self
            .buffers
            .get_mut(&handle.0)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        if records.len() > buffer.capacity {
            return Err(HostError::BufferOverflow {
                capacity: buffer.capacity,
                requested: records.len(),
            });
        }
        buffer.records = records.to_vec();
        Ok(())
    }

    fn write_instance_color(
        &mut self,
        handle: InstanceBufferHandle,
        slot: usize,
        color: [f32; 3],
    ) -> Result<(), HostError> {
        let buffer = self
            .buffers
            .get_mut(&handle.0)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        let record = buffer
            .records
            .get_mut(slot)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        record.color = color;
        Ok(())
    }

    fn dispose_instance_buffer(&mut self, handle: InstanceBufferHandle) -> Result<(), HostError> {
        if self.fail_disposals {
            return Err(HostError::renderer("host torn down"));
        }
        self.buffers
            .remove(&handle.0)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        self.events.push(HostEvent::BufferDisposed(handle.0));
        Ok(())
    }

    fn camera_ready(&self) -> bool {
        self.camera_ready
    }

    fn apply_camera(&mut self, pose: &CameraPose) -> Result<(), HostError> {
        if !self.camera_ready {
            return Err(HostError::CameraUnavailable);
        }
        self.poses.push(*pose);
        self.events.push(HostEvent::CameraApplied);
        Ok(())
    }

    fn request_redraw(&mut self) {
        self.redraws += 1;
        self.events.push(HostEvent::RedrawRequested);
    }
}

impl FrameScheduler for MockRenderHost {
    fn schedule_frame(&mut self) {
        self.frame_pending = true;
        self.events.push(HostEvent::FrameScheduled);
    }

    fn cancel_frame(&mut self) {
        self.frame_pending = false;
        self.events.push(HostEvent::FrameCancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_tracks_lifecycle() {
        let mut host = MockRenderHost::new();

        let mesh = host.create_mesh(&MeshData::empty()).unwrap();
        let buffer = host.create_instance_buffer(4).unwrap();
        assert_eq!(host.live_resource_count(), 2);

        host.dispose_mesh(mesh).unwrap();
        host.dispose_instance_buffer(buffer).unwrap();
        assert_eq!(host.live_resource_count(), 0);

        assert_eq!(
            host.events,
            vec![
                HostEvent::MeshCreated(mesh.0),
                HostEvent::BufferCreated(buffer.0),
                HostEvent::MeshDisposed(mesh.0),
                HostEvent::BufferDisposed(buffer.0),
            ]
        );
    }

    #[test]
    fn test_double_dispose_is_unknown_handle() {
        let mut host = MockRenderHost::new();
        let mesh = host.create_mesh(&MeshData::empty()).unwrap();
        host.dispose_mesh(mesh).unwrap();
        assert!(matches!(
            host.dispose_mesh(mesh),
            Err(HostError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_overflow_is_rejected() {
        let mut host = MockRenderHost::new();
        let buffer = host.create_instance_buffer(1).unwrap();
        let record = InstanceRecord::new([0.0; 16], [1.0, 1.0, 1.0]);
        assert!(matches!(
            host.write_instances(buffer, &[record, record]),
            Err(HostError::BufferOverflow { .. })
        ));
    }

    #[test]
    fn test_consume_frame_resets_pending() {
        let mut host = MockRenderHost::new();
        host.schedule_frame();
        assert!(host.consume_frame());
        assert!(!host.consume_frame());
    }
}
