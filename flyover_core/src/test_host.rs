//! In-memory host implementations for unit tests: a resource-ledger render
//! host and a manually advanced clock.

use flyover_host::{
    CameraPose, FrameScheduler, HostContext, HostError, InstanceBufferHandle, InstanceRecord,
    MeshData, MeshHandle, RenderHost,
};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// One entry in the ordered ledger of host calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostEvent {
    MeshCreated(u64),
    MeshDisposed(u64),
    BufferCreated(u64),
    BufferDisposed(u64),
    CameraApplied,
    RedrawRequested,
    FrameScheduled,
    FrameCancelled,
}

/// Render host that keeps every resource and call in memory.
pub(crate) struct LedgerHost {
    next_handle: u64,
    pub meshes: BTreeMap<u64, MeshData>,
    pub buffers: BTreeMap<u64, (usize, Vec<InstanceRecord>)>,
    pub events: Vec<HostEvent>,
    pub poses: Vec<CameraPose>,
    pub redraws: usize,
    pub frame_pending: bool,
    pub camera_ready: bool,
    pub fail_disposals: bool,
}

impl LedgerHost {
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

    pub fn live_resources(&self) -> usize {
        self.meshes.len() + self.buffers.len()
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderHost for LedgerHost {
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
        self.buffers.insert(id, (capacity, Vec::new()));
        self.events.push(HostEvent::BufferCreated(id));
        Ok(InstanceBufferHandle(id))
    }

    fn write_instances(
        &mut self,
        handle: InstanceBufferHandle,
        records: &[InstanceRecord],
    ) -> Result<(), HostError> {
        let (capacity, stored) = self
            .buffers
            .get_mut(&handle.0)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        if records.len() > *capacity {
            return Err(HostError::BufferOverflow {
                capacity: *capacity,
                requested: records.len(),
            });
        }
        *stored = records.to_vec();
        Ok(())
    }

    fn write_instance_color(
        &mut self,
        handle: InstanceBufferHandle,
        slot: usize,
        color: [f32; 3],
    ) -> Result<(), HostError> {
        let (_, stored) = self
            .buffers
            .get_mut(&handle.0)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        let record = stored
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

impl FrameScheduler for LedgerHost {
    fn schedule_frame(&mut self) {
        self.frame_pending = true;
        self.events.push(HostEvent::FrameScheduled);
    }

    fn cancel_frame(&mut self) {
        self.frame_pending = false;
        self.events.push(HostEvent::FrameCancelled);
    }
}

/// Clock whose time only moves when a test says so.
pub(crate) struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl HostContext for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}
