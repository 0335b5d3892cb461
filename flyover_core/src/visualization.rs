//! Visualization host for the overlay engine using Rerun.io
//!
//! This module provides a `RenderHost` implementation that streams the scene
//! to a Rerun viewer instead of a map renderer:
//! - Route tubes as 3D meshes
//! - Station/vehicle instance pools as colored point batches
//! - Camera poses as a live text log
//!
//! Useful for watching engine behavior without a browser host in the loop.
//! Enable with the `visualization` feature flag.

use flyover_host::{
    CameraPose, FrameScheduler, HostError, InstanceBufferHandle, InstanceRecord, MeshData,
    MeshHandle, RenderHost,
};
use rerun::{RecordingStream, RecordingStreamBuilder};
use std::collections::HashMap;

/// Rerun-based render host for the overlay engine.
pub struct RerunHost {
    rec: RecordingStream,
    next_handle: u64,
    meshes: HashMap<u64, ()>,
    buffers: HashMap<u64, BufferState>,
    frame_pending: bool,
}

struct BufferState {
    capacity: usize,
    records: Vec<InstanceRecord>,
}

impl RerunHost {
    /// Create a host that spawns the Rerun viewer.
    pub fn new(app_id: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let rec = RecordingStreamBuilder::new(app_id).spawn()?;
        Self::with_stream(rec)
    }

    /// Create a host that saves the stream to a file (for sharing).
    pub fn new_to_file(app_id: &str, path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let rec = RecordingStreamBuilder::new(app_id).save(path)?;
        Self::with_stream(rec)
    }

    fn with_stream(rec: RecordingStream) -> Result<Self, Box<dyn std::error::Error>> {
        rec.log_static("world", &rerun::ViewCoordinates::RIGHT_HAND_Z_UP())?;

        Ok(Self {
            rec,
            next_handle: 0,
            meshes: HashMap::new(),
            buffers: HashMap::new(),
            frame_pending: false,
        })
    }

    /// Consumes the pending frame request, if one is outstanding.
    ///
    /// Demo loops use this as their run condition: tick while the engine
    /// still wants frames, stop when the loop goes idle.
    pub fn take_frame(&mut self) -> bool {
        let pending = self.frame_pending;
        self.frame_pending = false;
        pending
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn log_buffer(&self, id: u64) -> Result<(), HostError> {
        let Some(buffer) = self.buffers.get(&id) else {
            return Err(HostError::UnknownHandle(id));
        };

        let positions: Vec<[f32; 3]> = buffer.records.iter().map(translation).collect();
        let colors: Vec<[u8; 4]> = buffer
            .records
            .iter()
            .map(|r| color_to_u8(r.color))
            .collect();

        self.rec
            .log(
                format!("world/instances/{id}"),
                &rerun::Points3D::new(positions)
                    .with_colors(colors)
                    .with_radii([4.0]),
            )
            .map_err(|err| HostError::renderer(err.to_string()))
    }
}

impl RenderHost for RerunHost {
    fn create_mesh(&mut self, data: &MeshData) -> Result<MeshHandle, HostError> {
        let id = self.next();

        self.rec
            .log(
                format!("world/route/{id}"),
                &rerun::Mesh3D::new(data.positions.clone())
                    .with_vertex_normals(data.normals.clone())
                    .with_triangle_indices(triangles(&data.indices)),
            )
            .map_err(|err| HostError::renderer(err.to_string()))?;

        self.meshes.insert(id, ());
        Ok(MeshHandle(id))
    }

    fn dispose_mesh(&mut self, handle: MeshHandle) -> Result<(), HostError> {
        self.meshes
            .remove(&handle.0)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        self.rec
            .log(format!("world/route/{}", handle.0), &rerun::Clear::flat())
            .map_err(|err| HostError::renderer(err.to_string()))
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
        self.log_buffer(handle.0)
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
        self.log_buffer(handle.0)
    }

    fn dispose_instance_buffer(&mut self, handle: InstanceBufferHandle) -> Result<(), HostError> {
        self.buffers
            .remove(&handle.0)
            .ok_or(HostError::UnknownHandle(handle.0))?;
        self.rec
            .log(
                format!("world/instances/{}", handle.0),
                &rerun::Clear::flat(),
            )
            .map_err(|err| HostError::renderer(err.to_string()))
    }

    fn camera_ready(&self) -> bool {
        true
    }

    fn apply_camera(&mut self, pose: &CameraPose) -> Result<(), HostError> {
        self.rec
            .log(
                "world/camera",
                &rerun::TextLog::new(format!(
                    "center=({:.5}, {:.5}) zoom={:.2} tilt={:.1} heading={:.1}",
                    pose.lat, pose.lng, pose.zoom, pose.tilt, pose.heading
                )),
            )
            .map_err(|err| HostError::renderer(err.to_string()))
    }

    fn request_redraw(&mut self) {
        // The stream is live; every log call is already visible.
    }
}

impl FrameScheduler for RerunHost {
    fn schedule_frame(&mut self) {
        self.frame_pending = true;
    }

    fn cancel_frame(&mut self) {
        self.frame_pending = false;
    }
}

/// Translation components of a column-major instance transform.
fn translation(record: &InstanceRecord) -> [f32; 3] {
    [
        record.transform[12],
        record.transform[13],
        record.transform[14],
    ]
}

/// Linear [0, 1] RGB to 8-bit RGBA.
fn color_to_u8(color: [f32; 3]) -> [u8; 4] {
    [
        (color[0].clamp(0.0, 1.0) * 255.0) as u8,
        (color[1].clamp(0.0, 1.0) * 255.0) as u8,
        (color[2].clamp(0.0, 1.0) * 255.0) as u8,
        255,
    ]
}

/// Triangle-list indices chunked into Rerun's per-triangle form.
fn triangles(indices: &[u32]) -> Vec<[u32; 3]> {
    indices
        .chunks_exact(3)
        .map(|t| [t[0], t[1], t[2]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_to_u8_saturates() {
        assert_eq!(color_to_u8([0.0, 0.5, 1.0]), [0, 127, 255, 255]);
        assert_eq!(color_to_u8([-1.0, 2.0, 0.0]), [0, 255, 0, 255]);
    }

    #[test]
    fn test_triangle_chunking_drops_partial() {
        assert_eq!(triangles(&[0, 1, 2, 2, 1, 3]), vec![[0, 1, 2], [2, 1, 3]]);
        assert_eq!(triangles(&[0, 1]), Vec::<[u32; 3]>::new());
    }

    #[test]
    fn test_translation_reads_column_major_offsets() {
        let mut transform = [0.0_f32; 16];
        transform[12] = 10.0;
        transform[13] = 20.0;
        transform[14] = 30.0;
        let record = InstanceRecord::new(transform, [1.0, 1.0, 1.0]);
        assert_eq!(translation(&record), [10.0, 20.0, 30.0]);
    }
}
