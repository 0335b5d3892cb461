//! Common types crossing the engine/host boundary.

use serde::{Deserialize, Serialize};

/// Handle to a mesh uploaded to the host renderer.
///
/// Opaque to the engine; the host assigns the value at creation time and the
/// engine hands it back for disposal. A disposed handle is never reused
/// within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHandle(pub u64);

impl std::fmt::Display for MeshHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Handle to a fixed-capacity instance buffer on the host renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceBufferHandle(pub u64);

impl std::fmt::Display for InstanceBufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ibuf#{}", self.0)
    }
}

/// Triangle mesh buffers in the local scene frame (x east, y north, z up).
///
/// This is a transport-layer type - the engine builds it, the host uploads
/// it. Indices are triples into `positions`/`normals`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    /// Vertex positions, meters from the anchor
    pub positions: Vec<[f32; 3]>,

    /// Per-vertex unit normals, parallel to `positions`
    pub normals: Vec<[f32; 3]>,

    /// Triangle list, counter-clockwise winding
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Returns an empty mesh (the degenerate-input result).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns the number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// True when the mesh carries no geometry at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// One rendered instance inside an instance buffer.
///
/// The transform is a column-major 4x4 matrix in the local scene frame; the
/// color is linear RGB in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Column-major model transform
    pub transform: [f32; 16],

    /// Linear RGB instance tint
    pub color: [f32; 3],
}

impl InstanceRecord {
    /// Creates a record from a column-major transform and a color.
    pub fn new(transform: [f32; 16], color: [f32; 3]) -> Self {
        Self { transform, color }
    }
}

/// Camera pose applied to the host's map camera.
///
/// Geographic center plus the map-camera trio (zoom level, tilt from nadir
/// in degrees, compass heading in degrees). The engine clamps/wraps the
/// fields before every `apply_camera` call; hosts may treat them as valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Center latitude, degrees
    pub lat: f64,

    /// Center longitude, degrees
    pub lng: f64,

    /// Center altitude, meters above the surface
    pub altitude: f64,

    /// Map zoom level
    pub zoom: f64,

    /// Tilt from nadir, degrees in [0, 90]
    pub tilt: f64,

    /// Compass heading, degrees in [0, 360)
    pub heading: f64,
}
