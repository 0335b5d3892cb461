//! The "TUBE" Engine - Route Geometry Construction
//!
//! Builds the tube-shaped mesh that visualizes a route on the map surface:
//! - Piecewise-linear path sampling (no spline fitting - predictable and cheap)
//! - Parallel-transport frames along the path (no torsion flips at bends)
//! - Longitudinal resolution proportional to route complexity
//!
//! Also owns the GPU lifecycle of the uploaded route mesh: a rebuild disposes
//! the previous buffers before creating the new ones, which is the single
//! most common leak point when routes change every few seconds.

use flyover_host::{HostError, MeshData, MeshHandle, RenderHost};
use nalgebra::{Rotation3, Vector3};
use tracing::debug;

/// Floor for the number of longitudinal segments of a tube.
pub const MIN_TUBULAR_SEGMENTS: usize = 30;

/// Longitudinal segment count for a path with `point_count` distinct points.
///
/// Scales with route complexity so long routes stay smooth without paying
/// unbounded cost on short ones.
pub fn tubular_segments(point_count: usize) -> usize {
    (point_count * 2).max(MIN_TUBULAR_SEGMENTS)
}

/// Builds a tube mesh following `points` (local frame, meters).
///
/// Consecutive duplicate and non-finite points are dropped first; fewer than
/// 2 distinct points yields an empty mesh (no error, no geometry). The ring
/// has `radial_segments` vertices (minimum 3) and the tube has open ends.
pub fn build_tube(points: &[Vector3<f64>], radius: f32, radial_segments: u32) -> MeshData {
    let path = sanitize_path(points);
    if path.len() < 2 {
        return MeshData::empty();
    }

    let radial = radial_segments.max(3) as usize;
    let tubular = tubular_segments(path.len());

    // Cumulative arc lengths over the polyline.
    let mut cumulative = Vec::with_capacity(path.len());
    cumulative.push(0.0_f64);
    for pair in path.windows(2) {
        let last = *cumulative.last().unwrap_or(&0.0);
        cumulative.push(last + (pair[1] - pair[0]).norm());
    }
    let total = *cumulative.last().unwrap_or(&0.0);
    if total <= f64::EPSILON {
        return MeshData::empty();
    }

    // Sample stations and tangents at uniform arc-length steps.
    let mut stations = Vec::with_capacity(tubular + 1);
    for i in 0..=tubular {
        let s = total * i as f64 / tubular as f64;
        stations.push(sample_path(&path, &cumulative, s));
    }

    // Parallel-transport a normal along the tangents.
    let mut frames = Vec::with_capacity(stations.len());
    let mut normal = first_normal(stations[0].1);
    let mut prev_tangent = stations[0].1;
    for &(_, tangent) in &stations {
        if let Some(rotation) = Rotation3::rotation_between(&prev_tangent, &tangent) {
            normal = rotation * normal;
        }
        // Re-orthogonalize against drift.
        normal = (normal - tangent * normal.dot(&tangent)).normalize();
        frames.push((tangent, normal, tangent.cross(&normal)));
        prev_tangent = tangent;
    }

    let mut mesh = MeshData {
        positions: Vec::with_capacity(stations.len() * radial),
        normals: Vec::with_capacity(stations.len() * radial),
        indices: Vec::with_capacity(tubular * radial * 6),
    };

    for (station, frame) in stations.iter().zip(&frames) {
        let (center, _) = station;
        let (_, n, b) = frame;
        for j in 0..radial {
            let theta = std::f64::consts::TAU * j as f64 / radial as f64;
            let dir = n * theta.cos() + b * theta.sin();
            let pos = center + dir * radius as f64;
            mesh.positions
                .push([pos.x as f32, pos.y as f32, pos.z as f32]);
            mesh.normals
                .push([dir.x as f32, dir.y as f32, dir.z as f32]);
        }
    }

    for ring in 0..tubular {
        for j in 0..radial {
            let j1 = (j + 1) % radial;
            let a = (ring * radial + j) as u32;
            let b = ((ring + 1) * radial + j) as u32;
            let c = ((ring + 1) * radial + j1) as u32;
            let d = (ring * radial + j1) as u32;
            mesh.indices.extend_from_slice(&[a, b, d]);
            mesh.indices.extend_from_slice(&[b, c, d]);
        }
    }

    mesh
}

/// Drops non-finite points and collapses consecutive duplicates.
fn sanitize_path(points: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    let mut path: Vec<Vector3<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            continue;
        }
        if let Some(last) = path.last() {
            if (p - last).norm() <= f64::EPSILON {
                continue;
            }
        }
        path.push(*p);
    }
    path
}

/// Position and unit tangent at arc length `s` along the polyline.
fn sample_path(
    path: &[Vector3<f64>],
    cumulative: &[f64],
    s: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    // Last segment catches s == total.
    let mut seg = path.len() - 2;
    for i in 0..path.len() - 1 {
        if s <= cumulative[i + 1] {
            seg = i;
            break;
        }
    }

    let seg_len = cumulative[seg + 1] - cumulative[seg];
    let t = if seg_len > 0.0 {
        (s - cumulative[seg]) / seg_len
    } else {
        0.0
    };
    let dir = (path[seg + 1] - path[seg]).normalize();
    (path[seg] + (path[seg + 1] - path[seg]) * t, dir)
}

/// A stable normal perpendicular to the first tangent.
fn first_normal(tangent: Vector3<f64>) -> Vector3<f64> {
    let reference = if tangent.z.abs() < 0.9 {
        Vector3::z()
    } else {
        Vector3::x()
    };
    reference.cross(&tangent).normalize()
}

/// Owner of the route tube currently uploaded to the host.
///
/// At most one route mesh is live; `rebuild` replaces it wholesale whenever
/// the external route changes.
#[derive(Debug, Default)]
pub struct RouteMesh {
    handle: Option<MeshHandle>,
}

impl RouteMesh {
    /// Creates an owner with no live mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the live mesh, if a route is currently drawn.
    #[inline]
    pub fn handle(&self) -> Option<MeshHandle> {
        self.handle
    }

    /// Replaces the route geometry.
    ///
    /// The previous mesh's buffers are disposed before the new upload. A
    /// degenerate path leaves no mesh live.
    pub fn rebuild<H: RenderHost>(
        &mut self,
        host: &mut H,
        points: &[Vector3<f64>],
        radius: f32,
        radial_segments: u32,
    ) -> Result<(), HostError> {
        self.dispose(host);

        let mesh = build_tube(points, radius, radial_segments);
        if mesh.is_empty() {
            return Ok(());
        }
        self.handle = Some(host.create_mesh(&mesh)?);
        Ok(())
    }

    /// Disposes the live mesh, if any. Idempotent; disposal failures are
    /// swallowed because teardown races with host unmount are expected.
    pub fn dispose<H: RenderHost>(&mut self, host: &mut H) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = host.dispose_mesh(handle) {
                debug!("route mesh dispose failed ({handle}): {err}");
            }
        }
    }
}
