//! Flyover Core - Geospatial 3D Overlay & Camera Animation Engine
//!
//! This library renders geographic entities into a 3D scene anchored to a
//! map surface and drives the map camera, solving three recurring problems:
//! 1. **Floating Origin Problem**: metric local frames via anchored haversine projection
//! 2. **Resource Leak Problem**: explicit GPU buffer ownership with dispose-before-create rebuilds
//! 3. **Fighting Camera Problem**: last-wins interruptible animation sessions

pub mod flyover_geo;
pub mod flyover_tube;
pub mod flyover_instance;
pub mod flyover_color;
pub mod flyover_camera;
pub mod flyover_frame;
pub mod metrics;
pub mod overlay_runtime;

#[cfg(feature = "visualization")]
pub mod visualization;

#[cfg(test)]
pub(crate) mod test_host;

// Re-export key types for convenience
pub use flyover_geo::{GeoPoint, Projector};
pub use flyover_camera::{CameraAnimator, CameraState, EasingKind, Keyframe};
pub use flyover_instance::{InstanceRegistry, StationRole, StationSnapshot, VehicleSnapshot};
pub use overlay_runtime::{OverlayConfig, OverlayEngine, OverlaySnapshot};
