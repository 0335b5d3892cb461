//! Overlay Runtime - Orchestrates the engines against a host.
//!
//! This module provides the integration layer between the pure engines
//! (projection, tube, instance, color, camera, frame) and the host
//! abstraction (`HostContext`, `RenderHost`, `FrameScheduler`).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      OverlayEngine                          │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Context: HostContext                    │   │
//! │  │  • now() → progress for both animators               │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              │                              │
//! │  ┌──────────┐ ┌──────┐ ┌──────────┐ ┌───────┐ ┌────────┐   │
//! │  │PROJECTION│ │ TUBE │ │ INSTANCE │ │ COLOR │ │ CAMERA │   │
//! │  │  Engine  │ │Engine│ │  Engine  │ │Engine │ │ Engine │   │
//! │  └──────────┘ └──────┘ └──────────┘ └───────┘ └────────┘   │
//! │                              │                              │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │       Host: RenderHost + FrameScheduler              │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The host application holds no engine internals: it submits
//! `OverlaySnapshot`s whenever external state changes (stations, vehicles,
//! route, booking step) and calls `tick()` once per granted frame. Which
//! camera pattern a booking step triggers is configuration, not code.
//!
//! # Usage
//!
//! ```ignore
//! use flyover_core::overlay_runtime::{OverlayEngine, OverlayConfig};
//! use flyover_host::SystemContext;
//!
//! let ctx = SystemContext::shared();
//! let mut engine = OverlayEngine::new(ctx, host, anchor, camera, OverlayConfig::default());
//!
//! engine.update(&snapshot);   // on every external state change
//! engine.tick();              // on every granted frame
//! ```

use crate::flyover_camera::{
    self, CameraAnimator, CameraState, CompletionCallback, EasingKind, Keyframe,
};
use crate::flyover_color::{ColorAnimator, OverlayPalette};
use crate::flyover_frame::{FrameLoop, FrameMode};
use crate::flyover_geo::{initial_bearing, midpoint, GeoPoint, Projector};
use crate::flyover_instance::{InstanceRegistry, StationSnapshot, VehicleSnapshot};
use crate::flyover_tube::RouteMesh;
use crate::metrics::EngineMetrics;

use flyover_host::{CameraPose, FrameScheduler, HostContext, RenderHost};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// A camera pattern bound to one booking step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepPattern {
    /// Booking step that triggers the pattern
    pub step: u32,

    /// Pattern to play when the step is entered
    pub pattern: CameraPattern,
}

/// Camera patterns the runtime can generate from a snapshot.
///
/// Each variant names the data it needs; an entry whose data is missing from
/// the snapshot is a logged no-op, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CameraPattern {
    /// Leave the camera where it is
    Hold,

    /// Orbit the selected departure station
    OrbitDeparture {
        radius_m: f64,
        tilt: f64,
        zoom: f64,
        cycles: f64,
        duration_ms: u64,
    },

    /// Fly to the midpoint between the departure and arrival stations
    FlyToRoute {
        final_zoom: f64,
        final_tilt: f64,
        final_heading: f64,
        duration_ms: u64,
    },

    /// Sweep the camera along the route waypoints
    PathAlongRoute {
        zoom: f64,
        tilt: f64,
        duration_ms: u64,
    },
}

/// Configuration for an overlay engine session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Base colors per rendered role
    pub palette: OverlayPalette,

    /// Length of a role-change color transition, milliseconds
    pub transition_ms: u64,

    /// Route tube radius, meters
    pub tube_radius: f32,

    /// Route tube ring resolution
    pub tube_radial_segments: u32,

    /// Station marker scale, meters
    pub station_scale: f32,

    /// Vehicle marker scale, meters
    pub vehicle_scale: f32,

    /// Booking step → camera pattern mapping
    pub step_patterns: Vec<StepPattern>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            palette: OverlayPalette::default(),
            transition_ms: 450,
            tube_radius: 8.0,
            tube_radial_segments: 6,
            station_scale: 20.0,
            vehicle_scale: 12.0,
            step_patterns: vec![
                StepPattern {
                    step: 1,
                    pattern: CameraPattern::OrbitDeparture {
                        radius_m: 150.0,
                        tilt: 55.0,
                        zoom: 17.0,
                        cycles: 1.0,
                        duration_ms: 8000,
                    },
                },
                StepPattern {
                    step: 2,
                    pattern: CameraPattern::FlyToRoute {
                        final_zoom: 15.0,
                        final_tilt: 45.0,
                        final_heading: 0.0,
                        duration_ms: 2500,
                    },
                },
            ],
        }
    }
}

/// Errors from loading an `OverlayConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document did not parse into a config
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl OverlayConfig {
    /// Loads a config from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// SNAPSHOT (Input)
// ============================================================================

/// Read-only snapshot of the external state the engine renders.
///
/// The host application submits a fresh snapshot whenever anything changed;
/// the engine reads it synchronously and keeps nothing but what it uploads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlaySnapshot {
    /// Stations with their current roles
    pub stations: Vec<StationSnapshot>,

    /// Vehicles with their latest positions
    pub vehicles: Vec<VehicleSnapshot>,

    /// Route waypoints, possibly empty, replaced wholesale on change
    pub route: Vec<GeoPoint>,

    /// Booking step driving the camera pattern selection
    pub booking_step: u32,

    /// Selected departure station, if any
    pub departure_id: Option<u64>,

    /// Selected arrival station, if any
    pub arrival_id: Option<u64>,
}

// ============================================================================
// ENGINE
// ============================================================================

/// The overlay engine: one instance per map session.
///
/// Owns every GPU-side resource it creates and disposes them all on
/// `shutdown()`. Single-threaded by construction - all mutation happens
/// inside `update()` and `tick()`.
pub struct OverlayEngine<Ctx, H>
where
    Ctx: HostContext,
    H: RenderHost + FrameScheduler,
{
    /// Clock shared with the host
    context: Arc<Ctx>,

    /// The driven host renderer
    host: H,

    /// Session configuration
    config: OverlayConfig,

    /// Anchored geographic projector
    projector: Projector,

    /// Instance pools for stations and vehicles
    registry: InstanceRegistry,

    /// Route tube currently uploaded
    route_mesh: RouteMesh,

    /// Waypoints behind the current route mesh
    route_cache: Vec<GeoPoint>,

    /// Per-entity color transitions
    colors: ColorAnimator,

    /// Camera animation sessions
    camera: CameraAnimator,

    /// Frame-callback bookkeeping
    frames: FrameLoop,

    /// Session counters
    metrics: EngineMetrics,

    /// Booking step as of the previous update
    last_step: Option<u32>,

    /// Set once `shutdown()` ran
    disposed: bool,
}

impl<Ctx, H> OverlayEngine<Ctx, H>
where
    Ctx: HostContext,
    H: RenderHost + FrameScheduler,
{
    /// Creates an engine anchored at `anchor` with the camera at
    /// `initial_camera`.
    pub fn new(
        context: Arc<Ctx>,
        host: H,
        anchor: GeoPoint,
        initial_camera: CameraState,
        config: OverlayConfig,
    ) -> Self {
        Self {
            context,
            host,
            config,
            projector: Projector::new(anchor),
            registry: InstanceRegistry::new(),
            route_mesh: RouteMesh::new(),
            route_cache: Vec::new(),
            colors: ColorAnimator::new(),
            camera: CameraAnimator::new(initial_camera),
            frames: FrameLoop::new(),
            metrics: EngineMetrics::default(),
            last_step: None,
            disposed: false,
        }
    }

    /// Ingests a fresh snapshot of the external state.
    ///
    /// Rebuilds whatever changed (instances always, the route tube when the
    /// waypoint list differs, the camera session when the booking step
    /// moved) and makes sure a frame is scheduled to animate the result.
    pub fn update(&mut self, snapshot: &OverlaySnapshot) {
        if self.disposed {
            debug!("update after shutdown ignored");
            return;
        }
        let now = self.context.now();

        match self.registry.rebuild(
            &mut self.host,
            &snapshot.stations,
            &snapshot.vehicles,
            &self.projector,
            &self.config.palette,
            self.config.station_scale,
            self.config.vehicle_scale,
        ) {
            Ok(changes) => {
                self.metrics.instance_rebuilds += 1;
                self.metrics.redraw_requests += 1;
                let duration = Duration::from_millis(self.config.transition_ms);
                for change in changes {
                    self.colors.start(
                        change.entity_id,
                        self.config.palette.color_for(change.from),
                        self.config.palette.color_for(change.to),
                        duration,
                        now,
                    );
                    self.metrics.color_transitions += 1;
                }
            }
            Err(err) => warn!("instance rebuild failed: {err}"),
        }

        if snapshot.route != self.route_cache {
            let locals: Vec<_> = snapshot
                .route
                .iter()
                .filter_map(|wp| self.projector.to_local(*wp))
                .collect();
            match self.route_mesh.rebuild(
                &mut self.host,
                &locals,
                self.config.tube_radius,
                self.config.tube_radial_segments,
            ) {
                Ok(()) => {
                    self.metrics.route_rebuilds += 1;
                    self.host.request_redraw();
                    self.metrics.redraw_requests += 1;
                }
                Err(err) => warn!("route rebuild failed: {err}"),
            }
            self.route_cache = snapshot.route.clone();
        }

        if self.last_step != Some(snapshot.booking_step) {
            self.apply_step_pattern(snapshot, now);
            self.last_step = Some(snapshot.booking_step);
        }

        self.frames.request(&mut self.host);
    }

    /// Advances both animators one frame and decides whether the loop keeps
    /// running. Called by the host once per granted frame.
    pub fn tick(&mut self) {
        if self.disposed {
            return;
        }
        let now = self.context.now();
        self.frames.begin_frame();
        self.metrics.frames += 1;

        let colors_were_active = self.colors.is_active();
        let colors_active = self.colors.tick(now, &mut self.registry, &mut self.host);

        let camera_was_animating = self.camera.is_animating();
        let camera_active = self.camera.tick(now);

        if camera_was_animating {
            let pose = camera_pose(&self.camera.state());
            if self.host.camera_ready() {
                if let Err(err) = self.host.apply_camera(&pose) {
                    debug!("camera apply failed: {err}");
                }
            } else {
                debug!("camera pose dropped: host camera unavailable");
            }
        }

        if colors_were_active || camera_was_animating {
            self.host.request_redraw();
            self.metrics.redraw_requests += 1;
        }

        self.frames
            .end_frame(colors_active || camera_active, &mut self.host);
    }

    /// Starts a single camera move. Dropped (logged at debug) while the host
    /// camera is unavailable.
    pub fn animate_to(
        &mut self,
        target: CameraState,
        duration: Duration,
        easing: EasingKind,
        on_complete: Option<CompletionCallback>,
    ) {
        if self.disposed {
            return;
        }
        if !self.host.camera_ready() {
            debug!("animate_to dropped: host camera unavailable");
            return;
        }
        let now = self.context.now();
        self.camera
            .animate_to(target, duration, easing, now, on_complete);
        self.metrics.camera_sessions += 1;
        self.frames.request(&mut self.host);
    }

    /// Starts a keyframe sequence. Dropped (logged at debug) while the host
    /// camera is unavailable.
    pub fn animate_sequence(
        &mut self,
        keyframes: Vec<Keyframe>,
        on_complete: Option<CompletionCallback>,
    ) {
        if self.disposed {
            return;
        }
        if !self.host.camera_ready() {
            debug!("animate_sequence dropped: host camera unavailable");
            return;
        }
        let now = self.context.now();
        self.camera.animate_sequence(keyframes, now, on_complete);
        self.metrics.camera_sessions += 1;
        self.frames.request(&mut self.host);
    }

    /// Switches between on-demand and continuous frame scheduling.
    pub fn set_interactive(&mut self, interactive: bool) {
        if self.disposed {
            return;
        }
        let mode = if interactive {
            FrameMode::Continuous
        } else {
            FrameMode::OnDemand
        };
        self.frames.set_mode(mode, &mut self.host);
    }

    /// Tears the session down: cancels the pending frame, disposes every
    /// GPU resource, clears both animators. Idempotent, and disposal
    /// failures are swallowed - cleanup racing host unmount is expected.
    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }
        self.frames.cancel(&mut self.host);
        self.registry.dispose(&mut self.host);
        self.route_mesh.dispose(&mut self.host);
        self.colors.clear();
        self.camera.cancel();
        self.disposed = true;
    }

    /// The camera state as of the last tick, for UI that reflects it.
    pub fn camera_state(&self) -> CameraState {
        self.camera.state()
    }

    /// Session counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// The instance pools (read-only).
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// The route mesh owner (read-only).
    pub fn route_mesh(&self) -> &RouteMesh {
        &self.route_mesh
    }

    /// Read access to the driven host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the driven host (simulation steering).
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// True once `shutdown()` ran.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn apply_step_pattern(&mut self, snapshot: &OverlaySnapshot, now: Duration) {
        let Some(pattern) = self
            .config
            .step_patterns
            .iter()
            .find(|p| p.step == snapshot.booking_step)
            .map(|p| p.pattern)
        else {
            return;
        };

        match pattern {
            CameraPattern::Hold => {}

            CameraPattern::OrbitDeparture {
                radius_m,
                tilt,
                zoom,
                cycles,
                duration_ms,
            } => {
                let Some(center) = station_position(snapshot, snapshot.departure_id) else {
                    debug!("orbit pattern skipped: no usable departure station");
                    return;
                };
                let frames = flyover_camera::orbit(
                    center,
                    radius_m,
                    tilt,
                    zoom,
                    cycles,
                    Duration::from_millis(duration_ms),
                );
                self.start_camera_session(frames, now);
            }

            CameraPattern::FlyToRoute {
                final_zoom,
                final_tilt,
                final_heading,
                duration_ms,
            } => {
                let (Some(dep), Some(arr)) = (
                    station_position(snapshot, snapshot.departure_id),
                    station_position(snapshot, snapshot.arrival_id),
                ) else {
                    debug!("fly-to pattern skipped: route endpoints not selected");
                    return;
                };
                let frames = flyover_camera::fly_to(
                    self.camera.state(),
                    midpoint(dep, arr),
                    final_zoom,
                    final_tilt,
                    final_heading,
                    Duration::from_millis(duration_ms),
                );
                self.start_camera_session(frames, now);
            }

            CameraPattern::PathAlongRoute {
                zoom,
                tilt,
                duration_ms,
            } => {
                let route: Vec<GeoPoint> = snapshot
                    .route
                    .iter()
                    .copied()
                    .filter(GeoPoint::is_valid)
                    .collect();
                if route.len() < 2 {
                    debug!("path pattern skipped: route too short");
                    return;
                }
                let mut points = Vec::with_capacity(route.len());
                let mut heading = initial_bearing(route[0], route[1]);
                for (i, waypoint) in route.iter().enumerate() {
                    if i + 1 < route.len() {
                        heading = initial_bearing(*waypoint, route[i + 1]);
                    }
                    points.push(CameraState::new(*waypoint, zoom, tilt, heading));
                }
                let frames =
                    flyover_camera::custom_path(&points, Duration::from_millis(duration_ms));
                self.start_camera_session(frames, now);
            }
        }
    }

    fn start_camera_session(&mut self, frames: Vec<Keyframe>, now: Duration) {
        if !self.host.camera_ready() {
            debug!("camera session dropped: host camera unavailable");
            return;
        }
        self.camera.animate_sequence(frames, now, None);
        self.metrics.camera_sessions += 1;
    }
}

/// Station position for a selected id, if the station exists and its
/// coordinates are usable.
fn station_position(snapshot: &OverlaySnapshot, id: Option<u64>) -> Option<GeoPoint> {
    let id = id?;
    snapshot
        .stations
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.position)
        .filter(GeoPoint::is_valid)
}

/// The host-boundary form of a camera state.
fn camera_pose(state: &CameraState) -> CameraPose {
    CameraPose {
        lat: state.center.lat,
        lng: state.center.lng,
        altitude: state.center.altitude,
        zoom: state.zoom,
        tilt: state.tilt,
        heading: state.heading,
    }
}
