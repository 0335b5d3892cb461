//! Invariant oracle for simulation runs.
//!
//! The oracle watches the engine from outside and records every invariant
//! violation it sees:
//! - Camera fields always in range (zoom, tilt, heading, latitude)
//! - Instance pools partition the rendered entities (no double rendering,
//!   at most one departure and one arrival, counts within capacity)
//! - Route geometry stays near the anchor (projection sanity)
//! - Zero live host resources after teardown

use crate::context::SimContext;
use crate::host::MockRenderHost;
use flyover_core::flyover_camera::{TILT_MAX, ZOOM_MAX, ZOOM_MIN};
use flyover_core::flyover_instance::PoolKind;
use flyover_core::overlay_runtime::{OverlayEngine, OverlaySnapshot};
use nalgebra::Vector3;
use std::collections::HashSet;

/// The engine type every scenario runs against.
pub type SimEngine = OverlayEngine<SimContext, MockRenderHost>;

/// Outcome of a scenario run.
#[derive(Debug, Clone)]
pub struct OracleReport {
    /// Every violation observed, in discovery order
    pub violations: Vec<String>,
}

impl OracleReport {
    /// True when no invariant was violated.
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Accumulates invariant violations over a run.
#[derive(Debug, Default)]
pub struct Oracle {
    violations: Vec<String>,
}

/// Cap so a broken invariant inside a long run doesn't flood the report.
const MAX_VIOLATIONS: usize = 32;

impl Oracle {
    /// Creates an oracle with a clean slate.
    pub fn new() -> Self {
        Self::default()
    }

    fn violation(&mut self, message: String) {
        if self.violations.len() < MAX_VIOLATIONS {
            self.violations.push(message);
        }
    }

    /// Checks the pool partition right after a snapshot was ingested.
    pub fn observe_snapshot(&mut self, engine: &SimEngine, snapshot: &OverlaySnapshot) {
        let registry = engine.registry();

        let renderable_stations = snapshot
            .stations
            .iter()
            .filter(|s| s.position.is_valid())
            .count();
        let station_total = [
            PoolKind::NeutralStation,
            PoolKind::DepartureStation,
            PoolKind::ArrivalStation,
        ]
        .iter()
        .map(|kind| registry.pool(*kind).count())
        .sum::<usize>();

        if station_total != renderable_stations {
            self.violation(format!(
                "station pools hold {station_total} instances for {renderable_stations} renderable stations"
            ));
        }

        for kind in [PoolKind::DepartureStation, PoolKind::ArrivalStation] {
            let count = registry.pool(kind).count();
            if count > 1 {
                self.violation(format!("{kind:?} holds {count} instances (max 1)"));
            }
        }

        let mut seen = HashSet::new();
        for kind in PoolKind::ALL {
            let pool = registry.pool(kind);
            if pool.count() > pool.capacity() {
                self.violation(format!(
                    "{kind:?} count {} exceeds capacity {}",
                    pool.count(),
                    pool.capacity()
                ));
            }
            for id in pool.entity_ids() {
                if !seen.insert(*id) {
                    self.violation(format!("entity {id} rendered in two pools"));
                }
            }
        }
    }

    /// Checks per-frame invariants after a tick.
    pub fn observe_frame(&mut self, engine: &SimEngine) {
        let camera = engine.camera_state();

        if !(ZOOM_MIN..=ZOOM_MAX).contains(&camera.zoom) {
            self.violation(format!("zoom {} out of range", camera.zoom));
        }
        if !(0.0..=TILT_MAX).contains(&camera.tilt) {
            self.violation(format!("tilt {} out of range", camera.tilt));
        }
        if !(0.0..360.0).contains(&camera.heading) {
            self.violation(format!("heading {} out of range", camera.heading));
        }
        if !camera.center.is_valid() {
            self.violation(format!(
                "camera center degenerate: ({}, {})",
                camera.center.lat, camera.center.lng
            ));
        }

        // A live route handle must name a live host mesh whose geometry sits
        // near the anchor.
        if let Some(handle) = engine.route_mesh().handle() {
            match engine.host().meshes.get(&handle.0) {
                None => self.violation(format!("route handle {handle} has no live host mesh")),
                Some(mesh) => {
                    let far = mesh.positions.iter().any(|p| {
                        Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64).norm() > 100_000.0
                    });
                    if far {
                        self.violation("route geometry further than 100km from anchor".into());
                    }
                }
            }
        }
    }

    /// Checks that teardown released everything.
    pub fn observe_teardown(&mut self, engine: &SimEngine) {
        if !engine.is_disposed() {
            self.violation("engine not disposed after shutdown".into());
        }
        let live = engine.host().live_resource_count();
        if live != 0 {
            self.violation(format!("{live} host resources leaked past teardown"));
        }
        if engine.host().frame_pending {
            self.violation("frame callback still scheduled after teardown".into());
        }
    }

    /// Finalizes the report.
    pub fn finish(self) -> OracleReport {
        OracleReport {
            violations: self.violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flyover_core::overlay_runtime::OverlayConfig;
    use flyover_core::CameraState;
    use flyover_host::RenderHost;
    use crate::scenarios::ANCHOR;
    use std::sync::Arc;

    fn engine() -> SimEngine {
        OverlayEngine::new(
            Arc::new(SimContext::new(1)),
            MockRenderHost::new(),
            ANCHOR,
            CameraState::new(ANCHOR, 16.0, 0.0, 0.0),
            OverlayConfig::default(),
        )
    }

    #[test]
    fn test_clean_engine_passes() {
        let engine = engine();
        let mut oracle = Oracle::new();
        oracle.observe_frame(&engine);
        oracle.observe_snapshot(&engine, &OverlaySnapshot::default());
        assert!(oracle.finish().passed());
    }

    #[test]
    fn test_teardown_leak_is_reported() {
        let mut engine = engine();
        // Simulate a leak: a resource appears on the host after shutdown.
        engine.shutdown();
        engine
            .host_mut()
            .create_mesh(&flyover_host::MeshData::empty())
            .unwrap();

        let mut oracle = Oracle::new();
        oracle.observe_teardown(&engine);
        let report = oracle.finish();
        assert!(!report.passed());
        assert!(report.violations[0].contains("leaked"));
    }
}
