//! Full booking flow demo - station browse, departure orbit, then a fly-to
//! over the route tube, streamed to a Rerun viewer.
//!
//! Run with: cargo run --example booking_flow_demo --features visualization

use flyover_core::flyover_geo::destination;
use flyover_core::overlay_runtime::{OverlayConfig, OverlayEngine, OverlaySnapshot};
use flyover_core::visualization::RerunHost;
use flyover_core::{CameraState, GeoPoint, StationRole, StationSnapshot, VehicleSnapshot};
use flyover_host::SystemContext;
use std::time::Duration;

fn stations(departure: Option<u64>, arrival: Option<u64>) -> Vec<StationSnapshot> {
    let anchor = GeoPoint::at_surface(22.3, 114.2);
    (0..8)
        .map(|i| {
            let id = i as u64 + 1;
            let role = if Some(id) == departure {
                StationRole::Departure
            } else if Some(id) == arrival {
                StationRole::Arrival
            } else {
                StationRole::Neutral
            };
            StationSnapshot {
                id,
                position: destination(anchor, i as f64 * 45.0, 500.0),
                role,
            }
        })
        .collect()
}

fn vehicles(tick: u64) -> Vec<VehicleSnapshot> {
    let anchor = GeoPoint::at_surface(22.3, 114.2);
    (0..4)
        .map(|i| VehicleSnapshot {
            id: 100 + i as u64,
            position: destination(
                anchor,
                (tick as f64 * 2.0 + i as f64 * 90.0).rem_euclid(360.0),
                250.0,
            ),
        })
        .collect()
}

fn run_stage(
    engine: &mut OverlayEngine<SystemContext, RerunHost>,
    snapshot: &OverlaySnapshot,
) {
    engine.update(snapshot);
    while engine.host_mut().take_frame() {
        std::thread::sleep(Duration::from_millis(33));
        engine.tick();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = RerunHost::new("flyover_booking_flow_demo")?;
    let anchor = GeoPoint::at_surface(22.3, 114.2);

    let mut engine = OverlayEngine::new(
        SystemContext::shared(),
        host,
        anchor,
        CameraState::new(anchor, 16.0, 0.0, 0.0),
        OverlayConfig::default(),
    );

    // Stage 0: browsing, everything neutral.
    run_stage(
        &mut engine,
        &OverlaySnapshot {
            stations: stations(None, None),
            vehicles: vehicles(0),
            ..Default::default()
        },
    );

    // Stage 1: departure picked, the camera orbits it.
    run_stage(
        &mut engine,
        &OverlaySnapshot {
            stations: stations(Some(1), None),
            vehicles: vehicles(1),
            booking_step: 1,
            departure_id: Some(1),
            ..Default::default()
        },
    );

    // Stage 2: arrival picked, route tube appears, camera flies the route.
    let departure = destination(anchor, 0.0, 500.0);
    let arrival = destination(anchor, 180.0, 500.0);
    let route = vec![
        departure,
        destination(anchor, 60.0, 200.0),
        GeoPoint::at_surface(22.3, 114.2),
        arrival,
    ];
    run_stage(
        &mut engine,
        &OverlaySnapshot {
            stations: stations(Some(1), Some(5)),
            vehicles: vehicles(2),
            route,
            booking_step: 2,
            departure_id: Some(1),
            arrival_id: Some(5),
            ..Default::default()
        },
    );

    println!("booking flow finished: {}", engine.metrics().summary());
    engine.shutdown();
    Ok(())
}
