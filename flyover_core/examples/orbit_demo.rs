//! Orbit pattern demo - selects a departure station and streams the
//! resulting orbit session to a Rerun viewer.
//!
//! Run with: cargo run --example orbit_demo --features visualization

use flyover_core::flyover_geo::destination;
use flyover_core::overlay_runtime::{OverlayConfig, OverlayEngine, OverlaySnapshot};
use flyover_core::visualization::RerunHost;
use flyover_core::{CameraState, GeoPoint, StationRole, StationSnapshot};
use flyover_host::SystemContext;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = RerunHost::new("flyover_orbit_demo")?;
    let anchor = GeoPoint::at_surface(22.3, 114.2);

    // A ring of stations around the anchor, the northern one selected.
    let stations: Vec<StationSnapshot> = (0..6)
        .map(|i| StationSnapshot {
            id: i as u64 + 1,
            position: destination(anchor, i as f64 * 60.0, 400.0),
            role: if i == 0 {
                StationRole::Departure
            } else {
                StationRole::Neutral
            },
        })
        .collect();

    let mut engine = OverlayEngine::new(
        SystemContext::shared(),
        host,
        anchor,
        CameraState::new(anchor, 16.0, 0.0, 0.0),
        OverlayConfig::default(),
    );

    engine.update(&OverlaySnapshot {
        stations,
        booking_step: 1,
        departure_id: Some(1),
        ..Default::default()
    });

    // Tick while the engine wants frames; the loop goes idle once the orbit
    // completes.
    while engine.host_mut().take_frame() {
        std::thread::sleep(Duration::from_millis(33));
        engine.tick();
    }

    println!("orbit finished: {}", engine.metrics().summary());
    engine.shutdown();
    Ok(())
}
