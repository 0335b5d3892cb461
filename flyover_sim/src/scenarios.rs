//! Scripted booking-flow scenarios.
//!
//! Each scenario is a deterministic function of (tick, rng): it either hands
//! the runner a fresh `OverlaySnapshot` to submit this tick or stays quiet.
//! The snapshots mimic what the booking application feeds the engine -
//! station lists with roles, vehicle position streams, route waypoints, and
//! the booking step.

use clap::ValueEnum;
use flyover_core::flyover_geo::destination;
use flyover_core::overlay_runtime::OverlaySnapshot;
use flyover_core::{GeoPoint, StationRole, StationSnapshot, VehicleSnapshot};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Anchor shared by every scenario.
pub const ANCHOR: GeoPoint = GeoPoint {
    lat: 22.3,
    lng: 114.2,
    altitude: 0.0,
};

/// Available scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum ScenarioId {
    /// Stations load, nothing selected
    StationBrowse,

    /// A departure is picked and the camera orbits it
    DepartureOrbit,

    /// Departure + arrival picked, route tube drawn, fly-to plays
    FullRouteFlyover,

    /// Vehicles stream position updates every few frames
    VehicleStream,

    /// The route regenerates repeatedly (rebuild/dispose churn)
    TeardownChurn,
}

impl ScenarioId {
    /// Every scenario, in run order.
    pub fn all() -> [ScenarioId; 5] {
        [
            ScenarioId::StationBrowse,
            ScenarioId::DepartureOrbit,
            ScenarioId::FullRouteFlyover,
            ScenarioId::VehicleStream,
            ScenarioId::TeardownChurn,
        ]
    }

    /// Short name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::StationBrowse => "station_browse",
            ScenarioId::DepartureOrbit => "departure_orbit",
            ScenarioId::FullRouteFlyover => "full_route_flyover",
            ScenarioId::VehicleStream => "vehicle_stream",
            ScenarioId::TeardownChurn => "teardown_churn",
        }
    }
}

/// Eight stations on a ring around the anchor, with optional picks.
fn ring_stations(departure: Option<u64>, arrival: Option<u64>) -> Vec<StationSnapshot> {
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
                position: destination(ANCHOR, i as f64 * 45.0, 500.0),
                role,
            }
        })
        .collect()
}

/// Route from station 1 (due north) to station 5 (due south) through the
/// anchor, with one jittered intermediate waypoint.
fn route_through_anchor(rng: &mut ChaCha8Rng) -> Vec<GeoPoint> {
    let detour = destination(
        ANCHOR,
        rng.gen_range(0.0..360.0),
        rng.gen_range(50.0..200.0),
    );
    vec![
        destination(ANCHOR, 0.0, 500.0),
        detour,
        ANCHOR,
        destination(ANCHOR, 180.0, 500.0),
    ]
}

/// Four vehicles drifting around the anchor.
fn drifting_vehicles(tick: u64, rng: &mut ChaCha8Rng) -> Vec<VehicleSnapshot> {
    (0..4)
        .map(|i| {
            let bearing = (tick as f64 * 3.0 + i as f64 * 90.0 + rng.gen_range(-5.0..5.0))
                .rem_euclid(360.0);
            VehicleSnapshot {
                id: 100 + i as u64,
                position: destination(ANCHOR, bearing, 250.0),
            }
        })
        .collect()
}

/// The snapshot a scenario submits at `tick`, if any.
pub fn snapshot_at(
    scenario: ScenarioId,
    tick: u64,
    rng: &mut ChaCha8Rng,
) -> Option<OverlaySnapshot> {
    match scenario {
        ScenarioId::StationBrowse => (tick == 0).then(|| OverlaySnapshot {
            stations: ring_stations(None, None),
            ..Default::default()
        }),

        ScenarioId::DepartureOrbit => match tick {
            0 => Some(OverlaySnapshot {
                stations: ring_stations(None, None),
                ..Default::default()
            }),
            30 => Some(OverlaySnapshot {
                stations: ring_stations(Some(1), None),
                booking_step: 1,
                departure_id: Some(1),
                ..Default::default()
            }),
            _ => None,
        },

        ScenarioId::FullRouteFlyover => match tick {
            0 => Some(OverlaySnapshot {
                stations: ring_stations(None, None),
                ..Default::default()
            }),
            30 => Some(OverlaySnapshot {
                stations: ring_stations(Some(1), None),
                booking_step: 1,
                departure_id: Some(1),
                ..Default::default()
            }),
            90 => Some(OverlaySnapshot {
                stations: ring_stations(Some(1), Some(5)),
                route: route_through_anchor(rng),
                booking_step: 2,
                departure_id: Some(1),
                arrival_id: Some(5),
                ..Default::default()
            }),
            _ => None,
        },

        ScenarioId::VehicleStream => (tick % 10 == 0).then(|| OverlaySnapshot {
            stations: ring_stations(None, None),
            vehicles: drifting_vehicles(tick, rng),
            ..Default::default()
        }),

        ScenarioId::TeardownChurn => (tick % 40 == 0).then(|| OverlaySnapshot {
            stations: ring_stations(Some(1), Some(5)),
            route: route_through_anchor(rng),
            booking_step: 2,
            departure_id: Some(1),
            arrival_id: Some(5),
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_ring_has_unique_positions_and_roles() {
        let stations = ring_stations(Some(1), Some(5));
        assert_eq!(stations.len(), 8);

        let departures = stations
            .iter()
            .filter(|s| s.role == StationRole::Departure)
            .count();
        let arrivals = stations
            .iter()
            .filter(|s| s.role == StationRole::Arrival)
            .count();
        assert_eq!(departures, 1);
        assert_eq!(arrivals, 1);
    }

    #[test]
    fn test_scripts_are_deterministic_per_seed() {
        let mut rng_a = ChaCha8Rng::seed_from_u64(9);
        let mut rng_b = ChaCha8Rng::seed_from_u64(9);

        for tick in 0..200 {
            let a = snapshot_at(ScenarioId::TeardownChurn, tick, &mut rng_a);
            let b = snapshot_at(ScenarioId::TeardownChurn, tick, &mut rng_b);
            assert_eq!(a.map(|s| s.route), b.map(|s| s.route));
        }
    }

    #[test]
    fn test_quiet_ticks_produce_no_snapshot() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(snapshot_at(ScenarioId::StationBrowse, 5, &mut rng).is_none());
        assert!(snapshot_at(ScenarioId::DepartureOrbit, 29, &mut rng).is_none());
    }
}
