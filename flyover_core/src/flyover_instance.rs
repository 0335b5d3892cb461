//! The "INSTANCE" Engine - Role-Partitioned Instance Pools
//!
//! Owns the instanced render objects for every entity set on the map:
//! - Stations split into neutral / departure / arrival pools
//! - Vehicles as a separate pool
//! - Stable entity id -> (pool, slot) lookup for per-instance mutation
//!
//! Membership changes are handled by a full rebuild, not an incremental
//! diff: entities are re-partitioned by role and written from slot 0, so a
//! slot index is only meaningful until the next rebuild and entity id is the
//! one stable key. Pools hold tens of entities, which is the scalability
//! ceiling this trades against.
//!
//! Buffer capacity is the high-water entity count of the session; buffers
//! are reallocated only when that mark grows, never per rebuild.

use crate::flyover_color::{OverlayPalette, Rgb};
use crate::flyover_geo::{GeoPoint, Projector};
use flyover_host::{HostError, InstanceBufferHandle, InstanceRecord, RenderHost};
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// SNAPSHOT TYPES (Input)
// ============================================================================

/// Selection role of a station. At most one station holds `Departure` and
/// one holds `Arrival` at any time; the booking flow upstream guarantees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationRole {
    Neutral,
    Departure,
    Arrival,
}

/// One station as delivered by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationSnapshot {
    /// Stable station id
    pub id: u64,

    /// Geographic position
    pub position: GeoPoint,

    /// Current selection role
    pub role: StationRole,
}

/// One vehicle as delivered by the host application. Positions refresh on
/// every external update tick; vehicles carry no role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    /// Stable vehicle id
    pub id: u64,

    /// Geographic position
    pub position: GeoPoint,
}

/// A station's role changed between two rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChange {
    /// Station whose role flipped
    pub entity_id: u64,

    /// Role before the rebuild
    pub from: StationRole,

    /// Role after the rebuild
    pub to: StationRole,
}

// ============================================================================
// POOLS
// ============================================================================

/// Identity of an instance pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    NeutralStation,
    DepartureStation,
    ArrivalStation,
    Vehicle,
}

impl PoolKind {
    /// All pools, in rebuild order.
    pub const ALL: [PoolKind; 4] = [
        PoolKind::NeutralStation,
        PoolKind::DepartureStation,
        PoolKind::ArrivalStation,
        PoolKind::Vehicle,
    ];

    /// The pool a station with `role` renders in.
    pub fn for_role(role: StationRole) -> Self {
        match role {
            StationRole::Neutral => PoolKind::NeutralStation,
            StationRole::Departure => PoolKind::DepartureStation,
            StationRole::Arrival => PoolKind::ArrivalStation,
        }
    }

    /// True for the three station pools.
    pub fn is_station(self) -> bool {
        !matches!(self, PoolKind::Vehicle)
    }

    fn index(self) -> usize {
        match self {
            PoolKind::NeutralStation => 0,
            PoolKind::DepartureStation => 1,
            PoolKind::ArrivalStation => 2,
            PoolKind::Vehicle => 3,
        }
    }
}

/// One fixed-capacity batch of instanced render objects.
#[derive(Debug)]
pub struct InstancePool {
    kind: PoolKind,

    /// Allocated slot count on the host; grows with the high-water mark
    capacity: usize,

    /// Host buffer, absent until the first entity appears
    buffer: Option<InstanceBufferHandle>,

    /// Slot index -> entity id, parallel to `records`
    entity_ids: Vec<u64>,

    /// CPU mirror of the uploaded instance data
    records: Vec<InstanceRecord>,
}

impl InstancePool {
    fn new(kind: PoolKind) -> Self {
        Self {
            kind,
            capacity: 0,
            buffer: None,
            entity_ids: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Pool identity.
    #[inline]
    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Live instance count.
    #[inline]
    pub fn count(&self) -> usize {
        self.entity_ids.len()
    }

    /// Allocated slot count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Host buffer handle, if allocated.
    #[inline]
    pub fn buffer(&self) -> Option<InstanceBufferHandle> {
        self.buffer
    }

    /// Entity ids by slot index.
    #[inline]
    pub fn entity_ids(&self) -> &[u64] {
        &self.entity_ids
    }

    fn begin(&mut self) {
        self.entity_ids.clear();
        self.records.clear();
    }

    fn push(&mut self, entity_id: u64, transform: [f32; 16], color: Rgb) {
        self.entity_ids.push(entity_id);
        self.records
            .push(InstanceRecord::new(transform, color.to_array()));
    }

    /// Grows the buffer to the high-water mark if needed, then uploads the
    /// active records.
    fn upload<H: RenderHost>(&mut self, host: &mut H, high_water: usize) -> Result<(), HostError> {
        if high_water > self.capacity {
            if let Some(old) = self.buffer.take() {
                if let Err(err) = host.dispose_instance_buffer(old) {
                    debug!("stale {:?} buffer dispose failed ({old}): {err}", self.kind);
                }
            }
            self.buffer = Some(host.create_instance_buffer(high_water)?);
            self.capacity = high_water;
        }

        if let Some(buffer) = self.buffer {
            host.write_instances(buffer, &self.records)?;
        }
        Ok(())
    }

    fn dispose<H: RenderHost>(&mut self, host: &mut H) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(err) = host.dispose_instance_buffer(buffer) {
                debug!("{:?} buffer dispose failed ({buffer}): {err}", self.kind);
            }
        }
        self.capacity = 0;
        self.entity_ids.clear();
        self.records.clear();
    }
}

// ============================================================================
// REGISTRY (The Engine)
// ============================================================================

/// The engine owning every instance pool.
///
/// External code submits entity snapshots; the registry projects, partitions
/// and uploads them, and reports station role changes so the color animator
/// can react.
#[derive(Debug)]
pub struct InstanceRegistry {
    pools: [InstancePool; 4],

    /// Most stations seen at once this session
    station_high_water: usize,

    /// Most vehicles seen at once this session
    vehicle_high_water: usize,

    /// Station roles as of the previous rebuild
    last_roles: HashMap<u64, StationRole>,
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            pools: PoolKind::ALL.map(InstancePool::new),
            station_high_water: 0,
            vehicle_high_water: 0,
            last_roles: HashMap::new(),
        }
    }

    /// Read access to a pool.
    pub fn pool(&self, kind: PoolKind) -> &InstancePool {
        &self.pools[kind.index()]
    }

    fn pool_mut(&mut self, kind: PoolKind) -> &mut InstancePool {
        &mut self.pools[kind.index()]
    }

    /// Total live instances across all pools.
    pub fn instance_count(&self) -> usize {
        self.pools.iter().map(|p| p.count()).sum()
    }

    /// Rebuilds every pool from the given entity snapshots.
    ///
    /// Entities whose coordinates fail validation are skipped (a malformed
    /// data point must not break the frame). Returns the station role
    /// changes since the previous rebuild, in snapshot order, and asks the
    /// host for a redraw.
    pub fn rebuild<H: RenderHost>(
        &mut self,
        host: &mut H,
        stations: &[StationSnapshot],
        vehicles: &[VehicleSnapshot],
        projector: &Projector,
        palette: &OverlayPalette,
        station_scale: f32,
        vehicle_scale: f32,
    ) -> Result<Vec<RoleChange>, HostError> {
        self.station_high_water = self.station_high_water.max(stations.len());
        self.vehicle_high_water = self.vehicle_high_water.max(vehicles.len());

        let mut changes = Vec::new();
        let mut roles = HashMap::with_capacity(stations.len());
        for station in stations {
            if let Some(&prev) = self.last_roles.get(&station.id) {
                if prev != station.role {
                    changes.push(RoleChange {
                        entity_id: station.id,
                        from: prev,
                        to: station.role,
                    });
                }
            }
            roles.insert(station.id, station.role);
        }
        self.last_roles = roles;

        for pool in &mut self.pools {
            pool.begin();
        }

        for station in stations {
            let Some(local) = projector.to_local(station.position) else {
                debug!("skipping station {} with invalid coordinates", station.id);
                continue;
            };
            self.pool_mut(PoolKind::for_role(station.role)).push(
                station.id,
                marker_transform(local, station_scale),
                palette.color_for(station.role),
            );
        }

        for vehicle in vehicles {
            let Some(local) = projector.to_local(vehicle.position) else {
                debug!("skipping vehicle {} with invalid coordinates", vehicle.id);
                continue;
            };
            self.pool_mut(PoolKind::Vehicle).push(
                vehicle.id,
                marker_transform(local, vehicle_scale),
                palette.vehicle,
            );
        }

        let (station_hw, vehicle_hw) = (self.station_high_water, self.vehicle_high_water);
        for pool in &mut self.pools {
            let high_water = if pool.kind.is_station() {
                station_hw
            } else {
                vehicle_hw
            };
            pool.upload(host, high_water)?;
        }

        host.request_redraw();
        Ok(changes)
    }

    /// Finds the live instance of an entity.
    ///
    /// `None` means the entity is not currently rendered (filtered out or
    /// gone); callers skip it silently. Slot indices are invalidated by the
    /// next rebuild.
    pub fn lookup_slot(&self, entity_id: u64) -> Option<(PoolKind, usize)> {
        for pool in &self.pools {
            if let Some(slot) = pool.entity_ids.iter().position(|id| *id == entity_id) {
                return Some((pool.kind, slot));
            }
        }
        None
    }

    /// Overwrites the rendered color of one entity's instance.
    ///
    /// Returns `Ok(false)` when the entity is not currently rendered.
    pub fn set_instance_color<H: RenderHost>(
        &mut self,
        host: &mut H,
        entity_id: u64,
        color: Rgb,
    ) -> Result<bool, HostError> {
        let Some((kind, slot)) = self.lookup_slot(entity_id) else {
            return Ok(false);
        };
        let pool = self.pool_mut(kind);
        let Some(buffer) = pool.buffer else {
            return Ok(false);
        };
        host.write_instance_color(buffer, slot, color.to_array())?;
        pool.records[slot].color = color.to_array();
        Ok(true)
    }

    /// Disposes every host buffer and forgets all session state. Idempotent;
    /// disposal failures are swallowed because teardown races with host
    /// unmount are expected.
    pub fn dispose<H: RenderHost>(&mut self, host: &mut H) {
        for pool in &mut self.pools {
            pool.dispose(host);
        }
        self.station_high_water = 0;
        self.vehicle_high_water = 0;
        self.last_roles.clear();
    }
}

/// Translation + uniform scale transform for a marker at `local`, column-major.
fn marker_transform(local: Vector3<f64>, scale: f32) -> [f32; 16] {
    let matrix = Matrix4::new_translation(&Vector3::new(
        local.x as f32,
        local.y as f32,
        local.z as f32,
    )) * Matrix4::new_scaling(scale);

    let mut flat = [0.0_f32; 16];
    flat.copy_from_slice(matrix.as_slice());
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_host::LedgerHost;
    use std::collections::HashSet;

    fn station(id: u64, dlat: f64, role: StationRole) -> StationSnapshot {
        StationSnapshot {
            id,
            position: GeoPoint::at_surface(22.3 + dlat, 114.2),
            role,
        }
    }

    fn vehicle(id: u64, dlng: f64) -> VehicleSnapshot {
        VehicleSnapshot {
            id,
            position: GeoPoint::at_surface(22.3, 114.2 + dlng),
        }
    }

    fn fixture() -> (LedgerHost, InstanceRegistry, Projector) {
        (
            LedgerHost::new(),
            InstanceRegistry::new(),
            Projector::new(GeoPoint::at_surface(22.3, 114.2)),
        )
    }

    fn rebuild(
        host: &mut LedgerHost,
        registry: &mut InstanceRegistry,
        projector: &Projector,
        stations: &[StationSnapshot],
        vehicles: &[VehicleSnapshot],
    ) -> Vec<RoleChange> {
        registry
            .rebuild(
                host,
                stations,
                vehicles,
                projector,
                &OverlayPalette::default(),
                1.0,
                1.0,
            )
            .unwrap()
    }

    #[test]
    fn test_partition_by_role() {
        let (mut host, mut registry, projector) = fixture();
        let stations = [
            station(1, 0.001, StationRole::Neutral),
            station(2, 0.002, StationRole::Departure),
            station(3, 0.003, StationRole::Neutral),
            station(4, 0.004, StationRole::Arrival),
            station(5, 0.005, StationRole::Neutral),
            station(6, 0.006, StationRole::Neutral),
        ];
        rebuild(&mut host, &mut registry, &projector, &stations, &[]);

        let neutral = registry.pool(PoolKind::NeutralStation).count();
        let departure = registry.pool(PoolKind::DepartureStation).count();
        let arrival = registry.pool(PoolKind::ArrivalStation).count();
        assert_eq!(departure, 1);
        assert_eq!(arrival, 1);
        assert_eq!(neutral + departure + arrival, stations.len());

        // No entity id appears in two pools.
        let mut seen = HashSet::new();
        for kind in PoolKind::ALL {
            for id in registry.pool(kind).entity_ids() {
                assert!(seen.insert(*id), "entity {id} rendered twice");
            }
        }
    }

    #[test]
    fn test_invalid_coordinates_are_skipped() {
        let (mut host, mut registry, projector) = fixture();
        let stations = [
            station(1, 0.001, StationRole::Neutral),
            StationSnapshot {
                id: 2,
                position: GeoPoint::at_surface(f64::NAN, 114.2),
                role: StationRole::Neutral,
            },
            station(3, 0.003, StationRole::Neutral),
        ];
        rebuild(&mut host, &mut registry, &projector, &stations, &[]);

        assert_eq!(registry.pool(PoolKind::NeutralStation).count(), 2);
        assert!(registry.lookup_slot(2).is_none());
        assert!(registry.lookup_slot(1).is_some());
    }

    #[test]
    fn test_capacity_grows_to_high_water_only() {
        let (mut host, mut registry, projector) = fixture();

        let two: Vec<_> = (1..=2)
            .map(|i| station(i, i as f64 * 0.001, StationRole::Neutral))
            .collect();
        rebuild(&mut host, &mut registry, &projector, &two, &[]);
        let first_buffer = registry.pool(PoolKind::NeutralStation).buffer().unwrap();
        assert_eq!(registry.pool(PoolKind::NeutralStation).capacity(), 2);

        // Growth reallocates and disposes the stale buffer.
        let five: Vec<_> = (1..=5)
            .map(|i| station(i, i as f64 * 0.001, StationRole::Neutral))
            .collect();
        rebuild(&mut host, &mut registry, &projector, &five, &[]);
        let second_buffer = registry.pool(PoolKind::NeutralStation).buffer().unwrap();
        assert_ne!(first_buffer, second_buffer);
        assert_eq!(registry.pool(PoolKind::NeutralStation).capacity(), 5);
        assert!(!host.buffers.contains_key(&first_buffer.0));

        // Shrinking membership keeps the high-water buffer.
        rebuild(&mut host, &mut registry, &projector, &two, &[]);
        assert_eq!(
            registry.pool(PoolKind::NeutralStation).buffer().unwrap(),
            second_buffer
        );
        assert_eq!(registry.pool(PoolKind::NeutralStation).capacity(), 5);
        assert_eq!(registry.pool(PoolKind::NeutralStation).count(), 2);
    }

    #[test]
    fn test_role_changes_are_reported() {
        let (mut host, mut registry, projector) = fixture();

        let before = [
            station(1, 0.001, StationRole::Neutral),
            station(2, 0.002, StationRole::Neutral),
        ];
        let changes = rebuild(&mut host, &mut registry, &projector, &before, &[]);
        assert!(changes.is_empty());

        let after = [
            station(1, 0.001, StationRole::Departure),
            station(2, 0.002, StationRole::Neutral),
        ];
        let changes = rebuild(&mut host, &mut registry, &projector, &after, &[]);
        assert_eq!(
            changes,
            vec![RoleChange {
                entity_id: 1,
                from: StationRole::Neutral,
                to: StationRole::Departure,
            }]
        );

        // A station list replacement forgets old roles: no change reported
        // for an id that re-appears.
        rebuild(&mut host, &mut registry, &projector, &[], &[]);
        let changes = rebuild(&mut host, &mut registry, &projector, &after, &[]);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_vehicles_pool_and_lookup() {
        let (mut host, mut registry, projector) = fixture();
        let vehicles = [vehicle(10, 0.001), vehicle(11, 0.002)];
        rebuild(&mut host, &mut registry, &projector, &[], &vehicles);

        assert_eq!(registry.pool(PoolKind::Vehicle).count(), 2);
        assert_eq!(registry.lookup_slot(11), Some((PoolKind::Vehicle, 1)));
        assert_eq!(registry.instance_count(), 2);
    }

    #[test]
    fn test_rebuild_requests_redraw() {
        let (mut host, mut registry, projector) = fixture();
        rebuild(
            &mut host,
            &mut registry,
            &projector,
            &[station(1, 0.001, StationRole::Neutral)],
            &[],
        );
        assert_eq!(host.redraws, 1);
    }

    #[test]
    fn test_set_instance_color_skips_missing() {
        let (mut host, mut registry, _projector) = fixture();
        let wrote = registry
            .set_instance_color(&mut host, 42, Rgb::new(1.0, 0.0, 0.0))
            .unwrap();
        assert!(!wrote);
    }

    #[test]
    fn test_dispose_is_idempotent_and_swallows_failures() {
        let (mut host, mut registry, projector) = fixture();
        rebuild(
            &mut host,
            &mut registry,
            &projector,
            &[station(1, 0.001, StationRole::Neutral)],
            &[vehicle(9, 0.001)],
        );
        assert!(host.live_resources() > 0);

        registry.dispose(&mut host);
        assert_eq!(host.live_resources(), 0);

        // Second dispose is a no-op; a failing host does not panic.
        host.fail_disposals = true;
        registry.dispose(&mut host);
    }
}
