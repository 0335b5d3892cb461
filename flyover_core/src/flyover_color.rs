//! The "COLOR" Engine - Per-Entity Color Transitions
//!
//! Drives the smooth recolor that plays when an entity changes role (a
//! station becoming the departure pick, a selection clearing):
//! - One in-flight transition per entity, keyed by stable entity id
//! - Linear RGB interpolation on clamped progress
//! - Last-wins replacement: restarting an entity's transition discards the
//!   old one immediately, no queuing
//!
//! A replacement restarts from the color the caller passes, not from the
//! interpolated value - retriggering mid-flight therefore jumps visibly but
//! always resolves to the same target palette. `current_color` exposes the
//! interpolated value for callers that want continuity instead.

use crate::flyover_instance::{InstanceRegistry, StationRole};
use flyover_host::RenderHost;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Linear RGB color, components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    /// Creates a color from linear components.
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Component-wise linear interpolation at `t` in [0, 1].
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        Rgb::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    /// The color as a flat array for the host boundary.
    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Base colors for each rendered role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OverlayPalette {
    /// Unselected stations
    pub neutral: Rgb,

    /// The departure pick
    pub departure: Rgb,

    /// The arrival pick
    pub arrival: Rgb,

    /// Vehicles
    pub vehicle: Rgb,
}

impl OverlayPalette {
    /// Base color of a station role.
    pub fn color_for(&self, role: StationRole) -> Rgb {
        match role {
            StationRole::Neutral => self.neutral,
            StationRole::Departure => self.departure,
            StationRole::Arrival => self.arrival,
        }
    }
}

impl Default for OverlayPalette {
    fn default() -> Self {
        Self {
            neutral: Rgb::new(0.62, 0.67, 0.75),
            departure: Rgb::new(0.18, 0.75, 0.45),
            arrival: Rgb::new(0.91, 0.42, 0.25),
            vehicle: Rgb::new(0.25, 0.62, 0.93),
        }
    }
}

/// One in-flight per-entity color transition.
#[derive(Debug, Clone)]
pub struct ColorTransition {
    /// Entity whose instance is being recolored
    pub entity_id: u64,

    /// Interpolation start color
    pub from: Rgb,

    /// Interpolation target color
    pub to: Rgb,

    /// Clock value when the transition started
    pub start: Duration,

    /// Transition length; zero applies the target immediately
    pub duration: Duration,

    /// Cleared on completion, swept afterwards
    pub active: bool,
}

impl ColorTransition {
    /// Clamped progress in [0, 1] at clock value `now`.
    fn progress(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0) as f32
    }
}

/// Engine driving all per-entity color transitions.
#[derive(Debug, Default)]
pub struct ColorAnimator {
    /// In-flight transitions keyed by entity id
    transitions: HashMap<u64, ColorTransition>,
}

impl ColorAnimator {
    /// Creates an animator with no transitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or replaces) the transition for an entity.
    pub fn start(&mut self, entity_id: u64, from: Rgb, to: Rgb, duration: Duration, now: Duration) {
        self.transitions.insert(
            entity_id,
            ColorTransition {
                entity_id,
                from,
                to,
                start: now,
                duration,
                active: true,
            },
        );
    }

    /// The interpolated color an entity shows at `now`, if it is transitioning.
    pub fn current_color(&self, entity_id: u64, now: Duration) -> Option<Rgb> {
        let transition = self.transitions.get(&entity_id)?;
        Some(transition.from.lerp(transition.to, transition.progress(now)))
    }

    /// True while any transition is in flight.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// Number of in-flight transitions.
    #[inline]
    pub fn active_count(&self) -> usize {
        self.transitions.len()
    }

    /// Advances every transition to `now` and writes colors to the live
    /// instances. Entities that are not currently rendered are skipped
    /// silently; their transitions keep aging and expire on schedule.
    ///
    /// Returns whether any transition remains active.
    pub fn tick<H: RenderHost>(
        &mut self,
        now: Duration,
        registry: &mut InstanceRegistry,
        host: &mut H,
    ) -> bool {
        for transition in self.transitions.values_mut() {
            let progress = transition.progress(now);
            let color = transition.from.lerp(transition.to, progress);

            if let Err(err) = registry.set_instance_color(host, transition.entity_id, color) {
                debug!(
                    "color write failed for entity {}: {err}",
                    transition.entity_id
                );
            }

            if progress >= 1.0 {
                transition.active = false;
            }
        }
        self.transitions.retain(|_, t| t.active);
        !self.transitions.is_empty()
    }

    /// Drops every transition without completing it.
    pub fn clear(&mut self) {
        self.transitions.clear();
    }
}
