//! Core time context trait for the overlay engine.

use std::time::Duration;

/// The central interface for time in the engine.
///
/// This trait abstracts the clock so that the overlay engine can run against
/// both the real host (monotonic system time) and a simulation (manually
/// advanced virtual time).
///
/// # Implementations
///
/// - **Production**: `SystemContext` - wraps `std::time::Instant`
/// - **Simulation**: `SimContext` (in `flyover_sim`) - virtual clock
///
/// # Determinism
///
/// The engine holds no clock of its own: every animator computes progress
/// from the `now()` it is handed. A test that controls `now()` controls every
/// animation frame.
pub trait HostContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for animation start times and progress computation.
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;
}
