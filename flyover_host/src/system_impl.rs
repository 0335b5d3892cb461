//! Production implementation of HostContext using the system clock.

use crate::HostContext;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production context backed by `std::time::Instant`.
///
/// This is the "real" implementation used when the engine runs inside an
/// actual map host. Time is monotonic from context creation.
pub struct SystemContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl SystemContext {
    /// Creates a new SystemContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing with the host.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for SystemContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HostContext for SystemContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_context_monotonic() {
        let ctx = SystemContext::new();
        let t1 = ctx.now();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(5));
    }
}
