//! Engine Metrics
//! ==============
//!
//! Frame-level counters the engine accumulates while running. Nothing here
//! feeds back into behavior; the sim runner and host applications read the
//! numbers for summaries and regression checks.

use serde::Serialize;

/// Counters accumulated over an engine session.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineMetrics {
    /// Ticks executed
    pub frames: u64,

    /// Redraws requested from the host
    pub redraw_requests: u64,

    /// Instance-pool rebuilds
    pub instance_rebuilds: u64,

    /// Route tube rebuilds
    pub route_rebuilds: u64,

    /// Camera sessions started
    pub camera_sessions: u64,

    /// Color transitions started
    pub color_transitions: u64,
}

impl EngineMetrics {
    /// One-line summary for logs and scenario reports.
    pub fn summary(&self) -> String {
        format!(
            "frames={} redraws={} instance_rebuilds={} route_rebuilds={} camera_sessions={} color_transitions={}",
            self.frames,
            self.redraw_requests,
            self.instance_rebuilds,
            self.route_rebuilds,
            self.camera_sessions,
            self.color_transitions,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_mentions_every_counter() {
        let metrics = EngineMetrics {
            frames: 3,
            redraw_requests: 2,
            instance_rebuilds: 1,
            route_rebuilds: 1,
            camera_sessions: 1,
            color_transitions: 4,
        };
        let line = metrics.summary();
        assert!(line.contains("frames=3"));
        assert!(line.contains("color_transitions=4"));
    }
}
