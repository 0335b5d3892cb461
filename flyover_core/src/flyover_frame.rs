//! The "FRAME" Engine - Render Loop Scheduling
//!
//! Tracks whether the engine needs frames from the host and keeps at most
//! one frame callback outstanding:
//! - **OnDemand**: frames are requested only while an animator reports
//!   active work; the loop goes idle otherwise so nothing burns CPU
//! - **Continuous**: a frame is requested after every tick, used while any
//!   entity is interactive/draggable

use flyover_host::FrameScheduler;
use serde::{Deserialize, Serialize};

/// Scheduling policy of the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameMode {
    /// Schedule only while animations are active
    OnDemand,

    /// Schedule every frame
    Continuous,
}

/// Bookkeeping for the host's frame-callback loop.
#[derive(Debug)]
pub struct FrameLoop {
    mode: FrameMode,

    /// True while a callback is outstanding on the host
    pending: bool,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    /// Creates an idle on-demand loop.
    pub fn new() -> Self {
        Self {
            mode: FrameMode::OnDemand,
            pending: false,
        }
    }

    /// Current scheduling policy.
    #[inline]
    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// True while a frame callback is outstanding.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Switches policy. Entering continuous mode immediately requests a
    /// frame so the loop starts without waiting for other activity.
    pub fn set_mode<S: FrameScheduler>(&mut self, mode: FrameMode, scheduler: &mut S) {
        self.mode = mode;
        if mode == FrameMode::Continuous {
            self.request(scheduler);
        }
    }

    /// Requests one frame callback unless one is already outstanding.
    pub fn request<S: FrameScheduler>(&mut self, scheduler: &mut S) {
        if !self.pending {
            scheduler.schedule_frame();
            self.pending = true;
        }
    }

    /// Marks the outstanding callback as delivered. Called at the top of
    /// every engine tick.
    pub fn begin_frame(&mut self) {
        self.pending = false;
    }

    /// Decides whether the loop keeps running after a tick: reschedules when
    /// work remains active or the mode is continuous, goes idle otherwise.
    pub fn end_frame<S: FrameScheduler>(&mut self, active: bool, scheduler: &mut S) {
        if active || self.mode == FrameMode::Continuous {
            self.request(scheduler);
        }
    }

    /// Revokes the outstanding callback, if any. Safe to call repeatedly.
    pub fn cancel<S: FrameScheduler>(&mut self, scheduler: &mut S) {
        if self.pending {
            scheduler.cancel_frame();
            self.pending = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingScheduler {
        schedules: usize,
        cancels: usize,
    }

    impl FrameScheduler for CountingScheduler {
        fn schedule_frame(&mut self) {
            self.schedules += 1;
        }

        fn cancel_frame(&mut self) {
            self.cancels += 1;
        }
    }

    #[test]
    fn test_single_outstanding_callback() {
        let mut frames = FrameLoop::new();
        let mut scheduler = CountingScheduler::default();

        frames.request(&mut scheduler);
        frames.request(&mut scheduler);
        assert_eq!(scheduler.schedules, 1);
        assert!(frames.is_pending());
    }

    #[test]
    fn test_on_demand_goes_idle() {
        let mut frames = FrameLoop::new();
        let mut scheduler = CountingScheduler::default();

        frames.request(&mut scheduler);
        frames.begin_frame();
        frames.end_frame(false, &mut scheduler);

        assert_eq!(scheduler.schedules, 1, "idle loop must not reschedule");
        assert!(!frames.is_pending());

        frames.begin_frame();
        frames.end_frame(true, &mut scheduler);
        assert_eq!(scheduler.schedules, 2);
    }

    #[test]
    fn test_continuous_reschedules_without_activity() {
        let mut frames = FrameLoop::new();
        let mut scheduler = CountingScheduler::default();

        frames.set_mode(FrameMode::Continuous, &mut scheduler);
        assert_eq!(scheduler.schedules, 1);

        frames.begin_frame();
        frames.end_frame(false, &mut scheduler);
        assert_eq!(scheduler.schedules, 2);
        assert!(frames.is_pending());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut frames = FrameLoop::new();
        let mut scheduler = CountingScheduler::default();

        frames.request(&mut scheduler);
        frames.cancel(&mut scheduler);
        frames.cancel(&mut scheduler);

        assert_eq!(scheduler.cancels, 1);
        assert!(!frames.is_pending());
    }
}
