//! The "CAMERA" Engine - Interruptible Map-Camera Animation
//!
//! Computes interpolated camera state (center, zoom, tilt, heading) across:
//! - Single moves (`animate_to`)
//! - Multi-keyframe sequences (`animate_sequence`)
//! - Generated patterns (orbit, fly-to, custom path)
//!
//! State machine: Idle -> Animating -> Idle, on natural completion or
//! explicit cancel. At most one session is ever live; starting a new one
//! cancels and replaces any running session (last-wins), and the superseded
//! session's completion callback never fires. Cancellation is synchronous -
//! the caller's next `state()` read already reflects it.

use crate::flyover_geo::{
    destination, haversine_distance_m, midpoint, GeoPoint,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest map zoom level.
pub const ZOOM_MIN: f64 = 0.0;

/// Largest map zoom level.
pub const ZOOM_MAX: f64 = 22.0;

/// Largest tilt from nadir, degrees.
pub const TILT_MAX: f64 = 90.0;

/// Keyframes generated per orbit cycle.
pub const ORBIT_KEYFRAMES_PER_CYCLE: usize = 32;

/// Fly-to distance at which the bell-curve zoom starts pulling back.
const FLY_TO_PULL_BACK_BASE_M: f64 = 250.0;

/// Upper bound on fly-to zoom pull-back, in zoom levels.
const FLY_TO_MAX_PULL_BACK: f64 = 6.0;

/// Easing curve applied to a keyframe's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EasingKind {
    Linear,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
}

impl EasingKind {
    /// Maps linear progress `t` in [0, 1] onto the eased curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingKind::Linear => t,
            EasingKind::EaseInCubic => t * t * t,
            EasingKind::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            EasingKind::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Full map-camera state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Geographic look-at point
    pub center: GeoPoint,

    /// Map zoom level, clamped to [`ZOOM_MIN`, `ZOOM_MAX`]
    pub zoom: f64,

    /// Tilt from nadir, degrees, clamped to [0, `TILT_MAX`]
    pub tilt: f64,

    /// Compass heading, degrees, wrapped to [0, 360)
    pub heading: f64,
}

impl CameraState {
    /// Creates a state with every field brought into range.
    pub fn new(center: GeoPoint, zoom: f64, tilt: f64, heading: f64) -> Self {
        Self {
            center,
            zoom,
            tilt,
            heading,
        }
        .clamped()
    }

    /// The state with zoom/tilt clamped, heading wrapped, and the center
    /// normalized. Applied at every write into the animator.
    pub fn clamped(mut self) -> Self {
        self.zoom = self.zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        self.tilt = self.tilt.clamp(0.0, TILT_MAX);
        self.heading = self.heading.rem_euclid(360.0);
        self.center.lat = self.center.lat.clamp(-90.0, 90.0);
        self.center.lng = normalize_lng(self.center.lng);
        self
    }
}

/// A target camera state plus the duration/easing used to reach it from the
/// previous keyframe's end state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// End state of this keyframe
    pub target: CameraState,

    /// Time to reach the target; zero applies it instantly
    pub duration: Duration,

    /// Easing over this keyframe's progress
    pub easing: EasingKind,
}

impl Keyframe {
    /// A zero-duration keyframe: the idiomatic way to pin a sequence's
    /// starting state without animating toward it.
    pub fn snapshot(target: CameraState) -> Self {
        Self {
            target,
            duration: Duration::ZERO,
            easing: EasingKind::Linear,
        }
    }
}

// ============================================================================
// INTERPOLATION
// ============================================================================

/// Wraps a longitude into [-180, 180].
fn normalize_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// Interpolates a heading along the shorter angular arc.
///
/// The delta is normalized into (-180, 180] before interpolating; the result
/// is wrapped to [0, 360).
pub fn lerp_heading(from: f64, to: f64, t: f64) -> f64 {
    let delta = (to - from + 180.0).rem_euclid(360.0) - 180.0;
    (from + delta * t).rem_euclid(360.0)
}

/// Interpolates a longitude across the shorter arc of the ±180° seam.
pub fn lerp_longitude(from: f64, to: f64, t: f64) -> f64 {
    let delta = (to - from + 180.0).rem_euclid(360.0) - 180.0;
    normalize_lng(from + delta * t)
}

/// Interpolated camera state at progress `t` in [0, 1].
pub fn interpolate(from: &CameraState, to: &CameraState, t: f64) -> CameraState {
    let center = GeoPoint::new(
        from.center.lat + (to.center.lat - from.center.lat) * t,
        lerp_longitude(from.center.lng, to.center.lng, t),
        from.center.altitude + (to.center.altitude - from.center.altitude) * t,
    );
    CameraState {
        center,
        zoom: from.zoom + (to.zoom - from.zoom) * t,
        tilt: from.tilt + (to.tilt - from.tilt) * t,
        heading: lerp_heading(from.heading, to.heading, t),
    }
    .clamped()
}

// ============================================================================
// SESSIONS (The Engine)
// ============================================================================

/// Callback invoked when a session runs to natural completion.
pub type CompletionCallback = Box<dyn FnOnce()>;

struct Session {
    keyframes: Vec<Keyframe>,
    index: usize,

    /// Start state of the active keyframe
    segment_start: CameraState,

    /// Clock value the active keyframe began at
    segment_started: Duration,

    on_complete: Option<CompletionCallback>,
}

/// The engine computing interpolated camera state frame by frame.
pub struct CameraAnimator {
    current: CameraState,
    session: Option<Session>,
}

impl CameraAnimator {
    /// Creates an idle animator at the given state.
    pub fn new(initial: CameraState) -> Self {
        Self {
            current: initial.clamped(),
            session: None,
        }
    }

    /// The camera state as of the last tick.
    #[inline]
    pub fn state(&self) -> CameraState {
        self.current
    }

    /// True while a session is live.
    #[inline]
    pub fn is_animating(&self) -> bool {
        self.session.is_some()
    }

    /// Starts a single-keyframe session toward `target`.
    pub fn animate_to(
        &mut self,
        target: CameraState,
        duration: Duration,
        easing: EasingKind,
        now: Duration,
        on_complete: Option<CompletionCallback>,
    ) {
        self.animate_sequence(
            vec![Keyframe {
                target,
                duration,
                easing,
            }],
            now,
            on_complete,
        );
    }

    /// Plays keyframes in order, each starting from the previous one's end
    /// state (the current camera state for the first).
    ///
    /// Last-wins: any in-flight session is discarded immediately and its
    /// completion callback never fires. An empty keyframe list completes at
    /// once.
    pub fn animate_sequence(
        &mut self,
        keyframes: Vec<Keyframe>,
        now: Duration,
        on_complete: Option<CompletionCallback>,
    ) {
        self.session = None;

        if keyframes.is_empty() {
            if let Some(callback) = on_complete {
                callback();
            }
            return;
        }

        self.session = Some(Session {
            keyframes,
            index: 0,
            segment_start: self.current,
            segment_started: now,
            on_complete,
        });
    }

    /// Discards the live session, if any, without firing its callback.
    pub fn cancel(&mut self) {
        self.session = None;
    }

    /// Advances the live session to `now`.
    ///
    /// Zero-duration keyframes apply instantly; several may collapse into
    /// one tick. Returns whether a session is still live afterwards (the
    /// final state has already been applied on the tick that finishes it).
    pub fn tick(&mut self, now: Duration) -> bool {
        let mut finished = false;

        if let Some(session) = self.session.as_mut() {
            loop {
                let keyframe = session.keyframes[session.index];

                if !keyframe.duration.is_zero() {
                    let elapsed = now.saturating_sub(session.segment_started);
                    if elapsed < keyframe.duration {
                        let t = elapsed.as_secs_f64() / keyframe.duration.as_secs_f64();
                        self.current = interpolate(
                            &session.segment_start,
                            &keyframe.target,
                            keyframe.easing.apply(t),
                        );
                        break;
                    }
                }

                // Keyframe exhausted: land exactly on its target.
                self.current = keyframe.target.clamped();
                session.segment_started += keyframe.duration;
                session.segment_start = self.current;
                session.index += 1;

                if session.index == session.keyframes.len() {
                    finished = true;
                    break;
                }
            }
        } else {
            return false;
        }

        if finished {
            if let Some(session) = self.session.take() {
                if let Some(on_complete) = session.on_complete {
                    on_complete();
                }
            }
            return false;
        }
        true
    }
}

// ============================================================================
// PATTERN GENERATORS
// ============================================================================

/// Orbit around `center`: the camera center sweeps a haversine circle of
/// `radius_m` while the heading keeps facing the orbit center.
///
/// The first keyframe is a zero-duration snapshot at angle 0, so one full
/// cycle starts and ends on the same heading modulo 360°.
pub fn orbit(
    center: GeoPoint,
    radius_m: f64,
    tilt: f64,
    zoom: f64,
    cycles: f64,
    duration: Duration,
) -> Vec<Keyframe> {
    let segments = ((ORBIT_KEYFRAMES_PER_CYCLE as f64 * cycles).ceil().max(1.0)) as usize;
    let sweep = 360.0 * cycles.max(0.0);

    let mut frames = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let angle = sweep * i as f64 / segments as f64;
        let state = CameraState::new(
            destination(center, angle.rem_euclid(360.0), radius_m),
            zoom,
            tilt,
            angle + 180.0,
        );
        let duration_i = if i == 0 {
            Duration::ZERO
        } else {
            duration.div_f64(segments as f64)
        };
        frames.push(Keyframe {
            target: state,
            duration: duration_i,
            easing: EasingKind::Linear,
        });
    }
    frames
}

/// Fly-to with a bell-curve zoom profile: eases out to a distance-derived
/// midpoint zoom over the first half, then in to `final_zoom` over the
/// second. Tilt and heading change in the back half only, which reads as an
/// arc even though the center moves linearly.
pub fn fly_to(
    start: CameraState,
    end_center: GeoPoint,
    final_zoom: f64,
    final_tilt: f64,
    final_heading: f64,
    duration: Duration,
) -> Vec<Keyframe> {
    let distance = haversine_distance_m(start.center, end_center);
    let (mid_center, pull_back) = if distance > 0.0 {
        (
            midpoint(start.center, end_center),
            (distance / FLY_TO_PULL_BACK_BASE_M)
                .log2()
                .clamp(0.0, FLY_TO_MAX_PULL_BACK),
        )
    } else {
        (start.center, 0.0)
    };
    let mid_zoom = (start.zoom.min(final_zoom) - pull_back).clamp(ZOOM_MIN, ZOOM_MAX);
    let half = duration / 2;

    vec![
        Keyframe::snapshot(start),
        Keyframe {
            target: CameraState::new(mid_center, mid_zoom, start.tilt, start.heading),
            duration: half,
            easing: EasingKind::EaseInCubic,
        },
        Keyframe {
            target: CameraState::new(end_center, final_zoom, final_tilt, final_heading),
            duration: duration.saturating_sub(half),
            easing: EasingKind::EaseOutCubic,
        },
    ]
}

/// Camera path through explicit control points, the total duration split
/// evenly across consecutive pairs; interpolation happens within the active
/// segment only.
///
/// Fewer than 2 control points collapses to an instant jump (or to nothing
/// at all when the list is empty).
pub fn custom_path(control_points: &[CameraState], duration: Duration) -> Vec<Keyframe> {
    match control_points {
        [] => Vec::new(),
        [only] => vec![Keyframe::snapshot(*only)],
        [first, rest @ ..] => {
            let per_segment = duration.div_f64(rest.len() as f64);
            let mut frames = Vec::with_capacity(control_points.len());
            frames.push(Keyframe::snapshot(*first));
            for state in rest {
                frames.push(Keyframe {
                    target: *state,
                    duration: per_segment,
                    easing: EasingKind::Linear,
                });
            }
            frames
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flyover_geo::initial_bearing;
    use approx::assert_relative_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn state(lat: f64, lng: f64, zoom: f64, tilt: f64, heading: f64) -> CameraState {
        CameraState::new(GeoPoint::at_surface(lat, lng), zoom, tilt, heading)
    }

    fn flag() -> (Rc<Cell<bool>>, CompletionCallback) {
        let fired = Rc::new(Cell::new(false));
        let inner = fired.clone();
        (fired, Box::new(move || inner.set(true)))
    }

    #[test]
    fn test_heading_takes_shorter_arc() {
        assert_relative_eq!(lerp_heading(350.0, 10.0, 0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(lerp_heading(10.0, 350.0, 0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(lerp_heading(0.0, 180.0, 0.5), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_longitude_crosses_the_seam() {
        let mid = lerp_longitude(179.0, -179.0, 0.5);
        assert_relative_eq!(mid.abs(), 180.0, epsilon = 1e-9);
        // Never the long way around through 0.
        assert_relative_eq!(lerp_longitude(179.0, -179.0, 0.25), 179.5, epsilon = 1e-9);
    }

    #[test]
    fn test_clamping_at_every_write() {
        let s = state(22.3, 114.2, 30.0, 120.0, 725.0);
        assert_relative_eq!(s.zoom, ZOOM_MAX);
        assert_relative_eq!(s.tilt, TILT_MAX);
        assert_relative_eq!(s.heading, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_animate_to_converges_and_completes() {
        let mut animator = CameraAnimator::new(state(22.3, 114.2, 12.0, 0.0, 0.0));
        let (fired, callback) = flag();
        let target = state(22.4, 114.3, 15.0, 45.0, 90.0);

        animator.animate_to(target, ms(1000), EasingKind::Linear, ms(0), Some(callback));
        assert!(animator.is_animating());

        assert!(animator.tick(ms(500)));
        let mid = animator.state();
        assert_relative_eq!(mid.zoom, 13.5, epsilon = 1e-9);
        assert_relative_eq!(mid.tilt, 22.5, epsilon = 1e-9);
        assert!(!fired.get());

        assert!(!animator.tick(ms(1000)));
        assert_eq!(animator.state(), target);
        assert!(fired.get());
        assert!(!animator.is_animating());
    }

    #[test]
    fn test_last_wins_cancellation() {
        let mut animator = CameraAnimator::new(state(22.3, 114.2, 12.0, 0.0, 0.0));
        let a = state(22.9, 114.9, 10.0, 0.0, 0.0);
        let b = state(21.9, 113.9, 16.0, 30.0, 180.0);
        let (a_fired, a_callback) = flag();
        let (b_fired, b_callback) = flag();

        animator.animate_to(a, ms(1000), EasingKind::Linear, ms(0), Some(a_callback));
        animator.animate_to(b, ms(1000), EasingKind::Linear, ms(0), Some(b_callback));

        animator.tick(ms(1500));
        assert_eq!(animator.state(), b);
        assert!(!a_fired.get(), "superseded session must never complete");
        assert!(b_fired.get());
    }

    #[test]
    fn test_cancel_fires_no_callback() {
        let mut animator = CameraAnimator::new(state(22.3, 114.2, 12.0, 0.0, 0.0));
        let (fired, callback) = flag();

        animator.animate_to(
            state(22.4, 114.3, 14.0, 0.0, 0.0),
            ms(1000),
            EasingKind::Linear,
            ms(0),
            Some(callback),
        );
        animator.cancel();

        assert!(!animator.tick(ms(2000)));
        assert!(!fired.get());
        assert!(!animator.is_animating());
    }

    #[test]
    fn test_empty_sequence_completes_immediately() {
        let mut animator = CameraAnimator::new(state(22.3, 114.2, 12.0, 0.0, 0.0));
        let (fired, callback) = flag();

        animator.animate_sequence(Vec::new(), ms(0), Some(callback));
        assert!(fired.get());
        assert!(!animator.is_animating());
    }

    #[test]
    fn test_snapshot_keyframe_applies_instantly() {
        let mut animator = CameraAnimator::new(state(22.3, 114.2, 12.0, 0.0, 0.0));
        let pinned = state(22.5, 114.5, 8.0, 10.0, 270.0);
        let target = state(22.6, 114.6, 14.0, 10.0, 270.0);

        animator.animate_sequence(
            vec![
                Keyframe::snapshot(pinned),
                Keyframe {
                    target,
                    duration: ms(1000),
                    easing: EasingKind::Linear,
                },
            ],
            ms(0),
            None,
        );

        // First tick: the snapshot landed and the second keyframe starts
        // from it, not from the pre-session state.
        assert!(animator.tick(ms(0)));
        assert_eq!(animator.state(), pinned);

        animator.tick(ms(500));
        assert_relative_eq!(animator.state().zoom, 11.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sequence_chains_segment_start_states() {
        let mut animator = CameraAnimator::new(state(22.3, 114.2, 10.0, 0.0, 0.0));
        let first = state(22.4, 114.2, 12.0, 0.0, 0.0);
        let second = state(22.4, 114.4, 12.0, 0.0, 90.0);

        animator.animate_sequence(
            vec![
                Keyframe {
                    target: first,
                    duration: ms(400),
                    easing: EasingKind::Linear,
                },
                Keyframe {
                    target: second,
                    duration: ms(600),
                    easing: EasingKind::Linear,
                },
            ],
            ms(0),
            None,
        );

        // Sparse ticking: one tick lands mid-second-segment; the first
        // segment must have been resolved exactly to its target.
        assert!(animator.tick(ms(700)));
        let s = animator.state();
        assert_relative_eq!(s.center.lat, 22.4, epsilon = 1e-9);
        assert_relative_eq!(s.heading, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orbit_closes_the_loop() {
        let frames = orbit(
            GeoPoint::at_surface(22.3, 114.2),
            100.0,
            45.0,
            16.0,
            1.0,
            ms(4000),
        );

        let first = frames.first().unwrap().target;
        let last = frames.last().unwrap().target;

        let delta = (last.heading - first.heading).rem_euclid(360.0);
        assert_relative_eq!(delta.min(360.0 - delta), 0.0, epsilon = 1e-6);
        assert_relative_eq!(first.center.lat, last.center.lat, epsilon = 1e-9);
        assert_relative_eq!(first.center.lng, last.center.lng, epsilon = 1e-9);

        // Snapshot start, then evenly timed sweep keyframes.
        assert_eq!(frames[0].duration, Duration::ZERO);
        assert_eq!(frames.len(), ORBIT_KEYFRAMES_PER_CYCLE + 1);
    }

    #[test]
    fn test_orbit_faces_the_center() {
        let center = GeoPoint::at_surface(22.3, 114.2);
        let frames = orbit(center, 100.0, 45.0, 16.0, 1.0, ms(4000));

        for frame in frames.iter().step_by(8) {
            let toward_center = initial_bearing(frame.target.center, center);
            let delta = (frame.target.heading - toward_center).rem_euclid(360.0);
            assert!(delta.min(360.0 - delta) < 0.1, "heading drifts off center");
        }
    }

    #[test]
    fn test_fly_to_bell_curve_zoom() {
        let start = state(22.3, 114.2, 16.0, 0.0, 0.0);
        let end = GeoPoint::at_surface(22.4, 114.4);
        let frames = fly_to(start, end, 15.0, 45.0, 120.0, ms(3000));

        assert_eq!(frames.len(), 3);
        let mid = frames[1].target;
        let last = frames[2].target;

        // Pulled out below both endpoint zooms, then back in.
        assert!(mid.zoom < start.zoom.min(15.0));
        assert_relative_eq!(last.zoom, 15.0);
        assert_relative_eq!(last.tilt, 45.0);
        assert_relative_eq!(last.heading, 120.0);

        // Tilt/heading stay put until the back half.
        assert_relative_eq!(mid.tilt, start.tilt);
        assert_relative_eq!(mid.heading, start.heading);
    }

    #[test]
    fn test_fly_to_zero_distance_keeps_zoom_profile_flat() {
        let start = state(22.3, 114.2, 16.0, 0.0, 0.0);
        let frames = fly_to(start, start.center, 16.0, 0.0, 0.0, ms(1000));
        assert_relative_eq!(frames[1].target.zoom, 16.0);
    }

    #[test]
    fn test_custom_path_segments_evenly() {
        let points = [
            state(22.30, 114.20, 10.0, 0.0, 0.0),
            state(22.32, 114.22, 12.0, 0.0, 0.0),
            state(22.34, 114.24, 14.0, 0.0, 0.0),
        ];
        let frames = custom_path(&points, ms(1000));

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].duration, Duration::ZERO);
        assert_eq!(frames[1].duration, ms(500));
        assert_eq!(frames[2].duration, ms(500));

        let mut animator = CameraAnimator::new(state(0.0, 0.0, 5.0, 0.0, 0.0));
        animator.animate_sequence(frames, ms(0), None);
        animator.tick(ms(500));
        // Exactly at the middle control point.
        assert_relative_eq!(animator.state().zoom, 12.0, epsilon = 1e-9);
        assert_relative_eq!(animator.state().center.lat, 22.32, epsilon = 1e-9);
    }

    #[test]
    fn test_custom_path_degenerate_inputs() {
        assert!(custom_path(&[], ms(1000)).is_empty());

        let only = state(22.3, 114.2, 10.0, 0.0, 0.0);
        let frames = custom_path(&[only], ms(1000));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].duration, Duration::ZERO);

        // An instant jump, not an error.
        let mut animator = CameraAnimator::new(state(0.0, 0.0, 5.0, 0.0, 0.0));
        animator.animate_sequence(frames, ms(0), None);
        assert!(!animator.tick(ms(0)));
        assert_eq!(animator.state(), only);
    }
}
