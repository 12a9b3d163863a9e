//! Draggable bottom-panel controller: maps pointer-drag deltas to a clamped
//! height and settles to one of two resting bounds based on position and
//! release velocity.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Deserialize;
use tracing::debug;

/// Tuning knobs for gesture recognition and the settle animation. The
/// defaults are the empirically chosen values the shipped UI uses.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// A move becomes a drag only once |delta_y| exceeds this, so taps on the
    /// drag handle are not mistaken for drags.
    pub drag_dead_zone: f32,
    /// Release speeds above this count as a fling; direction then overrides
    /// position when picking the settle target. Units are points per
    /// millisecond, the host platform's gesture velocity convention.
    pub fling_velocity_threshold: f32,
    pub spring_tension: f32,
    pub spring_friction: f32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            drag_dead_zone: 3.0,
            fling_velocity_threshold: 0.5,
            spring_tension: 100.0,
            spring_friction: 8.0,
        }
    }
}

/// Resting bounds derived from the viewport height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelBounds {
    pub min_height: f32,
    pub max_height: f32,
    pub threshold: f32,
}

impl PanelBounds {
    /// Panics in debug builds on a non-positive viewport height; that is a
    /// caller contract violation, not a recoverable state.
    pub fn from_viewport(viewport_height: f32) -> Self {
        debug_assert!(
            viewport_height > 0.0,
            "viewport height must be positive, got {viewport_height}"
        );
        let min_height = viewport_height * 0.25;
        let max_height = viewport_height * 0.75;
        Self {
            min_height,
            max_height,
            threshold: (min_height + max_height) / 2.0,
        }
    }

    pub fn clamp(&self, height: f32) -> f32 {
        height.clamp(self.min_height, self.max_height)
    }
}

/// One sample of an in-progress drag. `delta_y` is cumulative screen-space
/// displacement since gesture start, down-positive; `velocity_y` is signed,
/// down-positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureSample {
    pub delta_y: f32,
    pub velocity_y: f32,
}

impl GestureSample {
    pub fn new(delta_y: f32, velocity_y: f32) -> Self {
        Self {
            delta_y,
            velocity_y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragPhase {
    Idle,
    /// Gesture started, dead zone not yet exceeded.
    Pending,
    /// Accepted as a drag; stays accepted until release.
    Active,
}

/// Damped spring toward a fixed target. Position is owned by the controller;
/// the spring only carries target and velocity between ticks.
#[derive(Debug, Clone, Copy)]
struct Spring {
    target: f32,
    velocity: f32,
}

const SETTLE_EPSILON: f32 = 0.1;

pub struct PanelController {
    config: PanelConfig,
    bounds: PanelBounds,
    current_height: f32,
    /// Resting height the next gesture composes its deltas against.
    baseline: f32,
    spring: Option<Spring>,
    drag: DragPhase,
    last_expanded: bool,
    expanded_subscribers: Vec<Sender<bool>>,
}

impl PanelController {
    /// Creates the controller at the expanded rest position, mirroring screen
    /// mount behavior.
    pub fn new(viewport_height: f32, config: PanelConfig) -> Self {
        let bounds = PanelBounds::from_viewport(viewport_height);
        Self {
            config,
            bounds,
            current_height: bounds.max_height,
            baseline: bounds.max_height,
            spring: None,
            drag: DragPhase::Idle,
            last_expanded: true,
            expanded_subscribers: Vec::new(),
        }
    }

    pub fn bounds(&self) -> PanelBounds {
        self.bounds
    }

    pub fn current_height(&self) -> f32 {
        self.current_height
    }

    /// Derived from the current height on every read; never stored
    /// independently.
    pub fn is_expanded(&self) -> bool {
        self.current_height > self.bounds.threshold
    }

    pub fn is_dragging(&self) -> bool {
        self.drag == DragPhase::Active
    }

    pub fn is_settling(&self) -> bool {
        self.spring.is_some()
    }

    /// Subscribes to flips of the derived expanded flag. Flips that happen
    /// mid-drag are delivered too; chrome tied to the flag is expected to
    /// follow the live height.
    pub fn subscribe_expanded(&mut self) -> Receiver<bool> {
        let (tx, rx) = unbounded();
        self.expanded_subscribers.push(tx);
        rx
    }

    /// Freezes any running settle animation at its live value and captures the
    /// current height as the baseline for this gesture's deltas.
    pub fn on_gesture_start(&mut self) {
        self.spring = None;
        self.baseline = self.current_height;
        self.drag = DragPhase::Pending;
    }

    /// Applies one move sample. Returns whether the sample was accepted as a
    /// drag; samples inside the dead zone of a pending gesture are ignored.
    /// Must only be called after `on_gesture_start`.
    pub fn on_gesture_move(&mut self, sample: GestureSample) -> bool {
        match self.drag {
            DragPhase::Idle => return false,
            DragPhase::Pending => {
                if sample.delta_y.abs() <= self.config.drag_dead_zone {
                    return false;
                }
                self.drag = DragPhase::Active;
            }
            DragPhase::Active => {}
        }

        // Dragging up (negative delta) raises the panel. Clamp relative to the
        // baseline so the displayed height never leaves the bounds mid-drag.
        let proposed = (-sample.delta_y).clamp(
            self.bounds.min_height - self.baseline,
            self.bounds.max_height - self.baseline,
        );
        self.set_height(self.baseline + proposed);
        true
    }

    /// Picks a resting bound from release velocity and position, then starts
    /// the settle spring. The baseline becomes the target immediately.
    pub fn on_gesture_end(&mut self, sample: GestureSample) {
        let final_height = self.baseline - sample.delta_y;

        let target = if sample.velocity_y.abs() > self.config.fling_velocity_threshold {
            // Fling: direction wins regardless of position.
            if sample.velocity_y < 0.0 {
                self.bounds.max_height
            } else {
                self.bounds.min_height
            }
        } else if final_height < self.bounds.threshold {
            self.bounds.min_height
        } else {
            self.bounds.max_height
        };

        let target = self.bounds.clamp(target);
        debug!(
            final_height,
            velocity = sample.velocity_y,
            target,
            "panel gesture released"
        );

        self.drag = DragPhase::Idle;
        self.baseline = target;
        self.start_spring(target);
    }

    /// Plays the settle animation down to the collapsed bound, independent of
    /// any gesture. Used by the screen's close button.
    pub fn collapse(&mut self) {
        self.baseline = self.bounds.min_height;
        self.start_spring(self.bounds.min_height);
    }

    /// Recomputes bounds for the new viewport and snaps to the expanded rest
    /// position with no animation. The abrupt snap matches shipped behavior.
    pub fn on_viewport_resize(&mut self, viewport_height: f32) {
        self.bounds = PanelBounds::from_viewport(viewport_height);
        self.spring = None;
        self.drag = DragPhase::Idle;
        self.baseline = self.bounds.max_height;
        self.set_height(self.bounds.max_height);
    }

    /// Advances the settle animation by `dt` seconds. Returns whether the
    /// panel is still animating and needs further ticks.
    pub fn tick(&mut self, dt: f32) -> bool {
        let Some(mut spring) = self.spring else {
            return false;
        };

        let displacement = spring.target - self.current_height;
        let acceleration =
            self.config.spring_tension * displacement - self.config.spring_friction * spring.velocity;
        spring.velocity += acceleration * dt;
        let next = self.current_height + spring.velocity * dt;

        if (spring.target - next).abs() < SETTLE_EPSILON
            && spring.velocity.abs() < SETTLE_EPSILON
        {
            self.spring = None;
            self.set_height(spring.target);
            return false;
        }

        self.spring = Some(spring);
        // The underdamped spring can overshoot its target; the displayed
        // height still must not leave the physical bounds.
        self.set_height(self.bounds.clamp(next));
        true
    }

    fn start_spring(&mut self, target: f32) {
        if (target - self.current_height).abs() < SETTLE_EPSILON {
            self.spring = None;
            self.set_height(target);
            return;
        }
        self.spring = Some(Spring {
            target,
            velocity: 0.0,
        });
    }

    fn set_height(&mut self, height: f32) {
        self.current_height = height;
        let expanded = self.is_expanded();
        if expanded != self.last_expanded {
            self.last_expanded = expanded;
            self.expanded_subscribers
                .retain(|tx| tx.send(expanded).is_ok());
        }
    }
}
