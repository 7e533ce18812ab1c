// THEORY:
// The `session` module is the heart of the engine: a two-state machine that decides,
// frame by frame, whether to pay for a full detection or to ride along with the
// cheaper tracker.
//
// Key architectural principles:
// 1.  **Seeking**: No person is locked. Every frame is handed to `detect`. The first
//     hit computes the motion classification, remembers the box, and moves the
//     machine to `Tracking`.
// 2.  **Tracking**: A person is locked. Every frame is handed to `track` together
//     with the last known box. Success only refreshes the box; the motion flag
//     established at detection time is carried unchanged. A miss drops the lock and
//     the machine goes back to `Seeking` on the next frame.
// 3.  **Single Source of Truth**: The mode alone decides what happens next. The box
//     is present exactly when the mode is `Tracking`, and the fields are private so
//     nothing outside this module can break that pairing.
// 4.  **No Failure Path**: The capability has already turned every error into
//     "no observation", so a transition is always defined and the machine never
//     stops on its own.
//
// While tracking, the overlay is drawn at the box the person occupied *before* this
// frame's update and always with the `Tracked` stroke. Detection frames are drawn at
// the detected box and colored by the motion classification.

use crate::core_modules::capability::PersonCapability;
use crate::core_modules::geometry::{self, NormalizedRect, ViewSize};
use crate::core_modules::observation::Frame;
use crate::core_modules::overlay::{DrawInstruction, StrokeKind};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No person is locked; detection runs on every frame.
    #[default]
    Seeking,
    /// A person is locked; tracking runs on every frame.
    Tracking,
}

/// The transition taken while processing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Seeking → Tracking.
    Acquired,
    /// Seeking → Seeking.
    StillSeeking,
    /// Tracking → Tracking.
    Followed,
    /// Tracking → Seeking.
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionState {
    mode: Mode,
    last_box: Option<NormalizedRect>,
    is_moving: bool,
}

impl SessionState {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn last_box(&self) -> Option<NormalizedRect> {
        self.last_box
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    fn lock(&mut self, bounding_box: NormalizedRect, is_moving: bool) {
        self.mode = Mode::Tracking;
        self.last_box = Some(bounding_box);
        self.is_moving = is_moving;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The result of advancing the machine by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub transition: Transition,
    pub draw: Option<DrawInstruction>,
}

/// Owns the session state and the capability it queries.
pub struct SessionMachine<C> {
    capability: C,
    state: SessionState,
    motion_threshold_px: f64,
}

impl<C: PersonCapability> SessionMachine<C> {
    pub fn new(capability: C, motion_threshold_px: f64) -> Self {
        Self {
            capability,
            state: SessionState::default(),
            motion_threshold_px,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    /// Processes one frame against a view of the given size.
    pub fn advance(&mut self, frame: &Frame, view: ViewSize) -> Step {
        match (self.state.mode, self.state.last_box) {
            (Mode::Tracking, Some(previous)) => self.follow(previous, frame, view),
            _ => self.seek(frame, view),
        }
    }

    fn seek(&mut self, frame: &Frame, view: ViewSize) -> Step {
        debug!(frame_id = frame.frame_id, "detecting");
        let Some(observation) = self.capability.detect(frame) else {
            return Step {
                transition: Transition::StillSeeking,
                draw: None,
            };
        };

        let rect = geometry::to_pixel_rect(&observation.bounding_box, view);
        let is_moving = geometry::is_moving(&rect, view, self.motion_threshold_px);
        info!(
            frame_id = frame.frame_id,
            confidence = observation.confidence,
            distance = geometry::center_distance(&rect, view),
            is_moving,
            "person acquired"
        );

        self.state.lock(observation.bounding_box, is_moving);
        let stroke = if is_moving {
            StrokeKind::Moving
        } else {
            StrokeKind::Stationary
        };
        Step {
            transition: Transition::Acquired,
            draw: Some(DrawInstruction { rect, stroke }),
        }
    }

    fn follow(&mut self, previous: NormalizedRect, frame: &Frame, view: ViewSize) -> Step {
        debug!(frame_id = frame.frame_id, "tracking");
        match self.capability.track(&previous, frame) {
            Some(observation) => {
                self.state.last_box = Some(observation.bounding_box);
                Step {
                    transition: Transition::Followed,
                    draw: Some(DrawInstruction {
                        rect: geometry::to_pixel_rect(&previous, view),
                        stroke: StrokeKind::Tracked,
                    }),
                }
            }
            None => {
                info!(frame_id = frame.frame_id, "person lost");
                self.state.reset();
                Step {
                    transition: Transition::Lost,
                    draw: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::backends::scripted::ScriptedCapability;
    use crate::core_modules::geometry::PixelRect;
    use crate::core_modules::observation::PersonObservation;
    use crate::error::CapabilityError;

    const VIEW: ViewSize = ViewSize {
        width: 1000.0,
        height: 1000.0,
    };

    fn frame(frame_id: u64) -> Frame {
        Frame::new(frame_id, 1, 1, vec![0u8; 4])
    }

    fn observation(x: f64, y: f64, w: f64, h: f64) -> PersonObservation {
        PersonObservation::new(0.9, NormalizedRect::new(x, y, w, h).expect("valid rect"))
    }

    #[test]
    fn starts_seeking_with_no_box() {
        let machine = SessionMachine::new(ScriptedCapability::new(), 50.0);
        assert_eq!(*machine.state(), SessionState::default());
        assert_eq!(machine.state().mode(), Mode::Seeking);
        assert!(machine.state().last_box().is_none());
        assert!(!machine.state().is_moving());
    }

    #[test]
    fn acquisition_draws_detected_box() {
        let detected = observation(0.05, 0.05, 0.1, 0.1);
        let capability = ScriptedCapability::new().then_detect(Ok(detected));
        let mut machine = SessionMachine::new(capability, 50.0);

        let step = machine.advance(&frame(0), VIEW);
        assert_eq!(step.transition, Transition::Acquired);
        let draw = step.draw.expect("acquisition draws");
        assert_eq!(draw.stroke, StrokeKind::Moving);
        assert_eq!(
            draw.rect,
            PixelRect { x: 50.0, y: 50.0, width: 100.0, height: 100.0 }
        );
        assert_eq!(machine.state().last_box(), Some(detected.bounding_box));
    }

    #[test]
    fn tracking_draws_previous_box_and_keeps_motion_flag() {
        let first = observation(0.05, 0.05, 0.1, 0.1);
        let centered = observation(0.4, 0.4, 0.2, 0.2);
        let capability = ScriptedCapability::new()
            .then_detect(Ok(first))
            .then_track(Ok(centered));
        let mut machine = SessionMachine::new(capability, 50.0);

        machine.advance(&frame(0), VIEW);
        let step = machine.advance(&frame(1), VIEW);

        assert_eq!(step.transition, Transition::Followed);
        let draw = step.draw.expect("tracking draws");
        assert_eq!(draw.stroke, StrokeKind::Tracked);
        assert_eq!(draw.rect, geometry::to_pixel_rect(&first.bounding_box, VIEW));
        // The tracked box is now centered, yet the flag from detection stands.
        assert!(machine.state().is_moving());
        assert_eq!(machine.state().last_box(), Some(centered.bounding_box));
        assert_eq!(machine.capability().tracked_from, vec![first.bounding_box]);
    }

    #[test]
    fn tracking_feeds_latest_box_forward() {
        let a = observation(0.1, 0.1, 0.2, 0.2);
        let b = observation(0.15, 0.1, 0.2, 0.2);
        let c = observation(0.2, 0.1, 0.2, 0.2);
        let capability = ScriptedCapability::new()
            .then_detect(Ok(a))
            .then_track(Ok(b))
            .then_track(Ok(c));
        let mut machine = SessionMachine::new(capability, 50.0);

        machine.advance(&frame(0), VIEW);
        machine.advance(&frame(1), VIEW);
        let step = machine.advance(&frame(2), VIEW);

        assert_eq!(
            machine.capability().tracked_from,
            vec![a.bounding_box, b.bounding_box]
        );
        assert_eq!(
            step.draw.map(|d| d.rect),
            Some(geometry::to_pixel_rect(&b.bounding_box, VIEW))
        );
    }

    #[test]
    fn loss_resets_everything() {
        let capability = ScriptedCapability::new()
            .then_detect(Ok(observation(0.05, 0.05, 0.1, 0.1)))
            .then_track(Err(CapabilityError::NoObservation));
        let mut machine = SessionMachine::new(capability, 50.0);

        machine.advance(&frame(0), VIEW);
        assert!(machine.state().is_moving());
        let step = machine.advance(&frame(1), VIEW);

        assert_eq!(step, Step { transition: Transition::Lost, draw: None });
        assert_eq!(*machine.state(), SessionState::default());
    }

    #[test]
    fn detects_again_after_loss() {
        let capability = ScriptedCapability::new()
            .then_detect(Ok(observation(0.4, 0.4, 0.2, 0.2)))
            .then_track(Err(CapabilityError::InferenceUnavailable("gpu reset".into())))
            .then_detect(Ok(observation(0.4, 0.4, 0.2, 0.2)));
        let mut machine = SessionMachine::new(capability, 50.0);

        let transitions: Vec<Transition> = (0..3)
            .map(|i| machine.advance(&frame(i), VIEW).transition)
            .collect();
        assert_eq!(
            transitions,
            vec![Transition::Acquired, Transition::Lost, Transition::Acquired]
        );
        assert_eq!(machine.capability().detect_calls, 2);
        assert_eq!(machine.capability().track_calls, 1);
    }

    #[test]
    fn uses_the_configured_threshold() {
        // Center (600, 500) is 100px from the view center.
        let off_center = observation(0.55, 0.45, 0.1, 0.1);
        let mut lenient = SessionMachine::new(
            ScriptedCapability::new().always_detect(off_center),
            150.0,
        );
        let mut strict = SessionMachine::new(
            ScriptedCapability::new().always_detect(off_center),
            50.0,
        );
        lenient.advance(&frame(0), VIEW);
        strict.advance(&frame(0), VIEW);
        assert!(!lenient.state().is_moving());
        assert!(strict.state().is_moving());
    }
}
