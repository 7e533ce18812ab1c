// THEORY:
// The `capability` module is the single seam between the engine and whatever
// machine-learning backend actually looks at pixels. The engine only ever asks two
// questions: "where is a person in this frame?" and "where did the person in this
// box go?".
//
// Key architectural principles:
// 1.  **Polymorphic Boundary**: `PersonCapability` is a trait. An on-device model, a
//     remote inference service, a recording, or a test script can all stand behind
//     it without the state machine noticing.
// 2.  **Errors Stop Here**: Backends implement the fallible primitives `try_detect`
//     and `try_track`. The provided `detect` and `track` methods are what the state
//     machine calls, and they fold every error into `None`. A failed inference is
//     just a frame with no observation; the next frame is the retry.
// 3.  **Input Hygiene**: `track` refuses degenerate boxes before a backend ever sees
//     them, so backends may assume a prior box with positive area.

use crate::core_modules::geometry::NormalizedRect;
use crate::core_modules::observation::{Frame, LabeledObservation, PersonObservation};
use crate::error::CapabilityError;
use tracing::{debug, warn};

/// A detection and tracking backend.
pub trait PersonCapability {
    /// Full-frame inference for the single most confident person.
    fn try_detect(&mut self, frame: &Frame) -> Result<PersonObservation, CapabilityError>;

    /// Short-horizon tracking of the object last seen at `previous`.
    fn try_track(
        &mut self,
        previous: &NormalizedRect,
        frame: &Frame,
    ) -> Result<PersonObservation, CapabilityError>;

    fn detect(&mut self, frame: &Frame) -> Option<PersonObservation> {
        match self.try_detect(frame) {
            Ok(observation) => Some(observation),
            Err(e) => {
                log_failure("detect", frame.frame_id, &e);
                None
            }
        }
    }

    fn track(&mut self, previous: &NormalizedRect, frame: &Frame) -> Option<PersonObservation> {
        if previous.is_degenerate() {
            let e = CapabilityError::DegenerateInput(format!("zero-area box {previous:?}"));
            log_failure("track", frame.frame_id, &e);
            return None;
        }
        match self.try_track(previous, frame) {
            Ok(observation) => Some(observation),
            Err(e) => {
                log_failure("track", frame.frame_id, &e);
                None
            }
        }
    }
}

impl<C: PersonCapability + ?Sized> PersonCapability for Box<C> {
    fn try_detect(&mut self, frame: &Frame) -> Result<PersonObservation, CapabilityError> {
        (**self).try_detect(frame)
    }

    fn try_track(
        &mut self,
        previous: &NormalizedRect,
        frame: &Frame,
    ) -> Result<PersonObservation, CapabilityError> {
        (**self).try_track(previous, frame)
    }
}

fn log_failure(operation: &str, frame_id: u64, error: &CapabilityError) {
    match error {
        CapabilityError::NoObservation => debug!(frame_id, operation, "no observation"),
        _ => warn!(frame_id, operation, %error, "capability failed"),
    }
}

/// Picks the most confident candidate labelled as a person. On equal confidence
/// the earlier candidate wins.
pub fn select_person(candidates: &[LabeledObservation]) -> Option<PersonObservation> {
    candidates
        .iter()
        .filter(|c| c.is_person())
        .fold(None::<&LabeledObservation>, |best, c| match best {
            Some(b) if b.confidence >= c.confidence => Some(b),
            _ => Some(c),
        })
        .map(|c| PersonObservation::new(c.confidence, c.bounding_box))
}
