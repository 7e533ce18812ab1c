// A deterministic capability driven by queued results. Used by the test suites and
// for dry runs where no model is available.

use crate::core_modules::capability::PersonCapability;
use crate::core_modules::geometry::NormalizedRect;
use crate::core_modules::observation::{Frame, PersonObservation};
use crate::error::CapabilityError;
use std::collections::VecDeque;

type Outcome = Result<PersonObservation, CapabilityError>;

/// What `try_track` answers once its script is exhausted.
#[derive(Debug, Clone)]
enum TrackFallback {
    Fixed(Outcome),
    /// Report the prior box back unchanged.
    Follow,
}

/// Replays queued detect/track outcomes in order. Once a queue is empty, the
/// matching fallback is returned on every call.
#[derive(Debug, Clone)]
pub struct ScriptedCapability {
    detect_script: VecDeque<Outcome>,
    track_script: VecDeque<Outcome>,
    detect_fallback: Outcome,
    track_fallback: TrackFallback,
    /// Number of `try_detect` calls so far.
    pub detect_calls: usize,
    /// Number of `try_track` calls so far.
    pub track_calls: usize,
    /// Prior boxes passed to `try_track`, in call order.
    pub tracked_from: Vec<NormalizedRect>,
}

impl Default for ScriptedCapability {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCapability {
    /// A capability that never observes anything.
    pub fn new() -> Self {
        Self {
            detect_script: VecDeque::new(),
            track_script: VecDeque::new(),
            detect_fallback: Err(CapabilityError::NoObservation),
            track_fallback: TrackFallback::Fixed(Err(CapabilityError::NoObservation)),
            detect_calls: 0,
            track_calls: 0,
            tracked_from: Vec::new(),
        }
    }

    /// Detects `observation` on every frame once the script is exhausted.
    pub fn always_detect(mut self, observation: PersonObservation) -> Self {
        self.detect_fallback = Ok(observation);
        self
    }

    /// Tracking keeps the target where it was once the script is exhausted.
    pub fn always_follow(mut self) -> Self {
        self.track_fallback = TrackFallback::Follow;
        self
    }

    pub fn then_detect(mut self, outcome: Outcome) -> Self {
        self.detect_script.push_back(outcome);
        self
    }

    pub fn then_track(mut self, outcome: Outcome) -> Self {
        self.track_script.push_back(outcome);
        self
    }
}

impl PersonCapability for ScriptedCapability {
    fn try_detect(&mut self, _frame: &Frame) -> Outcome {
        self.detect_calls += 1;
        self.detect_script
            .pop_front()
            .unwrap_or_else(|| self.detect_fallback.clone())
    }

    fn try_track(&mut self, previous: &NormalizedRect, _frame: &Frame) -> Outcome {
        self.track_calls += 1;
        self.tracked_from.push(*previous);
        if let Some(outcome) = self.track_script.pop_front() {
            return outcome;
        }
        match &self.track_fallback {
            TrackFallback::Fixed(outcome) => outcome.clone(),
            TrackFallback::Follow => Ok(PersonObservation::new(1.0, *previous)),
        }
    }
}
