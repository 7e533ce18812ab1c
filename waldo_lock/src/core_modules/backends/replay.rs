// THEORY:
// `ReplayCapability` stands in for an inference service whose answers were captured
// ahead of time. Detection reads the recorded, labelled outputs of an external
// model for the frame being processed and picks the person from them exactly as a
// live backend would. Tracking needs the pixels of consecutive frames, so it is
// done live by a `TemplateTracker`.
//
// Recording format (JSON):
//
//     {
//       "frames": { "0": [ { "label": "person", "confidence": 0.9, "bbox": [x, y, w, h] } ] },
//       "failed_frames": [12, 13]
//     }
//
// Frames listed in `failed_frames` behave as if the model could not run.

use crate::config::TrackerConfig;
use crate::core_modules::backends::template_tracker::TemplateTracker;
use crate::core_modules::capability::{PersonCapability, select_person};
use crate::core_modules::geometry::NormalizedRect;
use crate::core_modules::observation::{Frame, LabeledObservation, PersonObservation};
use crate::error::{CapabilityError, PipelineResult};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;

/// Model outputs captured per frame id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Recording {
    pub frames: HashMap<u64, Vec<LabeledObservation>>,
    pub failed_frames: HashSet<u64>,
}

impl Recording {
    pub fn from_json_str(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

pub struct ReplayCapability {
    recording: Recording,
    tracker: TemplateTracker,
}

impl ReplayCapability {
    pub fn new(recording: Recording, tracker_config: TrackerConfig) -> Self {
        Self {
            recording,
            tracker: TemplateTracker::new(tracker_config),
        }
    }
}

impl PersonCapability for ReplayCapability {
    fn try_detect(&mut self, frame: &Frame) -> Result<PersonObservation, CapabilityError> {
        // Detection does not read pixels, but the tracker needs this frame as its
        // reference if a person is found.
        if let Err(e) = self.tracker.remember(frame) {
            warn!(frame_id = frame.frame_id, error = %e, "could not keep tracking reference");
        }
        if self.recording.failed_frames.contains(&frame.frame_id) {
            return Err(CapabilityError::InferenceUnavailable(format!(
                "recorded inference failure on frame {}",
                frame.frame_id
            )));
        }
        self.recording
            .frames
            .get(&frame.frame_id)
            .and_then(|candidates| select_person(candidates))
            .ok_or(CapabilityError::NoObservation)
    }

    fn try_track(
        &mut self,
        previous: &NormalizedRect,
        frame: &Frame,
    ) -> Result<PersonObservation, CapabilityError> {
        self.tracker.locate(previous, frame)
    }
}
