// THEORY:
// The data that crosses the capability boundary. A `Frame` goes in, a
// `PersonObservation` (or nothing) comes out. Both are short-lived: an
// observation is consumed by the state machine on the frame it was produced for
// and then discarded.
//
// The pixel payload of a `Frame` is reference counted. A frame is handed from the
// capture thread to the session task and possibly kept by a tracker as its
// reference image; none of these hand-offs copy the pixels.

use crate::core_modules::geometry::NormalizedRect;
use image::RgbaImage;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

pub const PERSON_LABEL: &str = "person";

/// A single RGBA video frame. The engine treats the pixel data as opaque; only
/// backends look inside.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_id: u64,
    pub timestamp: Instant,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows, `width * height * 4` bytes.
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(frame_id: u64, width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            frame_id,
            timestamp: Instant::now(),
            width,
            height,
            data: data.into(),
        }
    }

    pub fn from_rgba(frame_id: u64, image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(frame_id, width, height, image.into_raw())
    }

    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.to_vec())
    }
}

/// A single inference result for the tracked person.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonObservation {
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub bounding_box: NormalizedRect,
}

impl PersonObservation {
    pub fn new(confidence: f32, bounding_box: NormalizedRect) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box,
        }
    }
}

/// One raw object reported by an external model, before person selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabeledObservation {
    pub label: String,
    pub confidence: f32,
    #[serde(rename = "bbox")]
    pub bounding_box: NormalizedRect,
}

impl LabeledObservation {
    pub fn is_person(&self) -> bool {
        self.label == PERSON_LABEL
    }
}
