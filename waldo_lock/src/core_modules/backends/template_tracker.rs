// THEORY:
// The `TemplateTracker` is a model-free, short-horizon tracker. It follows an object
// from one frame to the next by appearance alone: the patch under the previous box
// in the previous frame is the template, and the new position is wherever that
// patch fits best in a window around the old box.
//
// Key architectural principles:
// 1.  **One Frame of Memory**: The tracker keeps exactly one luma image, the last
//     frame it was shown. Both `remember` (called while detecting) and a successful
//     `locate` refresh it, so the template always comes from the frame immediately
//     before the one being searched.
// 2.  **Bounded Search**: Candidates are limited to offsets within `search_margin`
//     of the box size. The object is assumed to move less than that between frames;
//     anything further is a loss, and the caller falls back to detection.
// 3.  **Bounded Cost**: The score is the mean absolute luma difference over a
//     sampled grid of the template. The grid is never finer than `sample_step` and
//     is coarsened for large boxes so at most `MAX_TEMPLATE_SAMPLES` pixels are
//     compared. Offsets are searched coarse-to-fine: a sparse grid over the whole
//     window first, then repeated halving of the spacing around the best offset
//     down to one pixel. The number of scored offsets stays roughly constant
//     regardless of the box size.
// 4.  **Confidence from Residual**: Confidence is `1 - mean_difference / 255`, so a
//     perfect match is 1.0 and a match against an unrelated patch drops quickly.

use crate::config::TrackerConfig;
use crate::core_modules::geometry::NormalizedRect;
use crate::core_modules::observation::{Frame, PersonObservation};
use crate::error::CapabilityError;
use image::GrayImage;
use tracing::debug;

/// Upper bound on template pixels compared per candidate offset.
pub const MAX_TEMPLATE_SAMPLES: i64 = 1024;
/// Coarse offsets tried on each side of zero, per axis, before refinement.
const COARSE_OFFSETS_PER_SIDE: i64 = 8;

pub struct TemplateTracker {
    config: TrackerConfig,
    reference: Option<GrayImage>,
    last_search: Option<SearchCost>,
}

/// A box in integer pixel coordinates of the reference frame.
#[derive(Debug, Clone, Copy)]
struct Window {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
}

impl TemplateTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            reference: None,
            last_search: None,
        }
    }

    /// Stores `frame` as the reference for the next `locate`.
    pub fn remember(&mut self, frame: &Frame) -> Result<(), CapabilityError> {
        self.reference = Some(to_luma(frame)?);
        Ok(())
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Finds the object that occupied `previous` in the reference frame within
    /// `frame`. On success `frame` becomes the new reference.
    pub fn locate(
        &mut self,
        previous: &NormalizedRect,
        frame: &Frame,
    ) -> Result<PersonObservation, CapabilityError> {
        let current = to_luma(frame)?;
        let reference = self.reference.take().ok_or_else(|| {
            CapabilityError::InferenceUnavailable("no reference frame to track from".into())
        })?;
        if reference.dimensions() != current.dimensions() {
            return Err(CapabilityError::InferenceUnavailable(format!(
                "frame size changed from {:?} to {:?}",
                reference.dimensions(),
                current.dimensions()
            )));
        }

        let (frame_w, frame_h) = current.dimensions();
        let x = (previous.x() * frame_w as f64).round() as i64;
        let y = (previous.y() * frame_h as f64).round() as i64;
        // Rounding can push a box that touches the right or bottom edge one pixel out.
        let template = Window {
            x,
            y,
            width: ((previous.width() * frame_w as f64).round() as i64).min(i64::from(frame_w) - x),
            height: ((previous.height() * frame_h as f64).round() as i64)
                .min(i64::from(frame_h) - y),
        };
        if template.width < 1 || template.height < 1 {
            return Err(CapabilityError::DegenerateInput(format!(
                "box {previous:?} covers less than one pixel"
            )));
        }

        let search = Search {
            reference: &reference,
            current: &current,
            template,
            stride: sample_stride(&template, self.config.sample_step),
            reach_x: (template.width as f64 * self.config.search_margin).round() as i64,
            reach_y: (template.height as f64 * self.config.search_margin).round() as i64,
        };
        let (best, cost) = search.run();
        self.last_search = Some(cost);

        let (score, dx, dy) = best.ok_or_else(|| {
            CapabilityError::DegenerateInput(format!("box {previous:?} does not fit in the frame"))
        })?;
        let confidence = (1.0 - score / 255.0) as f32;
        debug!(
            frame_id = frame.frame_id,
            dx,
            dy,
            confidence,
            candidates = cost.candidates,
            samples = cost.samples_per_candidate,
            "template match"
        );
        if confidence < self.config.min_confidence {
            return Err(CapabilityError::NoObservation);
        }

        let bounding_box = NormalizedRect::clamped(
            previous.x() + dx as f64 / frame_w as f64,
            previous.y() + dy as f64 / frame_h as f64,
            previous.width(),
            previous.height(),
        )
        .ok_or_else(|| CapabilityError::DegenerateInput("tracked box left the frame".into()))?;

        self.reference = Some(current);
        Ok(PersonObservation::new(confidence, bounding_box))
    }

    /// Work done by the most recent `locate` that got as far as searching.
    pub fn last_search(&self) -> Option<SearchCost> {
        self.last_search
    }
}

/// How much matching one `locate` call performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCost {
    /// Offsets that were scored.
    pub candidates: u32,
    /// Template pixels compared per scored offset.
    pub samples_per_candidate: u32,
}

struct Search<'a> {
    reference: &'a GrayImage,
    current: &'a GrayImage,
    template: Window,
    stride: i64,
    reach_x: i64,
    reach_y: i64,
}

impl Search<'_> {
    /// Scores a coarse grid of offsets, then halves the spacing around the best
    /// one until it reaches a single pixel. Returns `(score, dx, dy)`.
    fn run(&self) -> (Option<(f64, i64, i64)>, SearchCost) {
        let mut best: Option<(f64, i64, i64)> = None;
        let mut candidates = 0u32;
        let mut consider = |dx: i64, dy: i64, best: &mut Option<(f64, i64, i64)>| {
            if dx.abs() > self.reach_x || dy.abs() > self.reach_y {
                return;
            }
            let candidate = Window {
                x: self.template.x + dx,
                y: self.template.y + dy,
                ..self.template
            };
            if !fits(&candidate, self.current.width(), self.current.height()) {
                return;
            }
            candidates += 1;
            let score = mean_abs_diff(
                self.reference,
                self.current,
                &self.template,
                &candidate,
                self.stride,
            );
            // Prefer the smallest displacement among equal scores.
            let better = match *best {
                None => true,
                Some((s, bx, by)) => {
                    score < s || (score == s && dx.abs() + dy.abs() < bx.abs() + by.abs())
                }
            };
            if better {
                *best = Some((score, dx, dy));
            }
        };

        // Multiples of the spacing, so zero displacement is always scored.
        let mut spacing_x = coarse_spacing(self.reach_x);
        let mut spacing_y = coarse_spacing(self.reach_y);
        for ky in -(self.reach_y / spacing_y)..=self.reach_y / spacing_y {
            for kx in -(self.reach_x / spacing_x)..=self.reach_x / spacing_x {
                consider(kx * spacing_x, ky * spacing_y, &mut best);
            }
        }

        while spacing_x > 1 || spacing_y > 1 {
            spacing_x = (spacing_x / 2).max(1);
            spacing_y = (spacing_y / 2).max(1);
            let Some((_, cx, cy)) = best else {
                break;
            };
            for sy in [-1, 0, 1] {
                for sx in [-1, 0, 1] {
                    if sx != 0 || sy != 0 {
                        consider(cx + sx * spacing_x, cy + sy * spacing_y, &mut best);
                    }
                }
            }
        }

        let cost = SearchCost {
            candidates,
            samples_per_candidate: sample_count(&self.template, self.stride) as u32,
        };
        (best, cost)
    }
}

/// Widest power-of-two spacing that keeps the coarse grid at most
/// `2 * COARSE_OFFSETS_PER_SIDE + 1` offsets across.
fn coarse_spacing(reach: i64) -> i64 {
    let needed = (reach + COARSE_OFFSETS_PER_SIDE - 1) / COARSE_OFFSETS_PER_SIDE;
    (needed.max(1) as u64).next_power_of_two() as i64
}

/// Smallest stride, no finer than `sample_step`, that keeps the template at or
/// under `MAX_TEMPLATE_SAMPLES` compared pixels.
fn sample_stride(template: &Window, sample_step: u32) -> i64 {
    let mut stride = i64::from(sample_step.max(1));
    while sample_count(template, stride) > MAX_TEMPLATE_SAMPLES {
        stride += 1;
    }
    stride
}

fn sample_count(template: &Window, stride: i64) -> i64 {
    let across = (template.width + stride - 1) / stride;
    let down = (template.height + stride - 1) / stride;
    across * down
}

fn to_luma(frame: &Frame) -> Result<GrayImage, CapabilityError> {
    let rgba = frame.to_rgba_image().ok_or_else(|| {
        CapabilityError::InferenceUnavailable(format!(
            "frame {} buffer does not match {}x{}",
            frame.frame_id, frame.width, frame.height
        ))
    })?;
    Ok(image::imageops::grayscale(&rgba))
}

fn fits(window: &Window, frame_w: u32, frame_h: u32) -> bool {
    window.x >= 0
        && window.y >= 0
        && window.x + window.width <= i64::from(frame_w)
        && window.y + window.height <= i64::from(frame_h)
}

fn mean_abs_diff(
    reference: &GrayImage,
    current: &GrayImage,
    template: &Window,
    candidate: &Window,
    stride: i64,
) -> f64 {
    let mut total = 0u64;
    let mut count = 0u64;
    let mut oy = 0;
    while oy < template.height {
        let mut ox = 0;
        while ox < template.width {
            let a = reference.get_pixel((template.x + ox) as u32, (template.y + oy) as u32)[0];
            let b = current.get_pixel((candidate.x + ox) as u32, (candidate.y + oy) as u32)[0];
            total += u64::from(a.abs_diff(b));
            count += 1;
            ox += stride;
        }
        oy += stride;
    }
    if count == 0 {
        return 255.0;
    }
    total as f64 / count as f64
}
