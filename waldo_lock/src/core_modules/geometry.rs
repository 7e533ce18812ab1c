// THEORY:
// The `geometry` module is the leaf of the engine. It owns the two coordinate
// spaces the rest of the system talks in and the single decision that is made
// purely from geometry: "is the person away from the middle of the view?"
//
// Key architectural principles:
// 1.  **Two Spaces, Two Types**: Backends speak in normalized coordinates (fractions
//     of the frame, origin top-left). The display speaks in pixels. Keeping a
//     distinct type for each makes it impossible to hand a normalized box to code
//     expecting pixels.
// 2.  **Valid by Construction**: A `NormalizedRect` can only be built through a
//     validating constructor, so every box in the system lies inside the unit
//     square and has non-negative extent.
// 3.  **Pure Functions**: Nothing here holds state. The functions are deterministic
//     and cheap enough to run on every frame.

use serde::Deserialize;

/// A bounding box expressed as fractions (0..1) of the frame, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "[f64; 4]")]
pub struct NormalizedRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl NormalizedRect {
    /// Builds a box from `(x, y, width, height)`.
    ///
    /// Returns `None` if any component is non-finite or outside [0, 1]. The
    /// extent is clipped so the box never leaves the unit square.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !(in_unit(x) && in_unit(y) && in_unit(width) && in_unit(height)) {
            return None;
        }
        Some(Self {
            x,
            y,
            width: width.min(1.0 - x),
            height: height.min(1.0 - y),
        })
    }

    /// Like `new`, but pulls out-of-range components back into the unit square
    /// instead of rejecting them. Non-finite input is still rejected.
    pub fn clamped(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return None;
        }
        let x = x.clamp(0.0, 1.0);
        let y = y.clamp(0.0, 1.0);
        Self::new(x, y, width.clamp(0.0, 1.0), height.clamp(0.0, 1.0))
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// A zero-area box cannot be tracked.
    pub fn is_degenerate(&self) -> bool {
        self.area() <= 0.0
    }
}

impl TryFrom<[f64; 4]> for NormalizedRect {
    type Error = String;

    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        let [x, y, width, height] = value;
        Self::new(x, y, width, height)
            .ok_or_else(|| format!("bounding box {value:?} is outside the unit square"))
    }
}

/// A rectangle in view (display) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Dimensions of the display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSize {
    pub width: f64,
    pub height: f64,
}

impl ViewSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// Scales each normalized field by the view dimensions.
pub fn to_pixel_rect(normalized: &NormalizedRect, view: ViewSize) -> PixelRect {
    PixelRect {
        x: normalized.x * view.width,
        y: normalized.y * view.height,
        width: normalized.width * view.width,
        height: normalized.height * view.height,
    }
}

/// Euclidean distance between the rectangle's center and the view's center.
pub fn center_distance(rect: &PixelRect, view: ViewSize) -> f64 {
    let (cx, cy) = rect.center();
    let (vx, vy) = view.center();
    ((cx - vx).powi(2) + (cy - vy).powi(2)).sqrt()
}

/// True iff the rectangle's center is strictly further than `threshold_px`
/// from the view center.
pub fn is_moving(rect: &PixelRect, view: ViewSize, threshold_px: f64) -> bool {
    center_distance(rect, view) > threshold_px
}
