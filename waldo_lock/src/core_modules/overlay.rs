// THEORY:
// The `overlay` module is the output edge of the engine. The state machine decides
// *what* should be on screen; this module makes sure the screen shows exactly that
// and nothing stale.
//
// Key architectural principles:
// 1.  **One Overlay at a Time**: `OverlayAdapter` owns the only handle to the overlay
//     currently on screen. Every frame it removes that overlay first and then draws
//     the new one, if any. A frame without an instruction therefore clears the
//     screen.
// 2.  **Surface Agnostic**: Anything that can draw a stroked rectangle and later
//     remove it can be a `RenderSurface`: a UI layer tree, an image writer, or an
//     in-memory log for tests.
// 3.  **Shared Rasterisation**: Surfaces that burn overlays into images share
//     `OverlayLayers` for bookkeeping and `paint_instruction` for drawing.

use crate::core_modules::geometry::PixelRect;
use crate::core_modules::observation::Frame;
use image::{Rgba, RgbaImage};

/// How the overlay rectangle is stroked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrokeKind {
    /// Freshly detected, close to the view center.
    Stationary,
    /// Freshly detected, away from the view center.
    Moving,
    /// Following a previously detected person.
    Tracked,
}

impl StrokeKind {
    pub fn color(&self) -> Rgba<u8> {
        match self {
            StrokeKind::Stationary => Rgba([0, 255, 0, 255]),
            StrokeKind::Moving => Rgba([255, 0, 0, 255]),
            StrokeKind::Tracked => Rgba([0, 0, 255, 255]),
        }
    }
}

/// A rectangle to draw in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInstruction {
    pub rect: PixelRect,
    pub stroke: StrokeKind,
}

/// Something the overlay can be drawn on.
pub trait RenderSurface {
    /// Handle to a drawn overlay, used to remove it later.
    type Overlay;

    fn draw(&mut self, instruction: &DrawInstruction) -> Self::Overlay;

    fn remove(&mut self, overlay: Self::Overlay);

    /// Called once per frame after the overlay has been updated.
    fn present(&mut self, _frame: &Frame) {}
}

/// Keeps at most one overlay visible on a surface.
pub struct OverlayAdapter<S: RenderSurface> {
    surface: S,
    current: Option<S::Overlay>,
}

impl<S: RenderSurface> OverlayAdapter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            current: None,
        }
    }

    /// Replaces whatever is on screen with `instruction`.
    pub fn apply(&mut self, instruction: Option<&DrawInstruction>) {
        if let Some(previous) = self.current.take() {
            self.surface.remove(previous);
        }
        if let Some(instruction) = instruction {
            self.current = Some(self.surface.draw(instruction));
        }
    }

    pub fn present(&mut self, frame: &Frame) {
        self.surface.present(frame);
    }

    pub fn is_showing(&self) -> bool {
        self.current.is_some()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

pub type OverlayId = u64;

/// Id-keyed list of drawn overlays, for surfaces that composite them later.
#[derive(Debug, Clone, Default)]
pub struct OverlayLayers {
    next_id: OverlayId,
    layers: Vec<(OverlayId, DrawInstruction)>,
}

impl OverlayLayers {
    pub fn add(&mut self, instruction: DrawInstruction) -> OverlayId {
        let id = self.next_id;
        self.next_id += 1;
        self.layers.push((id, instruction));
        id
    }

    pub fn remove(&mut self, id: OverlayId) -> Option<DrawInstruction> {
        let index = self.layers.iter().position(|(layer_id, _)| *layer_id == id)?;
        Some(self.layers.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawInstruction> {
        self.layers.iter().map(|(_, instruction)| instruction)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Draws the instruction's rectangle border into `image`, clipped to its bounds.
pub fn paint_instruction(image: &mut RgbaImage, instruction: &DrawInstruction, thickness: u32) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let rect = &instruction.rect;
    let to_px = |v: f64, max: u32| -> i64 { (v.round() as i64).clamp(-1, i64::from(max)) };
    let x0 = to_px(rect.x, w);
    let y0 = to_px(rect.y, h);
    let x1 = to_px(rect.x + rect.width, w) - 1;
    let y1 = to_px(rect.y + rect.height, h) - 1;
    let color = instruction.stroke.color();

    let mut put = |x: i64, y: i64| {
        if x >= 0 && y >= 0 && x < i64::from(w) && y < i64::from(h) {
            image.put_pixel(x as u32, y as u32, color);
        }
    };

    for t in 0..i64::from(thickness) {
        let (xx0, yy0, xx1, yy1) = (x0 + t, y0 + t, x1 - t, y1 - t);
        if xx0 > xx1 || yy0 > yy1 {
            break;
        }
        for x in xx0..=xx1 {
            put(x, yy0);
            put(x, yy1);
        }
        for y in yy0..=yy1 {
            put(xx0, y);
            put(xx1, y);
        }
    }
}

/// Commands received by a `RecordingSurface`.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    Draw(OverlayId, DrawInstruction),
    Remove(OverlayId),
    Present(u64),
}

/// A surface that only remembers what it was told to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub layers: OverlayLayers,
    pub commands: Vec<SurfaceCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of overlays drawn so far.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::Draw(..)))
            .count()
    }
}

impl RenderSurface for RecordingSurface {
    type Overlay = OverlayId;

    fn draw(&mut self, instruction: &DrawInstruction) -> OverlayId {
        let id = self.layers.add(*instruction);
        self.commands.push(SurfaceCommand::Draw(id, *instruction));
        id
    }

    fn remove(&mut self, overlay: OverlayId) {
        self.layers.remove(overlay);
        self.commands.push(SurfaceCommand::Remove(overlay));
    }

    fn present(&mut self, frame: &Frame) {
        self.commands.push(SurfaceCommand::Present(frame.frame_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(x: f64, stroke: StrokeKind) -> DrawInstruction {
        DrawInstruction {
            rect: PixelRect { x, y: 2.0, width: 6.0, height: 4.0 },
            stroke,
        }
    }

    #[test]
    fn removes_before_drawing() {
        let mut adapter = OverlayAdapter::new(RecordingSurface::new());
        adapter.apply(Some(&instruction(1.0, StrokeKind::Moving)));
        adapter.apply(Some(&instruction(2.0, StrokeKind::Tracked)));

        assert_eq!(
            adapter.surface().commands,
            vec![
                SurfaceCommand::Draw(0, instruction(1.0, StrokeKind::Moving)),
                SurfaceCommand::Remove(0),
                SurfaceCommand::Draw(1, instruction(2.0, StrokeKind::Tracked)),
            ]
        );
        assert_eq!(adapter.surface().layers.len(), 1);
    }

    #[test]
    fn empty_frame_clears_screen() {
        let mut adapter = OverlayAdapter::new(RecordingSurface::new());
        adapter.apply(Some(&instruction(1.0, StrokeKind::Stationary)));
        adapter.apply(None);
        assert!(!adapter.is_showing());
        assert!(adapter.surface().layers.is_empty());

        adapter.apply(None);
        assert_eq!(adapter.surface().commands.len(), 2);
    }

    #[test]
    fn never_more_than_one_layer() {
        let mut adapter = OverlayAdapter::new(RecordingSurface::new());
        let kinds = [StrokeKind::Moving, StrokeKind::Tracked, StrokeKind::Stationary];
        for i in 0..30 {
            let next = (i % 4 != 3).then(|| instruction(i as f64, kinds[i % 3]));
            adapter.apply(next.as_ref());
            assert!(adapter.surface().layers.len() <= 1);
        }
    }

    #[test]
    fn strokes_have_distinct_colors() {
        assert_ne!(StrokeKind::Moving.color(), StrokeKind::Stationary.color());
        assert_ne!(StrokeKind::Moving.color(), StrokeKind::Tracked.color());
        assert_ne!(StrokeKind::Stationary.color(), StrokeKind::Tracked.color());
    }

    #[test]
    fn paints_border_only() {
        let mut image = RgbaImage::new(12, 10);
        paint_instruction(&mut image, &instruction(2.0, StrokeKind::Stationary), 1);
        let green = StrokeKind::Stationary.color();
        // Rect spans x 2..=7, y 2..=5.
        assert_eq!(*image.get_pixel(2, 2), green);
        assert_eq!(*image.get_pixel(7, 5), green);
        assert_eq!(*image.get_pixel(2, 4), green);
        assert_ne!(*image.get_pixel(4, 3), green);
        assert_ne!(*image.get_pixel(8, 2), green);
    }

    #[test]
    fn painting_clips_to_image() {
        let mut image = RgbaImage::new(8, 8);
        let oversized = DrawInstruction {
            rect: PixelRect { x: -5.0, y: 3.0, width: 40.0, height: 40.0 },
            stroke: StrokeKind::Moving,
        };
        paint_instruction(&mut image, &oversized, 4);
        assert_eq!(*image.get_pixel(3, 3), StrokeKind::Moving.color());
    }
}
