// A render surface that burns the current overlay into each frame and writes the
// result out as a PNG.

use std::path::PathBuf;
use tracing::warn;
use waldo_lock::core_modules::overlay::{DrawInstruction, OverlayId, OverlayLayers};
use waldo_lock::{Frame, RenderSurface, paint_instruction};

pub struct PngSurface {
    output_dir: PathBuf,
    stroke_width: u32,
    layers: OverlayLayers,
    pub frames_written: u64,
}

impl PngSurface {
    pub fn new(output_dir: PathBuf, stroke_width: u32) -> Self {
        Self {
            output_dir,
            stroke_width,
            layers: OverlayLayers::default(),
            frames_written: 0,
        }
    }
}

impl RenderSurface for PngSurface {
    type Overlay = OverlayId;

    fn draw(&mut self, instruction: &DrawInstruction) -> OverlayId {
        self.layers.add(*instruction)
    }

    fn remove(&mut self, overlay: OverlayId) {
        self.layers.remove(overlay);
    }

    fn present(&mut self, frame: &Frame) {
        let Some(mut image) = frame.to_rgba_image() else {
            warn!(frame_id = frame.frame_id, "frame buffer is malformed, not written");
            return;
        };
        for instruction in self.layers.iter() {
            paint_instruction(&mut image, instruction, self.stroke_width);
        }
        let path = self.output_dir.join(format!("frame_{:06}.png", frame.frame_id));
        match image.save(&path) {
            Ok(()) => self.frames_written += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to write frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use waldo_lock::core_modules::geometry::PixelRect;
    use waldo_lock::core_modules::overlay::{OverlayAdapter, StrokeKind};

    #[test]
    fn writes_frames_with_current_overlay() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut adapter = OverlayAdapter::new(PngSurface::new(dir.path().to_path_buf(), 2));
        let frame = Frame::from_rgba(3, RgbaImage::new(20, 20));

        adapter.apply(Some(&DrawInstruction {
            rect: PixelRect { x: 5.0, y: 5.0, width: 10.0, height: 10.0 },
            stroke: StrokeKind::Tracked,
        }));
        adapter.present(&frame);

        let written = image::open(dir.path().join("frame_000003.png"))
            .expect("frame written")
            .to_rgba8();
        assert_eq!(*written.get_pixel(5, 5), StrokeKind::Tracked.color());
        assert_eq!(*written.get_pixel(6, 10), StrokeKind::Tracked.color());
        assert_eq!(*written.get_pixel(10, 10), image::Rgba([0, 0, 0, 0]));
        assert_eq!(adapter.surface().frames_written, 1);
    }
}
