// THEORY:
// The `pipeline` module is the top-level, synchronous API of the engine. It wires
// the session state machine to the overlay adapter so that a caller only has to
// push frames in and read reports out.
//
// Each call to `process_frame` runs the whole chain for one frame:
//   capability (detect or track) → state machine → geometry → overlay adapter
// and returns a `FrameReport` describing what happened. The pipeline is not
// thread-safe by itself; `session_actor` is what serializes access when frames
// arrive from another thread.

use crate::config::PipelineConfig;
use crate::core_modules::capability::PersonCapability;
use crate::core_modules::geometry::ViewSize;
use crate::core_modules::observation::Frame;
use crate::core_modules::overlay::{OverlayAdapter, RenderSurface};
use crate::core_modules::session::{SessionMachine, SessionState, Transition};
use std::time::Duration;

// Re-export key data structures for the public API.
pub use crate::core_modules::geometry::{NormalizedRect, PixelRect};
pub use crate::core_modules::observation::PersonObservation;
pub use crate::core_modules::overlay::{DrawInstruction, StrokeKind};
pub use crate::core_modules::session::Mode;

/// What happened while processing a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_id: u64,
    pub transition: Transition,
    /// Mode after the frame was processed.
    pub mode: Mode,
    pub is_moving: bool,
    pub draw: Option<DrawInstruction>,
    /// Time from capture (`Frame::timestamp`) until the overlay was updated,
    /// including any wait for the session to pick the frame up.
    pub latency: Duration,
}

/// Running counters over the lifetime of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub acquisitions: u64,
    pub losses: u64,
    pub overlays_drawn: u64,
}

impl PipelineStats {
    fn record(&mut self, report: &FrameReport) {
        self.frames_processed += 1;
        match report.transition {
            Transition::Acquired => self.acquisitions += 1,
            Transition::Lost => self.losses += 1,
            Transition::StillSeeking | Transition::Followed => {}
        }
        if report.draw.is_some() {
            self.overlays_drawn += 1;
        }
    }
}

/// The main, top-level struct for the person lock engine.
pub struct PersonPipeline<C, S: RenderSurface> {
    machine: SessionMachine<C>,
    overlay: OverlayAdapter<S>,
    view: ViewSize,
    stats: PipelineStats,
}

impl<C: PersonCapability, S: RenderSurface> PersonPipeline<C, S> {
    pub fn new(config: &PipelineConfig, capability: C, surface: S) -> Self {
        Self {
            machine: SessionMachine::new(capability, config.motion_threshold_px),
            overlay: OverlayAdapter::new(surface),
            view: ViewSize::new(config.view_width, config.view_height),
            stats: PipelineStats::default(),
        }
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        let step = self.machine.advance(frame, self.view);
        self.overlay.apply(step.draw.as_ref());
        self.overlay.present(frame);

        let state = self.machine.state();
        let report = FrameReport {
            frame_id: frame.frame_id,
            transition: step.transition,
            mode: state.mode(),
            is_moving: state.is_moving(),
            draw: step.draw,
            latency: frame.timestamp.elapsed(),
        };
        self.stats.record(&report);
        report
    }

    /// The display was resized; later frames are mapped onto the new size.
    pub fn set_view(&mut self, view: ViewSize) {
        self.view = view;
    }

    pub fn state(&self) -> &SessionState {
        self.machine.state()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn capability(&self) -> &C {
        self.machine.capability()
    }

    pub fn surface(&self) -> &S {
        self.overlay.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.overlay.surface_mut()
    }
}
