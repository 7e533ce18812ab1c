// THEORY:
// This file is the main entry point for the `waldo_lock` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (like the `lock_tester` driver).
//
// The engine locks onto a single person in a video stream. It detects until it
// finds someone, then switches to cheap frame-to-frame tracking of that person's
// box, and classifies them as moving or stationary relative to the view center.
// `PersonPipeline` is the synchronous, single-threaded interface; `spawn_session`
// wraps it in a task that accepts frames from any thread. The detection backend is
// injected through the `PersonCapability` trait and the display through
// `RenderSurface`.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod session_actor;

pub use config::{PipelineConfig, TrackerConfig};
pub use core_modules::capability::{PersonCapability, select_person};
pub use core_modules::observation::{Frame, LabeledObservation};
pub use core_modules::overlay::{RenderSurface, paint_instruction};
pub use core_modules::session::{SessionState, Transition};
pub use error::{CapabilityError, PipelineError, PipelineResult};
pub use pipeline::{FrameReport, PersonPipeline, PipelineStats};
pub use session_actor::{FrameSender, SessionHandle, SessionSummary, spawn_session};
