// THEORY:
// Frames are produced by a capture callback on its own thread, but the session
// state and the on-screen overlay must only ever be touched by one consumer. The
// `session_actor` module provides that consumer: a tokio task that owns a
// `PersonPipeline` outright.
//
// Key architectural principles:
// 1.  **Single Owner**: The pipeline is moved into the task. Nothing else holds a
//     reference, so there is nothing to lock.
// 2.  **Latest Frame Wins**: The capture side hands frames over a `watch` channel.
//     Submitting a frame overwrites any frame the task has not picked up yet, so a
//     slow model never builds a backlog; it simply sees fewer frames. Every
//     overwritten frame is counted as dropped.
// 3.  **Blocking Inference Off the Runtime**: Each frame is processed inside
//     `spawn_blocking`. The pipeline is moved into the blocking closure and handed
//     back with the report, so ownership never splits.
// 4.  **Reports as a Stream**: One `FrameReport` per processed frame is delivered on
//     an unbounded channel and can be consumed either directly or as a `Stream`.
// 5.  **Shutdown by Hang-up**: Dropping the `FrameSender` ends the session after the
//     last pending frame. Joining the handle returns the pipeline and a summary.

use crate::core_modules::capability::PersonCapability;
use crate::core_modules::observation::Frame;
use crate::core_modules::overlay::RenderSurface;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{FrameReport, PersonPipeline, PipelineStats};
use futures::Stream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Capture-side handle. Cheap to call from any thread.
pub struct FrameSender {
    frames: watch::Sender<Option<Frame>>,
    submitted: Arc<AtomicU64>,
}

impl FrameSender {
    /// Offers a frame to the session, replacing any frame not yet picked up.
    pub fn submit(&self, frame: Frame) -> PipelineResult<()> {
        self.frames
            .send(Some(frame))
            .map_err(|_| PipelineError::SessionClosed)?;
        self.submitted.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Totals for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_submitted: u64,
    /// Frames overwritten before the session got to them.
    pub frames_dropped: u64,
    pub stats: PipelineStats,
}

type SessionOutput<C, S> = (PersonPipeline<C, S>, SessionSummary);

/// Consumer-side handle for reports and shutdown.
pub struct SessionHandle<C, S: RenderSurface> {
    reports: mpsc::UnboundedReceiver<FrameReport>,
    task: JoinHandle<PipelineResult<SessionOutput<C, S>>>,
}

impl<C, S: RenderSurface> SessionHandle<C, S> {
    pub async fn next_report(&mut self) -> Option<FrameReport> {
        self.reports.recv().await
    }

    /// Reports as a stream; ends once the session has finished.
    pub fn reports(&mut self) -> impl Stream<Item = FrameReport> + '_ {
        futures::stream::unfold(&mut self.reports, |rx| async move {
            rx.recv().await.map(|report| (report, rx))
        })
    }

    /// Waits for the session to end. Only returns after every `FrameSender`
    /// has been dropped.
    pub async fn join(self) -> PipelineResult<SessionOutput<C, S>> {
        self.task.await?
    }
}

/// Moves `pipeline` into a new session task. Must be called inside a tokio runtime.
pub fn spawn_session<C, S>(pipeline: PersonPipeline<C, S>) -> (FrameSender, SessionHandle<C, S>)
where
    C: PersonCapability + Send + 'static,
    S: RenderSurface + Send + 'static,
    S::Overlay: Send + 'static,
{
    let (frames_tx, frames_rx) = watch::channel::<Option<Frame>>(None);
    let (reports_tx, reports_rx) = mpsc::unbounded_channel::<FrameReport>();
    let submitted = Arc::new(AtomicU64::new(0));

    let task = tokio::spawn(run_session(
        pipeline,
        frames_rx,
        reports_tx,
        Arc::clone(&submitted),
    ));

    (
        FrameSender {
            frames: frames_tx,
            submitted,
        },
        SessionHandle {
            reports: reports_rx,
            task,
        },
    )
}

async fn run_session<C, S>(
    mut pipeline: PersonPipeline<C, S>,
    mut frames: watch::Receiver<Option<Frame>>,
    reports: mpsc::UnboundedSender<FrameReport>,
    submitted: Arc<AtomicU64>,
) -> PipelineResult<SessionOutput<C, S>>
where
    C: PersonCapability + Send + 'static,
    S: RenderSurface + Send + 'static,
    S::Overlay: Send + 'static,
{
    info!("session started");
    let mut last_frame_id: Option<u64> = None;

    while frames.changed().await.is_ok() {
        let Some(frame) = frames.borrow_and_update().clone() else {
            continue;
        };
        if let Some(last) = last_frame_id {
            if frame.frame_id > last + 1 {
                debug!(skipped = frame.frame_id - last - 1, "frames skipped");
            }
        }
        last_frame_id = Some(frame.frame_id);

        let (returned, report) = tokio::task::spawn_blocking(move || {
            let report = pipeline.process_frame(&frame);
            (pipeline, report)
        })
        .await?;
        pipeline = returned;

        // The consumer may have stopped listening; the session keeps running.
        let _ = reports.send(report);
    }

    let stats = pipeline.stats();
    let frames_submitted = submitted.load(Ordering::Acquire);
    let summary = SessionSummary {
        frames_submitted,
        frames_dropped: frames_submitted.saturating_sub(stats.frames_processed),
        stats,
    };
    info!(
        submitted = summary.frames_submitted,
        processed = stats.frames_processed,
        dropped = summary.frames_dropped,
        acquisitions = stats.acquisitions,
        losses = stats.losses,
        "session finished"
    );
    Ok((pipeline, summary))
}
