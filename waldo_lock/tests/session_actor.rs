use futures::StreamExt;
use std::time::Duration;
use waldo_lock::core_modules::backends::scripted::ScriptedCapability;
use waldo_lock::core_modules::geometry::NormalizedRect;
use waldo_lock::core_modules::observation::{Frame, PersonObservation};
use waldo_lock::core_modules::overlay::{RecordingSurface, SurfaceCommand};
use waldo_lock::{
    CapabilityError, PersonCapability, PersonPipeline, PipelineConfig, Transition, spawn_session,
};

fn frame(frame_id: u64) -> Frame {
    Frame::new(frame_id, 2, 2, vec![0u8; 16])
}

fn observation() -> PersonObservation {
    PersonObservation::new(0.9, NormalizedRect::new(0.4, 0.4, 0.2, 0.2).expect("valid rect"))
}

/// Takes a while on every call, like a real model would.
struct Slow(ScriptedCapability);

impl PersonCapability for Slow {
    fn try_detect(&mut self, frame: &Frame) -> Result<PersonObservation, CapabilityError> {
        std::thread::sleep(Duration::from_millis(20));
        self.0.try_detect(frame)
    }

    fn try_track(
        &mut self,
        previous: &NormalizedRect,
        frame: &Frame,
    ) -> Result<PersonObservation, CapabilityError> {
        std::thread::sleep(Duration::from_millis(20));
        self.0.try_track(previous, frame)
    }
}

#[tokio::test]
async fn one_report_per_frame_when_paced() {
    let capability = ScriptedCapability::new()
        .then_detect(Ok(observation()))
        .then_track(Ok(observation()))
        .then_track(Err(CapabilityError::NoObservation));
    let pipeline =
        PersonPipeline::new(&PipelineConfig::default(), capability, RecordingSurface::new());
    let (sender, mut handle) = spawn_session(pipeline);

    let mut transitions = Vec::new();
    for i in 0..4 {
        sender.submit(frame(i)).expect("session is running");
        let report = handle.next_report().await.expect("one report per frame");
        assert_eq!(report.frame_id, i);
        transitions.push(report.transition);
    }
    drop(sender);

    let (pipeline, summary) = handle.join().await.expect("session ends cleanly");
    assert_eq!(
        transitions,
        vec![
            Transition::Acquired,
            Transition::Followed,
            Transition::Lost,
            Transition::StillSeeking
        ]
    );
    assert_eq!(summary.frames_submitted, 4);
    assert_eq!(summary.frames_dropped, 0);
    assert_eq!(summary.stats.frames_processed, 4);
    assert_eq!(summary.stats.overlays_drawn, 2);
    assert_eq!(pipeline.surface().draw_count(), 2);
    assert!(pipeline.surface().layers.is_empty());
}

#[tokio::test]
async fn latest_frame_wins() {
    let capability = Slow(ScriptedCapability::new());
    let pipeline =
        PersonPipeline::new(&PipelineConfig::default(), capability, RecordingSurface::new());
    let (sender, mut handle) = spawn_session(pipeline);

    // The session task cannot run until this task yields, so only the last
    // frame is still pending when it does.
    for i in 0..5 {
        sender.submit(frame(i)).expect("session is running");
    }
    let report = handle.next_report().await.expect("newest frame is processed");
    assert_eq!(report.frame_id, 4);
    drop(sender);

    let (pipeline, summary) = handle.join().await.expect("session ends cleanly");
    assert_eq!(summary.frames_submitted, 5);
    assert_eq!(summary.stats.frames_processed, 1);
    assert_eq!(summary.frames_dropped, 4);
    assert_eq!(pipeline.capability().0.detect_calls, 1);
}

#[tokio::test]
async fn reports_stream_ends_with_session() {
    let capability = ScriptedCapability::new().always_detect(observation()).always_follow();
    let pipeline =
        PersonPipeline::new(&PipelineConfig::default(), capability, RecordingSurface::new());
    let (sender, mut handle) = spawn_session(pipeline);

    let producer = tokio::spawn(async move {
        for i in 0..3 {
            sender.submit(frame(i)).expect("session is running");
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
    });

    let reports: Vec<_> = handle.reports().collect().await;
    producer.await.expect("producer finishes");

    assert!(!reports.is_empty());
    assert_eq!(reports[0].transition, Transition::Acquired);
    assert!(reports[1..].iter().all(|r| r.transition == Transition::Followed));

    let (pipeline, summary) = handle.join().await.expect("session ends cleanly");
    assert_eq!(summary.stats.frames_processed as usize, reports.len());
    let presents = pipeline
        .surface()
        .commands
        .iter()
        .filter(|c| matches!(c, SurfaceCommand::Present(_)))
        .count();
    assert_eq!(presents, reports.len());
}
