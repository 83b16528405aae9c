mod common;

use sign_gesture::{
    Command, GestureErr, Phase, Session, SessionEvent,
    capture::Frame,
    error::RejectReason,
    overlay::{FrameBuffer, Surface},
    sim::{ScriptedDetector, ScriptedSource},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{StubEngine, config, pose};

type StubSession = Session<StubEngine, ScriptedDetector>;

fn session(
    min_samples: usize,
    detector: ScriptedDetector,
) -> (StubSession, mpsc::UnboundedReceiver<SessionEvent>) {
    let (engine, _probe) = StubEngine::new();
    Session::new(config(min_samples), engine, detector).unwrap()
}

fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

async fn record(session: &mut StubSession, label: &str, n: usize) {
    for _ in 0..n {
        session
            .dispatch(Command::RecordSample(label.into()))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn recording_needs_a_hand_in_view() {
    let (mut session, _events) = session(5, ScriptedDetector::default());
    let mut surface = FrameBuffer::new(0, 0);
    session.tick(&Frame::new(64, 48, 0), &mut surface);

    let err = session
        .dispatch(Command::RecordSample("HELLO".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, GestureErr::RecordRejected(RejectReason::NoHand)));
    assert_eq!(session.store().count_all(), 0);
    assert_eq!(session.status(), err.to_string());
}

#[tokio::test]
async fn recording_stores_the_latest_landmarks() {
    let (mut session, _events) = session(5, ScriptedDetector::repeating(pose(3)));
    let mut surface = FrameBuffer::new(0, 0);
    session.tick(&Frame::new(64, 48, 0), &mut surface);

    record(&mut session, "THANK YOU", 3).await;

    assert_eq!(session.store().count("THANK YOU"), Some(3));
    assert_eq!(session.store().drain().features[0], pose(3).features());
    assert_eq!(session.status(), "Recorded THANK YOU (3)");

    let err = session
        .dispatch(Command::RecordSample("GOODBYE".into()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GestureErr::RecordRejected(RejectReason::UnknownLabel(_))
    ));
}

#[tokio::test]
async fn training_with_too_few_samples_reports_status() {
    let (mut session, mut events) = session(50, ScriptedDetector::repeating(pose(0)));
    session.tick(&Frame::new(64, 48, 0), &mut FrameBuffer::new(0, 0));
    record(&mut session, "HELLO", 10).await;
    drain(&mut events);

    let err = session.dispatch(Command::TriggerTraining).await.unwrap_err();

    assert!(matches!(err, GestureErr::InsufficientSamples { .. }));
    assert_eq!(session.status(), "not enough samples: 10 of 50");
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(
        drain(&mut events),
        [SessionEvent::Status("not enough samples: 10 of 50".into())]
    );
}

#[tokio::test]
async fn record_train_detect_flow() {
    let (mut session, mut events) = session(10, ScriptedDetector::repeating(pose(1)));
    let mut surface = FrameBuffer::new(0, 0);
    session.tick(&Frame::new(64, 48, 0), &mut surface);

    for label in ["HELLO", "YES", "NO", "THANK YOU", "HELP"] {
        record(&mut session, label, 2).await;
    }
    drain(&mut events);

    session.dispatch(Command::TriggerTraining).await.unwrap();
    assert_eq!(session.phase(), Phase::Training);
    session.finish_training().await.unwrap().unwrap();
    assert_eq!(session.status(), "Training complete");
    assert_eq!(session.phase(), Phase::Ready);

    session.dispatch(Command::ToggleDetection).await.unwrap();
    let prediction = session.tick(&Frame::new(64, 48, 1), &mut surface).unwrap();
    assert_eq!(prediction.label, "HELLO");

    let events = drain(&mut events);
    assert!(events.contains(&SessionEvent::TrainingStarted { samples: 10 }));
    assert!(events.contains(&SessionEvent::TrainingFinished { ok: true }));
    assert!(events.contains(&SessionEvent::DetectionToggled(true)));
    assert!(events.contains(&SessionEvent::Prediction(prediction)));

    session.dispatch(Command::ToggleDetection).await.unwrap();
    assert_eq!(session.phase(), Phase::Ready);
    assert!(session.tick(&Frame::new(64, 48, 2), &mut surface).is_none());
}

#[tokio::test]
async fn failed_inference_only_skips_that_tick() {
    let (engine, probe) = StubEngine::new();
    let detector = ScriptedDetector::repeating(pose(0));
    let (mut session, _events) = Session::new(config(5), engine, detector).unwrap();
    let mut surface = FrameBuffer::new(0, 0);
    session.tick(&Frame::new(64, 48, 0), &mut surface);
    record(&mut session, "HELLO", 5).await;
    session.dispatch(Command::TriggerTraining).await.unwrap();
    session.finish_training().await.unwrap().unwrap();
    session.dispatch(Command::ToggleDetection).await.unwrap();

    probe.set_fail_infer(true);
    assert!(session.tick(&Frame::new(64, 48, 1), &mut surface).is_none());
    assert_eq!(session.phase(), Phase::Detecting);
    assert!(session.status().starts_with("inference failed: "));

    probe.set_fail_infer(false);
    let prediction = session.tick(&Frame::new(64, 48, 2), &mut surface).unwrap();
    assert_eq!(prediction.label, "HELLO");
    assert_eq!(session.phase(), Phase::Detecting);
}

#[tokio::test]
async fn samples_are_frozen_while_training() {
    let (engine, probe) = StubEngine::new();
    let detector = ScriptedDetector::repeating(pose(0));
    let (mut session, _events) = Session::new(config(5), engine, detector).unwrap();
    session.tick(&Frame::new(64, 48, 0), &mut FrameBuffer::new(0, 0));
    record(&mut session, "HELLO", 5).await;
    probe.set_hold(true);

    session.dispatch(Command::TriggerTraining).await.unwrap();

    let err = session
        .dispatch(Command::RecordSample("HELLO".into()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GestureErr::RecordRejected(RejectReason::TrainingInProgress)
    ));

    let err = session.dispatch(Command::ClearSamples).await.unwrap_err();
    assert!(matches!(err, GestureErr::TrainingInProgress));
    assert_eq!(session.store().count_all(), 5);

    session.dispatch(Command::CancelTraining).await.unwrap();
    let outcome = session.finish_training().await.unwrap();
    assert!(outcome.is_err());
    assert_eq!(session.phase(), Phase::Idle);

    session.dispatch(Command::ClearSamples).await.unwrap();
    assert_eq!(session.store().count_all(), 0);
}

#[tokio::test]
async fn imbalanced_samples_are_reported_but_train() {
    let (mut session, _events) = session(10, ScriptedDetector::repeating(pose(0)));
    session.tick(&Frame::new(64, 48, 0), &mut FrameBuffer::new(0, 0));
    record(&mut session, "HELLO", 9).await;
    record(&mut session, "YES", 1).await;

    session.dispatch(Command::TriggerTraining).await.unwrap();

    assert_eq!(
        session.status(),
        "Training on 10 samples; few samples for YES, NO, THANK YOU, HELP"
    );
    session.finish_training().await.unwrap().unwrap();
}

#[tokio::test]
async fn sidebar_toggle_is_reported() {
    let (mut session, mut events) = session(5, ScriptedDetector::default());
    assert!(session.sidebar_open());

    session.dispatch(Command::ToggleSidebar).await.unwrap();

    assert!(!session.sidebar_open());
    assert_eq!(drain(&mut events), [SessionEvent::SidebarToggled(false)]);
}

#[tokio::test]
async fn tick_fits_the_overlay_and_draws_the_hand() {
    let hand = pose(2);
    let detector = ScriptedDetector::new(vec![Some(hand.clone()), None]);
    let (mut session, _events) = session(5, detector);
    let mut surface = FrameBuffer::new(0, 0);

    session.tick(&Frame::new(320, 240, 0), &mut surface);
    assert_eq!((surface.width(), surface.height()), (320, 240));
    assert_eq!(session.latest(), Some(&hand));
    assert!(surface.painted() > 0);

    session.tick(&Frame::new(320, 240, 1), &mut surface);
    assert_eq!(session.latest(), None);
    assert_eq!(surface.painted(), 0);
}

#[tokio::test]
async fn run_drains_commands_until_the_source_ends() {
    let (mut session, _events) = session(5, ScriptedDetector::repeating(pose(4)));
    let mut source = ScriptedSource::new(&session.config().camera, Some(3));
    let mut surface = FrameBuffer::new(0, 0);
    let (tx, mut commands) = mpsc::unbounded_channel();
    tx.send(Command::ToggleSidebar).unwrap();
    tx.send(Command::ToggleDetection).unwrap();

    let frames = session
        .run(&mut source, &mut surface, &mut commands, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(frames, 3);
    assert!(!session.sidebar_open());
    assert_eq!(session.status(), "no model loaded");
    assert_eq!((surface.width(), surface.height()), (1280, 720));
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let (mut session, _events) = session(5, ScriptedDetector::default());
    let mut source = ScriptedSource::new(&session.config().camera, None);
    let (_tx, mut commands) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let frames = session
        .run(&mut source, &mut FrameBuffer::new(0, 0), &mut commands, shutdown)
        .await
        .unwrap();

    assert_eq!(frames, 0);
}
