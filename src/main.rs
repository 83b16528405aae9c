use std::{collections::BTreeMap, env, path::PathBuf};

use anyhow::Context;
use log::info;
use rand::{SeedableRng, rngs::StdRng};
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;

use sign_gesture::{
    Command, Session, SessionConfig, SessionEvent,
    capture::FrameSource,
    engine::LinearEngine,
    overlay::FrameBuffer,
    sim::{ScriptedDetector, ScriptedSource, synthetic_pose},
};

const DEFAULT_EXPORT_DIR: &str = "models";
const POSE_JITTER: f32 = 0.01;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::var("GESTURE_CONFIG") {
        Ok(path) => SessionConfig::from_json_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        Err(_) => SessionConfig::default(),
    };
    let export_dir = env::var("GESTURE_EXPORT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_EXPORT_DIR));

    let labels = config.label_set();
    let per_label = config.min_samples.div_ceil(labels.len()).max(1);

    let mut rng = match config.training.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let script = (0..labels.len())
        .flat_map(|class| std::iter::repeat(class).take(per_label))
        .map(|class| Some(synthetic_pose(class, POSE_JITTER, &mut rng)))
        .collect::<Vec<_>>();
    let frames = script.len() as u64;

    let engine = LinearEngine::new(&config.training);
    let detector = ScriptedDetector::new(script);
    let mut surface = FrameBuffer::new(0, 0);
    let mut source = ScriptedSource::new(&config.camera, Some(frames));
    let (mut session, mut events) = Session::new(config, engine, detector)?;

    info!("recording {per_label} samples for each of {} labels", labels.len());
    source.start()?;
    while let Some(frame) = source.next_frame() {
        session.tick(&frame, &mut surface);

        let class = (frame.sequence as usize / per_label) % labels.len();
        if let Some(label) = labels.name(class) {
            session.dispatch(Command::RecordSample(label.to_string())).await?;
        }
    }

    session.dispatch(Command::TriggerTraining).await?;
    if let Some(outcome) = session.finish_training().await {
        outcome?;
    }
    session.dispatch(Command::ToggleDetection).await?;

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C");
            token.cancel();
        }
    });

    let (commands_tx, mut commands) = mpsc::unbounded_channel();
    commands_tx.send(Command::ExportModel(export_dir))?;

    let mut source = ScriptedSource::new(&session.config().camera, Some(frames));
    session
        .run(&mut source, &mut surface, &mut commands, shutdown)
        .await?;

    let mut predicted = BTreeMap::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Prediction(p) = event {
            *predicted.entry(p.label).or_insert(0usize) += 1;
        }
    }

    for (label, count) in &predicted {
        info!("{label}: predicted on {count} of {frames} frames");
    }
    info!("status: {}", session.status());

    Ok(())
}
