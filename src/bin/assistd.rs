//! assistd - runs the detection-to-speech pipeline over a local frame source
//!
//! This daemon:
//! 1. Loads configuration (ASSIST_CONFIG + environment + flags)
//! 2. Loads the label table and the inference backend
//! 3. Pulls frames from the source at the target rate
//! 4. Logs overlay updates and spoken announcements

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assistive_vision::config::{AssistConfig, PolicyKind};
use assistive_vision::overlay::LogPresentationSink;
use assistive_vision::speech::LogSpeechSink;
use assistive_vision::{
    load_labels, BackendRegistry, FileSource, InputSpec, PipelineCoordinator,
    RawDetectionBatch, ScriptedBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file, directory of images, or stub://<name>.
    #[arg(long)]
    source: Option<String>,
    /// Label table, one class per line.
    #[arg(long)]
    labels: Option<PathBuf>,
    /// ONNX detection model (requires the backend-tract feature).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
    /// Score threshold (exclusive).
    #[arg(long)]
    threshold: Option<f32>,
    /// Debounce policy: set_difference or cooldown.
    #[arg(long)]
    policy: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = AssistConfig::load()?;
    if let Some(source) = args.source {
        cfg.source.path = source;
    }
    if let Some(labels) = args.labels {
        cfg.labels_path = labels;
    }
    if let Some(model) = args.model {
        cfg.model_path = Some(model);
    }
    if let Some(threshold) = args.threshold {
        if !(0.0..1.0).contains(&threshold) {
            return Err(anyhow!("--threshold must be within [0, 1)"));
        }
        cfg.decoder.score_threshold = threshold;
    }
    if let Some(policy) = args.policy.as_deref() {
        cfg.policy = PolicyKind::parse(policy)?;
    }

    let labels = load_labels(&cfg.labels_path)?;

    let mut registry = BackendRegistry::new();
    if let Some(model_path) = cfg.model_path.as_ref() {
        register_model(&mut registry, model_path, cfg.model)?;
    }
    registry.register(stub_backend(cfg.model, &labels));
    let mut backend = registry.take_default()?;
    backend.warm_up()?;
    log::info!("using {} backend", backend.name());

    let mut pipeline = PipelineCoordinator::new(cfg.pipeline_settings(), labels, backend)
        .with_presentation_sink(LogPresentationSink)
        .with_speech_sink(LogSpeechSink);

    let mut source = FileSource::new(cfg.source.clone())?;
    let frame_interval = Duration::from_millis(1000 / u64::from(cfg.source.target_fps));

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    log::info!(
        "assistd running: source={} fps={} display={}x{}",
        cfg.source.path,
        cfg.source.target_fps,
        cfg.display.width,
        cfg.display.height
    );

    let mut last_health_log = Instant::now();
    let mut frames = 0u64;
    while running.load(Ordering::SeqCst) {
        if args.frames.is_some_and(|limit| frames >= limit) {
            break;
        }
        let started = Instant::now();

        let frame = source.next_frame()?;
        let outcome = pipeline.process_frame(frame);
        frames += 1;
        log::debug!(
            "frame #{}: {} detections, {} announced",
            frames,
            outcome.detections.len(),
            outcome.announcements.len()
        );

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = pipeline.stats();
            log::info!(
                "frames={} failed={} announcements={} in_flight={}",
                stats.frames_processed,
                stats.frames_failed,
                stats.announcements,
                source.in_flight()
            );
            last_health_log = Instant::now();
        }

        if let Some(rest) = frame_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    let stats = pipeline.stats();
    log::info!(
        "assistd stopped after {} frames ({} failed, {} announcements)",
        stats.frames_processed,
        stats.frames_failed,
        stats.announcements
    );
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn register_model(
    registry: &mut BackendRegistry,
    model_path: &std::path::Path,
    spec: InputSpec,
) -> Result<()> {
    registry.register(assistive_vision::TractBackend::new(model_path, spec)?);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_model(
    _registry: &mut BackendRegistry,
    model_path: &std::path::Path,
    _spec: InputSpec,
) -> Result<()> {
    Err(anyhow!(
        "model {} requires the backend-tract feature",
        model_path.display()
    ))
}

/// Stand-in model: one centred object of a fixed class on every frame.
fn stub_backend(spec: InputSpec, labels: &[String]) -> ScriptedBackend {
    let class = labels
        .iter()
        .position(|label| label == "cell phone")
        .unwrap_or(0);
    let mut batch = RawDetectionBatch::with_capacity(assistive_vision::detect::DEFAULT_CAPACITY);
    batch.boxes[0] = [0.25, 0.3, 0.75, 0.7];
    batch.classes[0] = class as i64;
    batch.scores[0] = 0.82;
    batch.count = 1;
    if let Some(label) = labels.get(class) {
        log::info!("stub backend reports '{}' on every frame", label);
    }
    ScriptedBackend::new(spec).repeating(batch)
}
