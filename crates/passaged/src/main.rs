use anyhow::{Context, Result};
use passage_api::ApiClient;
use passage_core::{FaceAnalyzer, Gallery, OnnxAnalyzer, OnnxLiveness};
use passage_pipeline::{spawn_worker, Event, FrameSampler, Pipeline, TickOutput};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

mod backend;
mod camera;
mod config;

use backend::{load_gallery, ApiBackend};
use camera::Camera;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        device = config.camera_device,
        api = config.api_base_url,
        "passaged starting"
    );

    // Models and gallery load before the loop starts; a gate that cannot
    // recognize anyone should fail here, not at the first visitor.
    let (gallery, analyzer, scorer, worker_client) = {
        let detector = config.detector_model_path();
        let encoder = config.encoder_model_path();
        let liveness = config.liveness_model_path();
        let base_url = config.api_base_url.clone();
        // The blocking HTTP client must be built and used off the async
        // runtime.
        tokio::task::spawn_blocking(move || -> Result<_> {
            let mut analyzer =
                OnnxAnalyzer::load(&detector, &encoder).context("loading face models")?;
            let scorer = OnnxLiveness::load(&liveness).context("loading liveness model")?;
            let client = ApiClient::new(&base_url).context("building api client")?;
            let gallery =
                load_gallery(&client, &mut analyzer).context("building enrollment gallery")?;
            let worker_client = ApiClient::new(&base_url).context("building api client")?;
            Ok((gallery, analyzer, scorer, worker_client))
        })
        .await??
    };
    tracing::info!(enrolled = gallery.len(), "passaged ready");

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let worker = spawn_worker(
        ApiBackend::new(worker_client),
        events_tx,
        config.queue_depth,
    );

    let (fallback_tx, fallback_rx) = std::sync::mpsc::channel();
    let shutdown = Arc::new(AtomicBool::new(false));

    let loop_shutdown = shutdown.clone();
    let loop_handle = std::thread::Builder::new()
        .name("passage-pipeline".into())
        .spawn(move || {
            if let Err(err) = run_loop(
                &config,
                gallery,
                analyzer,
                scorer,
                worker,
                events_rx,
                fallback_rx,
                &loop_shutdown,
            ) {
                tracing::error!(error = %err, "pipeline loop failed");
            }
        })
        .context("spawning pipeline thread")?;

    tokio::spawn(read_fallback_lines(fallback_tx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("passaged shutting down");
    shutdown.store(true, Ordering::Relaxed);
    let _ = tokio::task::spawn_blocking(move || loop_handle.join()).await;

    Ok(())
}

/// The capture/tick loop. Runs on its own thread so V4L2 dequeues never
/// stall the async runtime.
#[allow(clippy::too_many_arguments)]
fn run_loop(
    config: &Config,
    gallery: Gallery,
    analyzer: impl FaceAnalyzer,
    scorer: passage_core::OnnxLiveness,
    worker: passage_pipeline::WorkerHandle,
    events_rx: tokio::sync::mpsc::UnboundedReceiver<Event>,
    fallback_rx: std::sync::mpsc::Receiver<(String, String)>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let mut cam = Camera::open(&config.camera_device)?;
    let session = cam.start()?;
    let mut sampler = FrameSampler::new(session, config.frame_stride, config.detect_scale);
    let mut pipeline = Pipeline::new(
        gallery,
        analyzer,
        scorer,
        worker,
        events_rx,
        config.pipeline_config(),
    );

    while !shutdown.load(Ordering::Relaxed) {
        let started = Instant::now();

        while let Ok((identifier, code)) = fallback_rx.try_recv() {
            pipeline.submit_fallback(identifier, code);
        }

        let sampled = sampler.next_unit()?;
        let output = pipeline.tick(sampled, Instant::now());
        report(&output);

        if let Some(rest) = config.tick_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    Ok(())
}

/// Log sink for the presentation layer. A deployment with a screen would
/// render `output.boxes` and `output.overlay` here instead.
fn report(output: &TickOutput) {
    for event in &output.events {
        match event {
            Event::Accepted {
                identity,
                action,
                display_name,
                ..
            } => tracing::info!(%identity, %action, display_name, "access granted"),
            Event::Denied { reason } => tracing::warn!(?reason, "access denied"),
            Event::Escalated => {
                tracing::warn!("unrecognized visitor — awaiting access code on stdin")
            }
            Event::Resolved { identity } => tracing::info!(?identity, "escalation resolved"),
        }
    }
    if let Some(overlay) = &output.overlay {
        tracing::debug!(text = overlay.text, tone = ?overlay.tone, "overlay");
    }
}

/// Read `identifier code` pairs from stdin for the escalation fallback.
async fn read_fallback_lines(tx: std::sync::mpsc::Sender<(String, String)>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(identifier), Some(code), None) => {
                if tx.send((identifier.to_string(), code.to_string())).is_err() {
                    break;
                }
            }
            _ => tracing::warn!("expected: <identifier> <code>"),
        }
    }
}
