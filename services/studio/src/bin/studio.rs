//! services/studio/src/bin/studio.rs
//!
//! Drives one lesson through the whole pipeline from the command line: form
//! submission, the three UDL enhancement stages and export.

use bytes::Bytes;
use clap::Parser;
use lesson_pipeline_core::domain::{LessonRequest, Stage, UploadFile};
use lesson_pipeline_core::ports::PortError;
use lesson_pipeline_core::stages::progress_percent;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studio_lib::{
    config::Config,
    error::StudioError,
    workflow::{Autosave, LessonPipeline, Resumed, StudioState},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Lesson Studio - builds a UDL-enhanced lesson from a request file
#[derive(Parser, Debug)]
#[command(name = "studio")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a JSON lesson request
    #[arg(value_name = "REQUEST")]
    request: Option<PathBuf>,

    /// Supporting document to upload with the request
    #[arg(short, long, value_name = "FILE")]
    attach: Option<PathBuf>,

    /// Continue an existing session instead of submitting a new request
    #[arg(long, value_name = "SESSION_ID")]
    resume: Option<String>,

    /// Extra instructions passed along with every UDL principle
    #[arg(long, value_name = "TEXT")]
    requirements: Option<String>,

    /// Only check that the lesson service is reachable
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), StudioError> {
    let args = Args::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(api_origin = %config.api_origin, "Configuration loaded");

    // --- 2. Wire Adapters & Check the Service ---
    let state = StudioState::from_config(config.clone())?;
    let mut monitor = state.health_monitor();
    let reading = monitor.check_now().await;
    match &reading.outcome {
        Ok(status) if status.is_healthy() => {
            info!(version = ?status.version, "Lesson service is healthy")
        }
        Ok(status) => warn!(status = %status.status, "Lesson service reports a problem"),
        // A resumed lesson can still be restored from the local autosave.
        Err(e) if e.is_network_error() && args.resume.is_some() && !args.check => {
            warn!(error = %e, "Lesson service unreachable; falling back to the local autosave")
        }
        Err(e) => return Err(e.clone().into()),
    }
    if args.check {
        println!("Lesson service at {} is reachable", config.api_origin);
        return Ok(());
    }

    // --- 3. Run the Pipeline ---
    monitor.start();
    let result = run(&state, &args).await;
    monitor.stop();

    if let Some(reading) = monitor.latest().await {
        if !reading.is_healthy() {
            warn!(checked_at = %reading.checked_at, "Last health check was not healthy");
        }
    }
    result
}

async fn run(state: &StudioState, args: &Args) -> Result<(), StudioError> {
    let mut pipeline = state.pipeline();
    let mut autosave = state.autosave();

    match (&args.resume, &args.request) {
        (Some(session_id), _) => {
            if !resume(&mut pipeline, &autosave, session_id).await? {
                return Ok(());
            }
        }
        (None, Some(path)) => {
            let request = load_request(path, args.attach.as_deref()).await?;
            if let Err(e) = pipeline.submit(&request).await {
                if let PortError::Validation(errors) = &e {
                    for error in errors {
                        eprintln!("  - {error}");
                    }
                }
                return Err(e.into());
            }
        }
        (None, None) => {
            return Err(StudioError::Internal(
                "Provide a lesson request file or --resume <SESSION_ID>".to_string(),
            ))
        }
    }
    report_stage(&pipeline);

    while pipeline.stage() != Stage::Export {
        if let (Some(session_id), Some(content)) = (pipeline.session_id(), pipeline.content()) {
            autosave.schedule(
                session_id.clone(),
                content.clone(),
                state.config.autosave_delay,
            );
        }
        if let Err(e) = pipeline.advance(args.requirements.as_deref()).await {
            save_now(&mut autosave, &pipeline).await;
            return Err(e.into());
        }
        report_stage(&pipeline);
    }
    autosave.cancel();

    if let Some(export) = pipeline.exported() {
        println!("Download: {}", state.config.download_url(&export.download_url));
    }
    if let Some(session_id) = pipeline.session_id() {
        autosave.discard(session_id).await;
    }
    Ok(())
}

/// Resumes a session, reporting an offline restore. Returns whether the
/// pipeline can keep going.
async fn resume(
    pipeline: &mut LessonPipeline,
    autosave: &Autosave,
    raw_session_id: &str,
) -> Result<bool, StudioError> {
    match pipeline.resume_or_restore(raw_session_id, autosave).await? {
        Resumed::Online => Ok(true),
        Resumed::Offline { saved_at } => {
            let (title, slides) = pipeline
                .content()
                .map_or((String::new(), 0), |content| (content.title.clone(), content.slide_count()));
            println!(
                "Service unreachable. Restored \"{}\" ({} slides) from the autosave taken at {}",
                title,
                slides,
                saved_at.map_or_else(|| "an unknown time".to_string(), |t| t.to_rfc3339()),
            );
            Ok(false)
        }
    }
}

async fn load_request(path: &Path, attach: Option<&Path>) -> Result<LessonRequest, StudioError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let request: LessonRequest = serde_json::from_str(&raw)?;
    let Some(attach) = attach else {
        return Ok(request);
    };

    let file_name = attach
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            StudioError::Internal(format!("'{}' is not a file", attach.display()))
        })?;
    let data = Bytes::from(tokio::fs::read(attach).await?);
    let mime_type = UploadFile::mime_type_for(&file_name);
    Ok(request.with_file(UploadFile::new(file_name, mime_type, data)))
}

async fn save_now(autosave: &mut Autosave, pipeline: &LessonPipeline) {
    autosave.cancel();
    if let (Some(session_id), Some(content)) = (pipeline.session_id(), pipeline.content()) {
        if autosave.save(session_id, content).await {
            eprintln!("Progress saved. Resume with --resume {session_id}");
        }
    }
}

fn report_stage(pipeline: &LessonPipeline) {
    let stage = pipeline.stage();
    let slides = pipeline.content().map_or(0, |content| content.slide_count());
    println!(
        "[{:>3}%] {:<28} {} slides",
        progress_percent(stage),
        stage.display_name(),
        slides
    );
}
