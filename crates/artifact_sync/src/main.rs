use artifact_sync::config::{Config, DEFAULT_CONFIG_PATH};
use artifact_sync::models::artifact::SVG_CONTENT_TYPE;
use artifact_sync::services::ChannelProgressSink;
use artifact_sync::{App, Artifact, CommitRequest, ProgressSink, ProgressUpdate, TaskStatus};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Commit manifest read from the path given on the command line.
#[derive(Debug, Deserialize)]
struct Manifest {
    element_id: String,
    #[serde(default)]
    initial_artifact_ids: Vec<String>,
    #[serde(default)]
    artifacts: Vec<ManifestArtifact>,
}

#[derive(Debug, Deserialize)]
struct ManifestArtifact {
    id: String,
    path: PathBuf,
    #[serde(default = "default_content_type")]
    content_type: String,
}

fn default_content_type() -> String {
    SVG_CONTENT_TYPE.to_string()
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&config.logging.level));

    if config.logging.format == "pretty" {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }
}

async fn build_request(manifest: Manifest) -> Result<CommitRequest, Box<dyn std::error::Error>> {
    let mut request =
        CommitRequest::new(manifest.element_id)?.with_initial_ids(manifest.initial_artifact_ids);

    for entry in manifest.artifacts {
        let artifact = Artifact::from_file(entry.id, &entry.path, entry.content_type).await?;
        request = request.with_artifact(artifact);
    }

    Ok(request)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("ARTIFACT_SYNC_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(Some(&config_path))?;

    init_tracing(&config);
    info!("Starting artifact sync");

    let manifest_path = std::env::args()
        .nth(1)
        .ok_or("usage: artifact-sync <manifest.json>")?;
    let manifest: Manifest = serde_json::from_slice(&tokio::fs::read(&manifest_path).await?)?;
    let request = build_request(manifest).await?;

    let app = App::initialize(&config).await.map_err(|e| {
        error!("Failed to initialize: {}", e);
        e
    })?;

    let (sink, mut updates) = ChannelProgressSink::channel();
    let sink: Arc<dyn ProgressSink> = Arc::new(sink);
    let handle = app.scheduler.submit_commit(request, sink).await?;
    let cancel = handle.cancel_flag();

    let reporter = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            info!(
                task_id = %update.task_id,
                status = %update.status,
                detail = update.detail.as_deref().unwrap_or(""),
                "Progress"
            );
            if update.status.is_terminal() {
                return Some(update);
            }
        }
        None
    });

    tokio::select! {
        outcome = handle.wait() => {
            if let Err(e) = &outcome {
                error!(retry = ?e.retry_scope(), "Commit failed: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            warn!("Interrupt received, cancelling after the current step");
            cancel.cancel();
        }
    }

    // The worker reports a terminal status whether or not the interrupt won
    let terminal = reporter.await?;
    app.scheduler.shutdown().await;

    commit_result(terminal.as_ref())?;
    info!("Commit finished");
    Ok(())
}

/// Exit result for the terminal status the worker reported.
fn commit_result(terminal: Option<&ProgressUpdate>) -> Result<(), String> {
    match terminal {
        Some(update) => match update.status {
            TaskStatus::Succeeded => Ok(()),
            TaskStatus::Cancelled => Err("commit cancelled".to_string()),
            status => Err(format!(
                "commit {}: {}",
                status,
                update.detail.as_deref().unwrap_or("no detail")
            )),
        },
        None => Err("commit ended without a terminal status".to_string()),
    }
}
