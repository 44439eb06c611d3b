//! Command implementations.

use std::path::Path;

use anyhow::Context;
use partwise_protocol::UploadTarget;
use partwise_transfer::{ContentSource, DigestAlgorithm, ThroughputMeter, digest_file};
use partwise_upload::{
    ChunkedUploadOrchestrator, LocalTransport, UploadError, UploadEvent, UploadOptions,
    UploadTransport,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::UploadArgs;
use crate::config::Config;

/// Applies command-line overrides on top of the file configuration.
fn effective_options(args: &UploadArgs, config: &Config) -> UploadOptions {
    let mut options = config.upload.clone();
    if let Some(part_size) = args.part_size {
        options.part_size = part_size;
    }
    if let Some(concurrency) = args.concurrency {
        options.max_in_flight = concurrency;
    }
    options
}

fn target_for(args: &UploadArgs) -> anyhow::Result<UploadTarget> {
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("cannot derive a file name; pass --name")?,
    };
    Ok(UploadTarget::new(args.folder.clone(), name))
}

pub async fn upload(args: UploadArgs, config: Config) -> anyhow::Result<()> {
    let options = effective_options(&args, &config);
    let mut store = config.store.clone();
    if let Some(root) = &args.store {
        store.root = root.clone();
    }
    store.digest = options.digest;

    let target = target_for(&args)?;
    let source = ContentSource::open(&args.file)
        .await
        .with_context(|| format!("opening {}", args.file.display()))?;
    info!(
        file = %args.file.display(),
        bytes = source.total_size(),
        strategy = %args.strategy,
        "starting upload"
    );

    let transport = LocalTransport::new(store);
    let cancel = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(64);
    let orch = ChunkedUploadOrchestrator::new(&transport)
        .with_options(options)
        .with_cancel_token(cancel.clone())
        .with_events(events_tx);

    let reporter = tokio::spawn(report_progress(events_rx));
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing parts already in flight");
                cancel.cancel();
            }
        }
    });

    let result = orch
        .upload_with_strategy(&target, source, args.strategy)
        .await;
    interrupt.abort();
    drop(orch);
    let _ = reporter.await;

    match result {
        Ok(confirmation) => {
            println!("{}", serde_json::to_string_pretty(&confirmation)?);
            Ok(())
        }
        Err(e) => {
            discard_sessions(&transport).await;
            if matches!(e, UploadError::Cancelled) {
                warn!("upload cancelled");
            }
            Err(e.into())
        }
    }
}

/// Aborts whatever sessions a failed upload left open.
async fn discard_sessions(transport: &LocalTransport) {
    for session in transport.pending_sessions() {
        match transport.abort(&session).await {
            Ok(()) => info!(session_id = %session.id, "discarded open session"),
            Err(e) => warn!(session_id = %session.id, error = %e, "failed to discard session"),
        }
    }
}

async fn report_progress(mut events_rx: mpsc::Receiver<UploadEvent>) {
    let meter = ThroughputMeter::default();
    meter.record(0);

    while let Some(event) = events_rx.recv().await {
        match event {
            UploadEvent::SessionCreated {
                session_id,
                part_count,
                ..
            } => {
                info!(%session_id, parts = part_count, "session open");
            }
            UploadEvent::PartUploaded {
                index,
                range,
                uploaded_bytes,
                total_bytes,
            } => {
                meter.record(range.len());
                let eta = meter
                    .eta(total_bytes - uploaded_bytes)
                    .map(|d| format!("{:.1}s", d.as_secs_f64()))
                    .unwrap_or_else(|| "-".into());
                info!(
                    part = index,
                    uploaded = uploaded_bytes,
                    total = total_bytes,
                    kib_per_sec = %format!("{:.1}", meter.bytes_per_second() / 1024.0),
                    eta = %eta,
                    "part done"
                );
            }
            UploadEvent::Committed { .. } | UploadEvent::Failed { .. } => {}
        }
    }
}

pub async fn digest(file: &Path, algorithm: DigestAlgorithm) -> anyhow::Result<()> {
    let digest = digest_file(algorithm, file)
        .await
        .with_context(|| format!("hashing {}", file.display()))?;
    println!("{digest}  {}", file.display());
    Ok(())
}
