//! Chunked upload orchestrator.
//!
//! Opens a session, uploads the content window by window and commits
//! the ordered manifest with the whole-content digest. Supports
//! cancellation between parts and a bounded number of parts in flight.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use partwise_protocol::{CommitRequest, PartDescriptor, UploadConfirmation, UploadTarget};
use partwise_transfer::{ChunkReader, ContentSource, Digester, checksum_bytes};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{TransportError, UploadError};
use crate::logger::{TracingLogger, UploadLogger};
use crate::options::{StrategyRequest, UploadOptions, UploadStrategy, choose_strategy};
use crate::transport::UploadTransport;
use crate::types::UploadEvent;

/// Drives uploads against one transport.
pub struct ChunkedUploadOrchestrator<'a> {
    transport: &'a dyn UploadTransport,
    logger: Arc<dyn UploadLogger>,
    options: UploadOptions,
    cancel: CancellationToken,
    events_tx: Option<mpsc::Sender<UploadEvent>>,
}

impl<'a> ChunkedUploadOrchestrator<'a> {
    /// Creates an orchestrator with default options, logging through `tracing`.
    pub fn new(transport: &'a dyn UploadTransport) -> Self {
        Self {
            transport,
            logger: Arc::new(TracingLogger),
            options: UploadOptions::default(),
            cancel: CancellationToken::new(),
            events_tx: None,
        }
    }

    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn UploadLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Uses a caller-owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sends progress events on `events_tx`.
    ///
    /// Sends wait for channel capacity, so the receiver must be drained
    /// or sized for the whole upload.
    pub fn with_events(mut self, events_tx: mpsc::Sender<UploadEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Returns the cancellation token for this orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Uploads `source` using the strategy `requested` resolves to.
    pub async fn upload_with_strategy<R: AsyncRead + Unpin + Send>(
        &self,
        target: &UploadTarget,
        source: ContentSource<R>,
        requested: StrategyRequest,
    ) -> Result<UploadConfirmation, UploadError> {
        match choose_strategy(source.total_size(), &self.options, requested)? {
            UploadStrategy::SingleRequest => self.upload_single(target, source).await,
            UploadStrategy::Chunked => self.upload(target, source).await,
        }
    }

    /// Uploads `source` through a chunked session.
    ///
    /// Commit is called at most once, and only after every part has
    /// been accepted. On failure the session stays open on the transport
    /// and the first failure is returned once in-flight parts settle.
    pub async fn upload<R: AsyncRead + Unpin + Send>(
        &self,
        target: &UploadTarget,
        source: ContentSource<R>,
    ) -> Result<UploadConfirmation, UploadError> {
        let result = self.run_chunked(target, source).await;
        self.finish(target, result).await
    }

    /// Uploads `source` in a single request.
    ///
    /// Content must be non-empty and within `single_request_limit`; the
    /// whole content is held in memory for the request.
    pub async fn upload_single<R: AsyncRead + Unpin + Send>(
        &self,
        target: &UploadTarget,
        source: ContentSource<R>,
    ) -> Result<UploadConfirmation, UploadError> {
        let result = self.run_single(target, source).await;
        self.finish(target, result).await
    }

    async fn run_chunked<R: AsyncRead + Unpin + Send>(
        &self,
        target: &UploadTarget,
        source: ContentSource<R>,
    ) -> Result<UploadConfirmation, UploadError> {
        let total_size = source.total_size();
        if total_size == 0 {
            return Err(UploadError::InvalidArgument(
                "content must not be empty".into(),
            ));
        }
        self.options.validate()?;
        self.check_cancelled()?;

        // 1. Session
        let session = self
            .transport
            .create_session(target, total_size)
            .await
            .map_err(UploadError::SessionCreation)?;
        if session.id.is_empty() {
            return Err(UploadError::SessionCreation(TransportError::local(
                "missing_session_id",
                "transport returned a session without an id",
            )));
        }

        let part_size = match session.part_size {
            Some(size) if size > 0 => size,
            _ => self.options.part_size,
        };
        let mut reader = ChunkReader::new(source, part_size)?;
        let part_count = reader.plan().window_count();

        self.logger.info(
            "upload session created",
            &[
                ("transport", self.transport.name().to_string()),
                ("session_id", session.id.clone()),
                ("total_bytes", total_size.to_string()),
                ("part_size", part_size.to_string()),
                ("parts", part_count.to_string()),
            ],
        );
        self.emit(UploadEvent::SessionCreated {
            session_id: session.id.clone(),
            total_size,
            part_count,
        })
        .await;

        // 2. Parts. Windows are read in order; each dispatched part owns
        // the manifest slot of its window index. After the first failure
        // nothing new is dispatched, but parts already in flight finish.
        let algorithm = self.options.digest;
        let mut whole = Digester::new(algorithm);
        let mut slots: Vec<Option<PartDescriptor>> = vec![None; part_count as usize];
        let mut in_flight = FuturesUnordered::new();
        let mut exhausted = false;
        let mut failure: Option<UploadError> = None;
        let mut uploaded: u64 = 0;

        loop {
            while failure.is_none()
                && !exhausted
                && in_flight.len() < self.options.max_in_flight
                && !self.cancel.is_cancelled()
            {
                let window = match reader.next_window().await {
                    Ok(Some(window)) => window,
                    Ok(None) => {
                        exhausted = true;
                        break;
                    }
                    Err(e) => {
                        failure = Some(e.into());
                        break;
                    }
                };
                whole.update(&window.data);
                let digest = checksum_bytes(algorithm, &window.data);
                let index = window.index() as usize;
                let range = window.range();
                let transport = self.transport;
                let session = &session;
                in_flight.push(async move {
                    let result = transport
                        .upload_part(session, range, digest, window.data)
                        .await;
                    (index, range, result)
                });
            }

            // In-flight parts run to completion even after cancellation.
            let Some((index, range, result)) = in_flight.next().await else {
                break;
            };
            let part = match result {
                Ok(part) => part,
                Err(source) => {
                    if failure.is_none() {
                        failure = Some(UploadError::PartUpload { range, source });
                    }
                    continue;
                }
            };

            uploaded += range.len();
            self.logger.info(
                "part uploaded",
                &[
                    ("session_id", session.id.clone()),
                    ("part_id", part.part_id.clone()),
                    ("range", range.to_string()),
                ],
            );
            self.emit(UploadEvent::PartUploaded {
                index: index as u64,
                range,
                uploaded_bytes: uploaded,
                total_bytes: total_size,
            })
            .await;
            slots[index] = Some(part);
        }

        drop(in_flight);
        if let Some(e) = failure {
            return Err(e);
        }
        self.check_cancelled()?;

        // 3. Commit
        let parts = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| {
                    UploadError::Commit(TransportError::local(
                        "missing_part",
                        format!("window {i} was never uploaded"),
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request = CommitRequest {
            session_id: session.id.clone(),
            parts,
            digest: whole.finalize(),
        };
        if let Some(offset) = request.first_gap(total_size) {
            return Err(UploadError::Commit(TransportError::local(
                "non_contiguous_manifest",
                format!("part manifest is not contiguous at offset {offset}"),
            )));
        }

        self.transport
            .commit(&session, request)
            .await
            .map_err(UploadError::Commit)
    }

    async fn run_single<R: AsyncRead + Unpin + Send>(
        &self,
        target: &UploadTarget,
        source: ContentSource<R>,
    ) -> Result<UploadConfirmation, UploadError> {
        let total_size = source.total_size();
        if total_size == 0 {
            return Err(UploadError::InvalidArgument(
                "content must not be empty".into(),
            ));
        }
        if total_size > self.options.single_request_limit {
            return Err(UploadError::InvalidArgument(format!(
                "{total_size} bytes exceeds the single-request limit of {} bytes",
                self.options.single_request_limit
            )));
        }
        self.check_cancelled()?;

        // One window spanning the whole content.
        let mut reader = ChunkReader::new(source, total_size)?;
        let Some(window) = reader.next_window().await? else {
            return Err(UploadError::InvalidArgument(
                "content must not be empty".into(),
            ));
        };
        let range = window.range();
        let digest = checksum_bytes(self.options.digest, &window.data);

        self.logger.info(
            "uploading in a single request",
            &[
                ("transport", self.transport.name().to_string()),
                ("file_name", target.file_name.clone()),
                ("total_bytes", total_size.to_string()),
            ],
        );

        self.transport
            .upload_whole(target, digest, window.data)
            .await
            .map_err(|source| UploadError::PartUpload { range, source })
    }

    async fn finish(
        &self,
        target: &UploadTarget,
        result: Result<UploadConfirmation, UploadError>,
    ) -> Result<UploadConfirmation, UploadError> {
        match &result {
            Ok(confirmation) => {
                self.logger.info(
                    "upload committed",
                    &[
                        ("file_id", confirmation.file_id.clone()),
                        ("file_name", confirmation.file_name.clone()),
                        ("size", confirmation.size.to_string()),
                        ("digest", confirmation.digest.to_string()),
                    ],
                );
                self.emit(UploadEvent::Committed {
                    file_id: confirmation.file_id.clone(),
                    size: confirmation.size,
                })
                .await;
            }
            Err(e) => {
                self.logger.error(
                    "upload failed",
                    &[
                        ("file_name", target.file_name.clone()),
                        ("error", e.to_string()),
                    ],
                );
                self.emit(UploadEvent::Failed {
                    error: e.to_string(),
                })
                .await;
            }
        }
        result
    }

    async fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event).await;
        }
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}
