//! Upload transport trait.
//!
//! A transport is the remote side of an upload: HTTP client for a cloud
//! storage API, a local directory, or a mock in tests. Keeping it behind
//! a trait leaves the orchestrator free of any wire format.

use std::future::Future;
use std::pin::Pin;

use partwise_protocol::{
    ByteRange, CommitRequest, ContentDigest, PartDescriptor, UploadConfirmation, UploadSession,
    UploadTarget,
};

use crate::error::TransportError;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Abstract remote side of an upload.
///
/// Timeouts and retries belong to the implementation; every call is a
/// single blocking point from the orchestrator's view.
pub trait UploadTransport: Send + Sync {
    /// Opens a session for `total_size` bytes landing at `target`.
    fn create_session<'a>(
        &'a self,
        target: &'a UploadTarget,
        total_size: u64,
    ) -> TransportFuture<'a, UploadSession>;

    /// Uploads the bytes of one part. `digest` covers exactly `data`.
    fn upload_part<'a>(
        &'a self,
        session: &'a UploadSession,
        range: ByteRange,
        digest: ContentDigest,
        data: Vec<u8>,
    ) -> TransportFuture<'a, PartDescriptor>;

    /// Finalizes a session from its ascending-offset part manifest and
    /// the whole-content digest.
    fn commit<'a>(
        &'a self,
        session: &'a UploadSession,
        request: CommitRequest,
    ) -> TransportFuture<'a, UploadConfirmation>;

    /// Uploads small content in one request, without a session.
    fn upload_whole<'a>(
        &'a self,
        target: &'a UploadTarget,
        digest: ContentDigest,
        data: Vec<u8>,
    ) -> TransportFuture<'a, UploadConfirmation>;

    /// Discards an open session and any parts already stored for it.
    fn abort<'a>(&'a self, session: &'a UploadSession) -> TransportFuture<'a, ()>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
