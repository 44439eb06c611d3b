//! Chunked upload orchestration.
//!
//! [`ChunkedUploadOrchestrator`] drives one upload against an
//! [`UploadTransport`]:
//!
//! 1. **Session** - ask the transport for a session sized to the content
//! 2. **Parts** - read fixed-size windows in order, digest each one and
//!    upload it with its byte range
//! 3. **Commit** - hand the transport the ordered part manifest and the
//!    whole-content digest, accumulated across the same reads
//!
//! Nothing is retried here. Any failure is returned as an
//! [`UploadError`] and an open session is left for the caller to
//! [`abort`](UploadTransport::abort) or resume.

pub mod error;
pub mod local;
pub mod logger;
pub mod options;
pub mod orchestrator;
pub mod transport;
pub mod types;

// Re-export primary types for convenience.
pub use error::{TransportError, UploadError};
pub use local::{LocalStoreConfig, LocalTransport};
pub use logger::{TracingLogger, UploadLogger};
pub use options::{StrategyRequest, UploadOptions, UploadStrategy, choose_strategy};
pub use orchestrator::ChunkedUploadOrchestrator;
pub use transport::{TransportFuture, UploadTransport};
pub use types::UploadEvent;
