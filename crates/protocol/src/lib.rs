//! Wire types shared between the chunked upload orchestrator and
//! upload transports.
//!
//! Nothing in here performs I/O: these are the values a transport
//! receives and returns, serialized with serde so that HTTP- or
//! file-backed transports can put them on the wire unchanged.

pub mod messages;
pub mod types;

pub use messages::CommitRequest;
pub use types::{
    ByteRange, ContentDigest, PartDescriptor, UploadConfirmation, UploadSession, UploadTarget,
};

/// Errors produced when constructing or parsing protocol values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid byte range: {0}")]
    InvalidRange(String),
}
