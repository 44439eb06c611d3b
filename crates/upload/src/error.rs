//! Upload error types.

use partwise_protocol::ByteRange;
use partwise_transfer::TransferError;

/// Failure reported by an upload transport.
///
/// Mirrors the error body of a storage API: an HTTP-like status when the
/// failure came from the remote side, a machine-readable code and a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}{}: {message}", status_suffix(.status))]
pub struct TransportError {
    pub status: Option<u16>,
    pub code: String,
    pub message: String,
}

impl TransportError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: code.into(),
            message: message.into(),
        }
    }

    /// An error detected on this side, before or without a remote call.
    pub fn local(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: code.into(),
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::new(500, "io_error", err.to_string())
    }
}

/// Errors produced by an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("session creation failed: {0}")]
    SessionCreation(TransportError),

    #[error("part upload failed for {range}: {source}")]
    PartUpload {
        range: ByteRange,
        #[source]
        source: TransportError,
    },

    #[error("commit failed: {0}")]
    Commit(TransportError),

    #[error("source read failed: {0}")]
    SourceRead(#[from] TransferError),

    #[error("cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let remote = TransportError::new(409, "item_name_in_use", "file exists");
        assert_eq!(remote.to_string(), "item_name_in_use (409): file exists");

        let local = TransportError::local("missing_session_id", "no id");
        assert_eq!(local.to_string(), "missing_session_id: no id");
    }

    #[test]
    fn part_upload_error_names_range() {
        let err = UploadError::PartUpload {
            range: ByteRange::new(8_388_608, 16_777_215, 20_000_000).unwrap(),
            source: TransportError::new(416, "range_mismatch", "bad range"),
        };
        assert_eq!(
            err.to_string(),
            "part upload failed for bytes 8388608-16777215/20000000: range_mismatch (416): bad range"
        );

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "range_mismatch (416): bad range");
    }

    #[test]
    fn io_error_becomes_internal_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TransportError::from(io);
        assert_eq!(err.status, Some(500));
        assert_eq!(err.code, "io_error");
    }
}
