//! Progress events emitted during an upload.

use partwise_protocol::ByteRange;

/// Progress event sent on the orchestrator's optional event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// A session was opened; `part_count` windows will follow.
    SessionCreated {
        session_id: String,
        total_size: u64,
        part_count: u64,
    },
    /// One part was accepted by the transport.
    PartUploaded {
        index: u64,
        range: ByteRange,
        uploaded_bytes: u64,
        total_bytes: u64,
    },
    /// The file was committed.
    Committed { file_id: String, size: u64 },
    /// The upload failed or was cancelled.
    Failed { error: String },
}

impl UploadEvent {
    /// Fraction of bytes uploaded, for `PartUploaded` events.
    pub fn progress(&self) -> Option<f64> {
        match self {
            Self::PartUploaded {
                uploaded_bytes,
                total_bytes,
                ..
            } if *total_bytes > 0 => Some(*uploaded_bytes as f64 / *total_bytes as f64),
            _ => None,
        }
    }
}
