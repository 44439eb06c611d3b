//! Reading content in fixed-size windows and computing content digests.
//!
//! A [`ContentSource`] is any sequential reader with a declared length.
//! [`WindowPlan`] splits that length into part-sized windows and
//! [`ChunkReader`] materializes them one at a time, so at most one
//! window is resident per reader. [`Digester`] hashes windows and,
//! fed the same bytes, the whole content in a single pass.

mod chunked;
mod digest;
mod progress;
mod source;
mod validation;
mod window;

pub use chunked::ChunkReader;
pub use digest::{DigestAlgorithm, Digester, checksum_bytes, digest_file, digest_source};
pub use progress::ThroughputMeter;
pub use source::ContentSource;
pub use validation::validate_target_path;
pub use window::{ChunkWindow, WindowBounds, WindowPlan};

/// Default part size: 8 MiB.
pub const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid window plan: {0}")]
    InvalidPlan(String),

    #[error("source ended at offset {offset}: expected {expected} more bytes")]
    Truncated { offset: u64, expected: u64 },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),
}
