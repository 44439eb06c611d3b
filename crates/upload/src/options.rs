//! Upload options and strategy selection.

use std::fmt;
use std::str::FromStr;

use partwise_transfer::{DEFAULT_PART_SIZE, DigestAlgorithm};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Largest content sent as a single request by default (20 MiB).
pub const DEFAULT_SINGLE_REQUEST_LIMIT: u64 = 20 * 1024 * 1024;

/// Options for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// Window size in bytes. A part size fixed by the transport's
    /// session takes precedence.
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// Maximum part uploads in flight. 1 uploads strictly sequentially.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Digest used for parts and for the whole content.
    #[serde(default)]
    pub digest: DigestAlgorithm,

    /// Content up to this size may be sent in one request.
    #[serde(default = "default_single_request_limit")]
    pub single_request_limit: u64,
}

fn default_part_size() -> u64 {
    DEFAULT_PART_SIZE
}

fn default_max_in_flight() -> usize {
    1
}

fn default_single_request_limit() -> u64 {
    DEFAULT_SINGLE_REQUEST_LIMIT
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            part_size: default_part_size(),
            max_in_flight: default_max_in_flight(),
            digest: DigestAlgorithm::default(),
            single_request_limit: default_single_request_limit(),
        }
    }
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_single_request_limit(mut self, limit: u64) -> Self {
        self.single_request_limit = limit;
        self
    }

    /// Rejects options no upload could run with.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.part_size == 0 {
            return Err(UploadError::InvalidArgument("part size must be > 0".into()));
        }
        if self.max_in_flight == 0 {
            return Err(UploadError::InvalidArgument(
                "max in-flight parts must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// How the caller wants content sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyRequest {
    /// Single request when the content fits, chunked otherwise.
    #[default]
    Auto,
    /// Single request; only valid for content within the limit.
    Single,
    /// Chunked session regardless of size.
    Chunked,
}

impl fmt::Display for StrategyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Single => "single",
            Self::Chunked => "chunked",
        })
    }
}

impl FromStr for StrategyRequest {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "single" => Ok(Self::Single),
            "chunked" | "manual" => Ok(Self::Chunked),
            other => Err(UploadError::InvalidArgument(format!(
                "unknown strategy: {other}"
            ))),
        }
    }
}

/// The path an upload takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    SingleRequest,
    Chunked,
}

/// Picks the upload path for `total_size` bytes.
///
/// Content over `single_request_limit` is always chunked; there is no
/// size for which nothing gets uploaded.
pub fn choose_strategy(
    total_size: u64,
    options: &UploadOptions,
    requested: StrategyRequest,
) -> Result<UploadStrategy, UploadError> {
    if total_size == 0 {
        return Err(UploadError::InvalidArgument(
            "content must not be empty".into(),
        ));
    }
    let fits = total_size <= options.single_request_limit;
    match requested {
        StrategyRequest::Chunked => Ok(UploadStrategy::Chunked),
        StrategyRequest::Auto if fits => Ok(UploadStrategy::SingleRequest),
        StrategyRequest::Auto => Ok(UploadStrategy::Chunked),
        StrategyRequest::Single if fits => Ok(UploadStrategy::SingleRequest),
        StrategyRequest::Single => Err(UploadError::InvalidArgument(format!(
            "{total_size} bytes exceeds the single-request limit of {} bytes",
            options.single_request_limit
        ))),
    }
}
