use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use partwise_protocol::ContentDigest;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::TransferError;
use crate::source::ContentSource;

const DIGEST_BUFFER_SIZE: usize = 64 * 1024;

/// Digest algorithm and its string encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
    /// SHA-1, base64-encoded, rendered as `sha=<base64>`.
    #[default]
    Sha1Base64,
    /// SHA-256, lowercase hex.
    Sha256Hex,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1Base64 => "sha1-base64",
            Self::Sha256Hex => "sha256-hex",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1-base64" | "sha1" => Ok(Self::Sha1Base64),
            "sha256-hex" | "sha256" => Ok(Self::Sha256Hex),
            other => Err(TransferError::UnknownAlgorithm(other.to_string())),
        }
    }
}

enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

/// Incremental digest over a byte stream.
///
/// Feeding the same bytes in any split yields the same digest, so one
/// digester can follow the windows of a chunked read and produce the
/// whole-content digest without buffering the content.
pub struct Digester {
    algorithm: DigestAlgorithm,
    hasher: Hasher,
    bytes: u64,
}

impl Digester {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let hasher = match algorithm {
            DigestAlgorithm::Sha1Base64 => Hasher::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256Hex => Hasher::Sha256(Sha256::new()),
        };
        Self {
            algorithm,
            hasher,
            bytes: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.hasher {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
        self.bytes += data.len() as u64;
    }

    /// Bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn finalize(self) -> ContentDigest {
        match self.hasher {
            Hasher::Sha1(h) => ContentDigest::new(format!("sha={}", STANDARD.encode(h.finalize()))),
            Hasher::Sha256(h) => ContentDigest::new(hex::encode(h.finalize())),
        }
    }
}

/// Digest of an in-memory buffer.
pub fn checksum_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> ContentDigest {
    let mut digester = Digester::new(algorithm);
    digester.update(data);
    digester.finalize()
}

/// Streams a whole source through the digest without holding it in memory.
///
/// Fails with [`TransferError::Truncated`] if the source is shorter
/// than declared.
pub async fn digest_source<R: AsyncRead + Unpin>(
    algorithm: DigestAlgorithm,
    source: &mut ContentSource<R>,
) -> Result<ContentDigest, TransferError> {
    let total = source.total_size();
    let mut digester = Digester::new(algorithm);
    let mut buf = vec![0u8; DIGEST_BUFFER_SIZE];

    while digester.bytes_hashed() < total {
        let want = (total - digester.bytes_hashed()).min(buf.len() as u64) as usize;
        let n = source.reader_mut().read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(TransferError::Truncated {
                offset: digester.bytes_hashed(),
                expected: total - digester.bytes_hashed(),
            });
        }
        digester.update(&buf[..n]);
    }

    Ok(digester.finalize())
}

/// Digest of a file on disk.
pub async fn digest_file(
    algorithm: DigestAlgorithm,
    path: &Path,
) -> Result<ContentDigest, TransferError> {
    let mut source = ContentSource::open(path).await?;
    let digest = digest_source(algorithm, &mut source).await?;
    tracing::debug!(
        path = %path.display(),
        algorithm = %algorithm,
        bytes = source.total_size(),
        "file digest computed"
    );
    Ok(digest)
}
