use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// ByteRange
// ---------------------------------------------------------------------------

/// An inclusive byte range `start..=end` within content of `total` bytes.
///
/// Renders as a partial-content range, `bytes 0-8388607/20000000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// Builds the range covering `len` bytes starting at `start`.
    pub fn from_offset(start: u64, len: u64, total: u64) -> Result<Self, ProtocolError> {
        if len == 0 {
            return Err(ProtocolError::InvalidRange(format!(
                "empty range at offset {start}"
            )));
        }
        Self::new(start, start + len - 1, total)
    }

    /// Builds a range from its inclusive bounds.
    pub fn new(start: u64, end: u64, total: u64) -> Result<Self, ProtocolError> {
        if start > end {
            return Err(ProtocolError::InvalidRange(format!(
                "start {start} is past end {end}"
            )));
        }
        if end >= total {
            return Err(ProtocolError::InvalidRange(format!(
                "end {end} is outside content of {total} bytes"
            )));
        }
        Ok(Self { start, end, total })
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`: a range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns `true` if this range ends at the last byte of the content.
    pub fn is_last(&self) -> bool {
        self.end + 1 == self.total
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

impl FromStr for ByteRange {
    type Err = ProtocolError;

    /// Parses `bytes <start>-<end>/<total>` (the `bytes ` unit is optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidRange(s.to_string());

        let value = s.trim();
        let value = value.strip_prefix("bytes ").unwrap_or(value);
        let (bounds, total) = value.split_once('/').ok_or_else(invalid)?;
        let (start, end) = bounds.split_once('-').ok_or_else(invalid)?;

        let start = start.trim().parse::<u64>().map_err(|_| invalid())?;
        let end = end.trim().parse::<u64>().map_err(|_| invalid())?;
        let total = total.trim().parse::<u64>().map_err(|_| invalid())?;
        Self::new(start, end, total)
    }
}

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// An encoded content digest, e.g. `sha=qZk+NkcGgWq6PiVxeFDCbJzQ2J0=`.
///
/// The encoding is chosen by the digest engine; transports compare
/// digests as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Sessions and parts
// ---------------------------------------------------------------------------

/// Where an upload lands: a folder and a file name inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub folder_id: String,
    pub file_name: String,
}

impl UploadTarget {
    pub fn new(folder_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            file_name: file_name.into(),
        }
    }
}

/// A server-side upload session, created once per upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: String,
    pub folder_id: String,
    pub file_name: String,
    pub total_size: u64,
    /// Part size fixed by the provider, if it dictates one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,
}

/// Server-side record of one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDescriptor {
    pub part_id: String,
    pub offset: u64,
    pub size: u64,
    pub digest: ContentDigest,
}

impl PartDescriptor {
    /// Offset one past the last byte of this part, or `None` if it
    /// does not fit in a `u64`.
    pub fn end_offset(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// A committed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfirmation {
    pub file_id: String,
    pub folder_id: String,
    pub file_name: String,
    pub size: u64,
    pub digest: ContentDigest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_display_is_content_range() {
        let r = ByteRange::from_offset(8_388_608, 8_388_608, 20_000_000).unwrap();
        assert_eq!(r.to_string(), "bytes 8388608-16777215/20000000");
        assert_eq!(r.len(), 8_388_608);
        assert!(!r.is_last());
    }

    #[test]
    fn range_last_byte() {
        let r = ByteRange::from_offset(16_777_216, 3_222_784, 20_000_000).unwrap();
        assert_eq!(r.end, 19_999_999);
        assert!(r.is_last());
    }

    #[test]
    fn range_rejects_out_of_bounds() {
        assert!(ByteRange::new(5, 4, 10).is_err());
        assert!(ByteRange::new(0, 10, 10).is_err());
        assert!(ByteRange::from_offset(0, 0, 10).is_err());
    }

    #[test]
    fn range_parses_with_and_without_unit() {
        let r: ByteRange = "bytes 0-99/100".parse().unwrap();
        assert_eq!(r, ByteRange::new(0, 99, 100).unwrap());

        let r: ByteRange = "10-19/20".parse().unwrap();
        assert_eq!(r.len(), 10);
    }

    #[test]
    fn range_parse_rejects_garbage() {
        assert!("bytes 0-99".parse::<ByteRange>().is_err());
        assert!("bytes a-b/c".parse::<ByteRange>().is_err());
        assert!("bytes 0-100/100".parse::<ByteRange>().is_err());
    }

    #[test]
    fn digest_serializes_as_plain_string() {
        let d = ContentDigest::new("sha=abc");
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"sha=abc\"");
    }

    #[test]
    fn session_omits_absent_part_size() {
        let s = UploadSession {
            id: "S1".into(),
            folder_id: "0".into(),
            file_name: "test.zip".into(),
            total_size: 10,
            part_size: None,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("part_size"));

        let back: UploadSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn part_end_offset() {
        let p = PartDescriptor {
            part_id: "6F2D3486".into(),
            offset: 8,
            size: 4,
            digest: ContentDigest::new("sha=x"),
        };
        assert_eq!(p.end_offset(), Some(12));

        let huge = PartDescriptor {
            size: u64::MAX,
            ..p
        };
        assert_eq!(huge.end_offset(), None);
    }
}
