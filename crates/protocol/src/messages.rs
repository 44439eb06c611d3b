use serde::{Deserialize, Serialize};

use crate::types::{ContentDigest, PartDescriptor};

/// Finalizes a session from its ordered part manifest.
///
/// `parts` must be in ascending offset order; transports rely on the
/// order to check contiguity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub session_id: String,
    pub parts: Vec<PartDescriptor>,
    pub digest: ContentDigest,
}

impl CommitRequest {
    /// Total bytes described by the manifest, saturating at `u64::MAX`.
    pub fn manifest_size(&self) -> u64 {
        self.parts
            .iter()
            .fold(0u64, |total, p| total.saturating_add(p.size))
    }

    /// Returns the first offset at which the manifest is not contiguous,
    /// or `None` if parts cover `[0, total)` with no gaps or overlaps.
    pub fn first_gap(&self, total: u64) -> Option<u64> {
        let mut expected = 0u64;
        for part in &self.parts {
            if part.offset != expected || part.size == 0 {
                return Some(expected);
            }
            match part.end_offset() {
                Some(end) if end <= total => expected = end,
                _ => return Some(expected),
            }
        }
        (expected != total).then_some(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(offset: u64, size: u64) -> PartDescriptor {
        PartDescriptor {
            part_id: format!("P{offset}"),
            offset,
            size,
            digest: ContentDigest::new("sha=x"),
        }
    }

    fn request(parts: Vec<PartDescriptor>) -> CommitRequest {
        CommitRequest {
            session_id: "S1".into(),
            parts,
            digest: ContentDigest::new("sha=whole"),
        }
    }

    #[test]
    fn contiguous_manifest_has_no_gap() {
        let req = request(vec![part(0, 4), part(4, 4), part(8, 2)]);
        assert_eq!(req.first_gap(10), None);
        assert_eq!(req.manifest_size(), 10);
    }

    #[test]
    fn detects_hole() {
        let req = request(vec![part(0, 4), part(6, 4)]);
        assert_eq!(req.first_gap(10), Some(4));
    }

    #[test]
    fn detects_overlap_and_disorder() {
        let req = request(vec![part(0, 4), part(2, 8)]);
        assert_eq!(req.first_gap(10), Some(4));

        let req = request(vec![part(4, 4), part(0, 4)]);
        assert_eq!(req.first_gap(8), Some(0));
    }

    #[test]
    fn oversized_part_is_a_gap_not_an_overflow() {
        let req = request(vec![part(0, 4), part(4, u64::MAX)]);
        assert_eq!(req.first_gap(10), Some(4));
        assert_eq!(req.manifest_size(), u64::MAX);

        let req = request(vec![part(0, 4), part(4, 8)]);
        assert_eq!(req.first_gap(10), Some(4));
    }

    #[test]
    fn detects_short_manifest() {
        let req = request(vec![part(0, 4)]);
        assert_eq!(req.first_gap(10), Some(4));
        assert_eq!(request(Vec::new()).first_gap(1), Some(0));
    }

    #[test]
    fn commit_request_json_shape() {
        let req = request(vec![part(0, 4)]);
        let v: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(v["session_id"], "S1");
        assert_eq!(v["digest"], "sha=whole");
        assert_eq!(v["parts"][0]["offset"], 0);
        assert_eq!(v["parts"][0]["size"], 4);
    }
}
