use partwise_protocol::ByteRange;

use crate::TransferError;

/// Splits `total_size` bytes into consecutive windows of `part_size`.
///
/// Windows cover `[0, total_size)` exactly once, left to right. Every
/// window is `part_size` long except possibly the last, which holds the
/// remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    total_size: u64,
    part_size: u64,
}

impl WindowPlan {
    /// Creates a plan. Both sizes must be non-zero.
    pub fn new(total_size: u64, part_size: u64) -> Result<Self, TransferError> {
        if total_size == 0 {
            return Err(TransferError::InvalidPlan("total size must be > 0".into()));
        }
        if part_size == 0 {
            return Err(TransferError::InvalidPlan("part size must be > 0".into()));
        }
        Ok(Self {
            total_size,
            part_size,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Number of windows: `ceil(total_size / part_size)`.
    pub fn window_count(&self) -> u64 {
        self.total_size.div_ceil(self.part_size)
    }

    /// Bounds of the window at `index`, or `None` past the end.
    pub fn window(&self, index: u64) -> Option<WindowBounds> {
        let start = index.checked_mul(self.part_size)?;
        if start >= self.total_size {
            return None;
        }
        let len = self.part_size.min(self.total_size - start);
        Some(WindowBounds {
            index,
            start,
            len,
            total: self.total_size,
        })
    }

    /// Iterates all windows in ascending offset order.
    pub fn windows(&self) -> impl Iterator<Item = WindowBounds> {
        let plan = *self;
        (0..plan.window_count()).filter_map(move |i| plan.window(i))
    }
}

/// Position and length of one window, without its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub index: u64,
    pub start: u64,
    pub len: u64,
    pub total: u64,
}

impl WindowBounds {
    /// The window as an inclusive byte range.
    pub fn range(&self) -> ByteRange {
        ByteRange {
            start: self.start,
            end: self.start + self.len - 1,
            total: self.total,
        }
    }
}

/// One window's worth of bytes read from a content source.
///
/// Lives for a single upload step: hashed, sent, then dropped.
#[derive(Debug, Clone)]
pub struct ChunkWindow {
    pub bounds: WindowBounds,
    pub data: Vec<u8>,
}

impl ChunkWindow {
    pub fn index(&self) -> u64 {
        self.bounds.index
    }

    pub fn start(&self) -> u64 {
        self.bounds.start
    }

    pub fn len(&self) -> u64 {
        self.bounds.len
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn range(&self) -> ByteRange {
        self.bounds.range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(plan: &WindowPlan) -> Vec<u64> {
        plan.windows().map(|w| w.len).collect()
    }

    #[test]
    fn twenty_megabytes_in_eight_mebibyte_parts() {
        let plan = WindowPlan::new(20_000_000, 8_388_608).unwrap();
        assert_eq!(plan.window_count(), 3);
        assert_eq!(sizes(&plan), vec![8_388_608, 8_388_608, 3_222_784]);
    }

    #[test]
    fn exact_multiple_has_only_full_windows() {
        let plan = WindowPlan::new(8_388_608, 8_388_608).unwrap();
        assert_eq!(sizes(&plan), vec![8_388_608]);

        let plan = WindowPlan::new(12, 4).unwrap();
        assert_eq!(sizes(&plan), vec![4, 4, 4]);
    }

    #[test]
    fn content_smaller_than_one_part() {
        let plan = WindowPlan::new(10, 4096).unwrap();
        let windows: Vec<_> = plan.windows().collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, 0);
        assert_eq!(windows[0].len, 10);
        assert_eq!(windows[0].range().to_string(), "bytes 0-9/10");
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(matches!(
            WindowPlan::new(0, 4),
            Err(TransferError::InvalidPlan(_))
        ));
        assert!(matches!(
            WindowPlan::new(4, 0),
            Err(TransferError::InvalidPlan(_))
        ));
    }

    #[test]
    fn windows_cover_content_exactly_once() {
        for total in 1..=40u64 {
            for part in 1..=12u64 {
                let plan = WindowPlan::new(total, part).unwrap();
                let windows: Vec<_> = plan.windows().collect();

                assert_eq!(windows.len() as u64, total.div_ceil(part));

                let mut expected = 0;
                for w in &windows {
                    assert_eq!(w.start, expected, "gap or overlap at {expected}");
                    assert!(w.len > 0 && w.len <= part);
                    expected += w.len;
                }
                assert_eq!(expected, total);

                let last = windows.last().unwrap();
                assert_eq!(last.len, total - part * (windows.len() as u64 - 1));
            }
        }
    }

    #[test]
    fn window_past_end_is_none() {
        let plan = WindowPlan::new(10, 4).unwrap();
        assert!(plan.window(2).is_some());
        assert!(plan.window(3).is_none());
        assert!(plan.window(u64::MAX).is_none());
    }

    #[test]
    fn second_window_range() {
        let plan = WindowPlan::new(20_000_000, 8_388_608).unwrap();
        let r = plan.window(1).unwrap().range();
        assert_eq!((r.start, r.end), (8_388_608, 16_777_215));
    }
}
