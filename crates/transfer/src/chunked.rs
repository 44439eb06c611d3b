use tokio::io::{AsyncRead, AsyncReadExt};

use crate::source::ContentSource;
use crate::window::{ChunkWindow, WindowPlan};
use crate::{DEFAULT_PART_SIZE, TransferError};

/// Reads a content source one window at a time, left to right.
pub struct ChunkReader<R> {
    source: ContentSource<R>,
    plan: WindowPlan,
    next_index: u64,
    offset: u64,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Creates a reader over `source` using windows of `part_size` bytes.
    ///
    /// If `part_size` is 0, [`DEFAULT_PART_SIZE`] (8 MiB) is used. Fails
    /// if the source declares a length of 0.
    pub fn new(source: ContentSource<R>, part_size: u64) -> Result<Self, TransferError> {
        let part_size = if part_size == 0 {
            DEFAULT_PART_SIZE
        } else {
            part_size
        };
        let plan = WindowPlan::new(source.total_size(), part_size)?;
        Ok(Self {
            source,
            plan,
            next_index: 0,
            offset: 0,
        })
    }

    /// Reads the next window. Returns `None` once the declared length
    /// has been consumed.
    ///
    /// A source that ends before its declared length yields
    /// [`TransferError::Truncated`].
    pub async fn next_window(&mut self) -> Result<Option<ChunkWindow>, TransferError> {
        let Some(bounds) = self.plan.window(self.next_index) else {
            return Ok(None);
        };

        let mut data = vec![0u8; bounds.len as usize];
        let mut filled = 0usize;
        while filled < data.len() {
            let n = self.source.reader_mut().read(&mut data[filled..]).await?;
            if n == 0 {
                return Err(TransferError::Truncated {
                    offset: self.offset + filled as u64,
                    expected: bounds.len - filled as u64,
                });
            }
            filled += n;
        }

        self.next_index += 1;
        self.offset += bounds.len;
        Ok(Some(ChunkWindow { bounds, data }))
    }

    pub fn plan(&self) -> &WindowPlan {
        &self.plan
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> u64 {
        self.plan.total_size() - self.offset
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }
}
