use std::path::Path;

use tokio::io::AsyncRead;

use crate::TransferError;

/// A sequential byte source with a known total length.
///
/// The source is only ever read front to back and never written.
pub struct ContentSource<R> {
    reader: R,
    total_size: u64,
    name: String,
}

impl<R: AsyncRead + Unpin> ContentSource<R> {
    /// Wraps `reader`, which must yield exactly `total_size` bytes.
    pub fn new(reader: R, total_size: u64) -> Self {
        Self {
            reader,
            total_size,
            name: String::new(),
        }
    }

    /// Attaches a display name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }
}

impl ContentSource<tokio::fs::File> {
    /// Opens a file; its current length becomes the declared size.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        let total_size = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file, total_size).with_name(name))
    }
}

impl ContentSource<std::io::Cursor<Vec<u8>>> {
    /// An in-memory source over `data`.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let total_size = data.len() as u64;
        Self::new(std::io::Cursor::new(data), total_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn open_takes_length_and_name_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.zip");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"0123456789")
            .unwrap();

        let source = ContentSource::open(&path).await.unwrap();
        assert_eq!(source.total_size(), 10);
        assert_eq!(source.name(), "test.zip");
    }

    #[tokio::test]
    async fn open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ContentSource::open(&dir.path().join("absent.bin")).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[test]
    fn from_bytes_declares_buffer_length() {
        let source = ContentSource::from_bytes(vec![0u8; 42]);
        assert_eq!(source.total_size(), 42);
        assert_eq!(source.name(), "");
    }
}
