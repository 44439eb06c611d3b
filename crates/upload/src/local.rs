//! Filesystem-backed upload transport.
//!
//! Stores each open session as a preallocated staging file under
//! `<root>/.partwise-sessions/` and moves it to
//! `<root>/<folder>/<file name>` on commit. Folder id `"0"` is the root
//! itself. Every part digest is checked against its bytes, and the
//! whole-content digest is recomputed from the staging file before the
//! commit is accepted.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use partwise_protocol::{
    ByteRange, CommitRequest, ContentDigest, PartDescriptor, UploadConfirmation, UploadSession,
    UploadTarget,
};
use partwise_transfer::{DigestAlgorithm, checksum_bytes, digest_file, validate_target_path};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::{TransportFuture, UploadTransport};

const SESSIONS_DIR: &str = ".partwise-sessions";
const ROOT_FOLDER_ID: &str = "0";

/// Local store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    /// Directory files are committed into.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Sessions for larger content are refused.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Part size imposed on every session, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,

    /// Algorithm the client digests with.
    #[serde(default)]
    pub digest: DigestAlgorithm,
}

fn default_root() -> PathBuf {
    PathBuf::from("partwise-store")
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024 * 1024
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            max_file_size: default_max_file_size(),
            part_size: None,
            digest: DigestAlgorithm::default(),
        }
    }
}

impl LocalStoreConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}

struct OpenSession {
    session: UploadSession,
    staging: PathBuf,
    parts: HashMap<String, PartDescriptor>,
}

/// Upload transport writing into a local directory.
pub struct LocalTransport {
    config: LocalStoreConfig,
    sessions: Mutex<HashMap<String, OpenSession>>,
}

impl LocalTransport {
    pub fn new(config: LocalStoreConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LocalStoreConfig {
        &self.config
    }

    /// Number of sessions not yet committed or aborted.
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Handles of all open sessions, for cleanup after a failed upload.
    pub fn pending_sessions(&self) -> Vec<UploadSession> {
        self.sessions
            .lock()
            .map(|s| s.values().map(|open| open.session.clone()).collect())
            .unwrap_or_default()
    }

    /// Where a committed file for `target` lives.
    pub fn destination(&self, target: &UploadTarget) -> PathBuf {
        let folder = if target.folder_id == ROOT_FOLDER_ID {
            self.config.root.clone()
        } else {
            self.config.root.join(&target.folder_id)
        };
        folder.join(&target.file_name)
    }

    fn check_target(&self, target: &UploadTarget, total_size: u64) -> Result<(), TransportError> {
        for name in [&target.folder_id, &target.file_name] {
            validate_target_path(name)
                .map_err(|e| TransportError::new(400, "invalid_name", e.to_string()))?;
        }
        if total_size == 0 {
            return Err(TransportError::new(
                400,
                "empty_file",
                "content must not be empty",
            ));
        }
        if total_size > self.config.max_file_size {
            return Err(TransportError::new(
                413,
                "file_size_too_large",
                format!(
                    "{total_size} bytes exceeds the limit of {} bytes",
                    self.config.max_file_size
                ),
            ));
        }
        Ok(())
    }

    fn check_digest(&self, digest: &ContentDigest, data: &[u8]) -> Result<(), TransportError> {
        let actual = checksum_bytes(self.config.digest, data);
        if &actual != digest {
            return Err(TransportError::new(
                412,
                "digest_mismatch",
                format!("expected {digest}, content hashes to {actual}"),
            ));
        }
        Ok(())
    }

    fn lock_sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, OpenSession>>, TransportError> {
        self.sessions
            .lock()
            .map_err(|_| TransportError::new(500, "internal_error", "session table poisoned"))
    }

    fn session_not_found(id: &str) -> TransportError {
        TransportError::new(404, "session_not_found", format!("no open session {id}"))
    }

    async fn create_session_impl(
        &self,
        target: &UploadTarget,
        total_size: u64,
    ) -> Result<UploadSession, TransportError> {
        self.check_target(target, total_size)?;

        let id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        let staging_dir = self.config.root.join(SESSIONS_DIR);
        tokio::fs::create_dir_all(&staging_dir).await?;
        let staging = staging_dir.join(format!("{id}.part"));
        let file = tokio::fs::File::create(&staging).await?;
        file.set_len(total_size).await?;

        let session = UploadSession {
            id: id.clone(),
            folder_id: target.folder_id.clone(),
            file_name: target.file_name.clone(),
            total_size,
            part_size: self.config.part_size,
        };
        self.lock_sessions()?.insert(
            id.clone(),
            OpenSession {
                session: session.clone(),
                staging,
                parts: HashMap::new(),
            },
        );

        info!(session_id = %id, total_size, "local upload session opened");
        Ok(session)
    }

    async fn upload_part_impl(
        &self,
        session: &UploadSession,
        range: ByteRange,
        digest: ContentDigest,
        data: Vec<u8>,
    ) -> Result<PartDescriptor, TransportError> {
        let (staging, total_size, part_size) = {
            let sessions = self.lock_sessions()?;
            let open = sessions
                .get(&session.id)
                .ok_or_else(|| Self::session_not_found(&session.id))?;
            (
                open.staging.clone(),
                open.session.total_size,
                open.session.part_size,
            )
        };

        if range.total != total_size {
            return Err(TransportError::new(
                416,
                "range_mismatch",
                format!("{range} does not match session size {total_size}"),
            ));
        }
        if range.len() != data.len() as u64 {
            return Err(TransportError::new(
                400,
                "length_mismatch",
                format!("{range} carries {} bytes", data.len()),
            ));
        }
        if let Some(part_size) = part_size.filter(|&p| p > 0)
            && (range.start % part_size != 0 || (range.len() != part_size && !range.is_last()))
        {
            return Err(TransportError::new(
                416,
                "range_not_aligned",
                format!("{range} is not aligned to parts of {part_size} bytes"),
            ));
        }
        self.check_digest(&digest, &data)?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&staging)
            .await?;
        file.seek(SeekFrom::Start(range.start)).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        let part_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let part = PartDescriptor {
            part_id: part_id.clone(),
            offset: range.start,
            size: range.len(),
            digest,
        };

        let mut sessions = self.lock_sessions()?;
        let open = sessions
            .get_mut(&session.id)
            .ok_or_else(|| Self::session_not_found(&session.id))?;
        open.parts.insert(part_id, part.clone());

        debug!(session_id = %session.id, part_id = %part.part_id, %range, "part stored");
        Ok(part)
    }

    async fn commit_impl(
        &self,
        session: &UploadSession,
        request: CommitRequest,
    ) -> Result<UploadConfirmation, TransportError> {
        if request.session_id != session.id {
            return Err(TransportError::new(
                400,
                "session_mismatch",
                format!(
                    "commit for {} sent to session {}",
                    request.session_id, session.id
                ),
            ));
        }

        let (staging, stored) = {
            let sessions = self.lock_sessions()?;
            let open = sessions
                .get(&session.id)
                .ok_or_else(|| Self::session_not_found(&session.id))?;
            (open.staging.clone(), open.parts.clone())
        };

        for part in &request.parts {
            if stored.get(&part.part_id) != Some(part) {
                return Err(TransportError::new(
                    400,
                    "unknown_part",
                    format!("part {} was not uploaded to this session", part.part_id),
                ));
            }
        }
        if let Some(offset) = request.first_gap(session.total_size) {
            return Err(TransportError::new(
                400,
                "non_contiguous_parts",
                format!("parts do not cover the file at offset {offset}"),
            ));
        }

        let actual = digest_file(self.config.digest, &staging)
            .await
            .map_err(|e| TransportError::new(500, "io_error", e.to_string()))?;
        if actual != request.digest {
            return Err(TransportError::new(
                412,
                "digest_mismatch",
                format!(
                    "expected {}, assembled file hashes to {actual}",
                    request.digest
                ),
            ));
        }

        let target = UploadTarget::new(&session.folder_id, &session.file_name);
        let destination = self.destination(&target);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&staging, &destination).await?;
        write_manifest(&destination, &request).await?;

        self.lock_sessions()?.remove(&session.id);

        info!(
            session_id = %session.id,
            path = %destination.display(),
            parts = request.parts.len(),
            "local upload committed"
        );
        Ok(UploadConfirmation {
            file_id: uuid::Uuid::new_v4().simple().to_string(),
            folder_id: session.folder_id.clone(),
            file_name: session.file_name.clone(),
            size: session.total_size,
            digest: request.digest,
        })
    }

    async fn upload_whole_impl(
        &self,
        target: &UploadTarget,
        digest: ContentDigest,
        data: Vec<u8>,
    ) -> Result<UploadConfirmation, TransportError> {
        self.check_target(target, data.len() as u64)?;
        self.check_digest(&digest, &data)?;

        let destination = self.destination(target);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&destination, &data).await?;

        info!(path = %destination.display(), bytes = data.len(), "local single upload stored");
        Ok(UploadConfirmation {
            file_id: uuid::Uuid::new_v4().simple().to_string(),
            folder_id: target.folder_id.clone(),
            file_name: target.file_name.clone(),
            size: data.len() as u64,
            digest,
        })
    }

    async fn abort_impl(&self, session: &UploadSession) -> Result<(), TransportError> {
        let open = self
            .lock_sessions()?
            .remove(&session.id)
            .ok_or_else(|| Self::session_not_found(&session.id))?;

        match tokio::fs::remove_file(&open.staging).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "failed to remove staging file");
                return Err(e.into());
            }
        }
        info!(session_id = %session.id, "local upload session aborted");
        Ok(())
    }
}

/// Writes the commit manifest next to the committed file.
async fn write_manifest(destination: &Path, request: &CommitRequest) -> Result<(), TransportError> {
    let mut name = destination.as_os_str().to_owned();
    name.push(".manifest.json");
    let json = serde_json::to_vec_pretty(request)
        .map_err(|e| TransportError::new(500, "serialization_error", e.to_string()))?;
    tokio::fs::write(PathBuf::from(name), json).await?;
    Ok(())
}

impl UploadTransport for LocalTransport {
    fn create_session<'a>(
        &'a self,
        target: &'a UploadTarget,
        total_size: u64,
    ) -> TransportFuture<'a, UploadSession> {
        Box::pin(self.create_session_impl(target, total_size))
    }

    fn upload_part<'a>(
        &'a self,
        session: &'a UploadSession,
        range: ByteRange,
        digest: ContentDigest,
        data: Vec<u8>,
    ) -> TransportFuture<'a, PartDescriptor> {
        Box::pin(self.upload_part_impl(session, range, digest, data))
    }

    fn commit<'a>(
        &'a self,
        session: &'a UploadSession,
        request: CommitRequest,
    ) -> TransportFuture<'a, UploadConfirmation> {
        Box::pin(self.commit_impl(session, request))
    }

    fn upload_whole<'a>(
        &'a self,
        target: &'a UploadTarget,
        digest: ContentDigest,
        data: Vec<u8>,
    ) -> TransportFuture<'a, UploadConfirmation> {
        Box::pin(self.upload_whole_impl(target, digest, data))
    }

    fn abort<'a>(&'a self, session: &'a UploadSession) -> TransportFuture<'a, ()> {
        Box::pin(self.abort_impl(session))
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(dir: &Path) -> LocalTransport {
        LocalTransport::new(LocalStoreConfig::default().with_root(dir))
    }

    fn sha(data: &[u8]) -> ContentDigest {
        checksum_bytes(DigestAlgorithm::Sha1Base64, data)
    }

    #[tokio::test]
    async fn session_parts_commit_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let target = UploadTarget::new("reports", "q3.bin");
        let data = b"0123456789".to_vec();

        let session = t.create_session(&target, 10).await.unwrap();
        assert_eq!(t.open_sessions(), 1);

        let r1 = ByteRange::new(0, 5, 10).unwrap();
        let r2 = ByteRange::new(6, 9, 10).unwrap();
        let p1 = t
            .upload_part(&session, r1, sha(&data[..6]), data[..6].to_vec())
            .await
            .unwrap();
        let p2 = t
            .upload_part(&session, r2, sha(&data[6..]), data[6..].to_vec())
            .await
            .unwrap();
        assert_eq!(p1.part_id.len(), 8);
        assert_eq!((p2.offset, p2.size), (6, 4));

        let request = CommitRequest {
            session_id: session.id.clone(),
            parts: vec![p1, p2],
            digest: sha(&data),
        };
        let confirmation = t.commit(&session, request).await.unwrap();
        assert_eq!(confirmation.size, 10);
        assert_eq!(t.open_sessions(), 0);

        let dest = dir.path().join("reports/q3.bin");
        assert_eq!(std::fs::read(&dest).unwrap(), data);
        assert!(dir.path().join("reports/q3.bin.manifest.json").exists());
    }

    #[tokio::test]
    async fn root_folder_maps_to_store_root() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let target = UploadTarget::new("0", "test.zip");
        assert_eq!(t.destination(&target), dir.path().join("test.zip"));
    }

    #[tokio::test]
    async fn rejects_oversized_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LocalStoreConfig::default().with_root(dir.path());
        config.max_file_size = 100;
        let t = LocalTransport::new(config);

        let err = t
            .create_session(&UploadTarget::new("0", "big.bin"), 101)
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(413));
        assert_eq!(err.code, "file_size_too_large");
    }

    #[tokio::test]
    async fn rejects_traversal_in_names() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let err = t
            .create_session(&UploadTarget::new("..", "escape.bin"), 1)
            .await
            .unwrap_err();
        assert_eq!(err.code, "invalid_name");
    }

    #[tokio::test]
    async fn rejects_part_with_wrong_digest() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let session = t
            .create_session(&UploadTarget::new("0", "a.bin"), 4)
            .await
            .unwrap();

        let err = t
            .upload_part(
                &session,
                ByteRange::new(0, 3, 4).unwrap(),
                sha(b"nope"),
                b"data".to_vec(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "digest_mismatch");
    }

    #[tokio::test]
    async fn rejects_length_and_range_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let session = t
            .create_session(&UploadTarget::new("0", "a.bin"), 4)
            .await
            .unwrap();

        let err = t
            .upload_part(
                &session,
                ByteRange::new(0, 1, 4).unwrap(),
                sha(b"data"),
                b"data".to_vec(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "length_mismatch");

        let err = t
            .upload_part(
                &session,
                ByteRange::new(0, 3, 8).unwrap(),
                sha(b"data"),
                b"data".to_vec(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "range_mismatch");
    }

    #[tokio::test]
    async fn enforces_dictated_part_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LocalStoreConfig::default().with_root(dir.path());
        config.part_size = Some(4);
        let t = LocalTransport::new(config);
        let session = t
            .create_session(&UploadTarget::new("0", "a.bin"), 10)
            .await
            .unwrap();
        assert_eq!(session.part_size, Some(4));

        let err = t
            .upload_part(
                &session,
                ByteRange::new(0, 2, 10).unwrap(),
                sha(b"abc"),
                b"abc".to_vec(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "range_not_aligned");

        // The short last part is allowed.
        t.upload_part(
            &session,
            ByteRange::new(8, 9, 10).unwrap(),
            sha(b"yz"),
            b"yz".to_vec(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn commit_rejects_gaps_and_bad_digest() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let session = t
            .create_session(&UploadTarget::new("0", "a.bin"), 8)
            .await
            .unwrap();
        let p1 = t
            .upload_part(
                &session,
                ByteRange::new(0, 3, 8).unwrap(),
                sha(b"abcd"),
                b"abcd".to_vec(),
            )
            .await
            .unwrap();

        let gap = CommitRequest {
            session_id: session.id.clone(),
            parts: vec![p1.clone()],
            digest: sha(b"abcd"),
        };
        let err = t.commit(&session, gap).await.unwrap_err();
        assert_eq!(err.code, "non_contiguous_parts");

        let p2 = t
            .upload_part(
                &session,
                ByteRange::new(4, 7, 8).unwrap(),
                sha(b"efgh"),
                b"efgh".to_vec(),
            )
            .await
            .unwrap();
        let wrong = CommitRequest {
            session_id: session.id.clone(),
            parts: vec![p1, p2],
            digest: sha(b"something else"),
        };
        let err = t.commit(&session, wrong).await.unwrap_err();
        assert_eq!(err.status, Some(412));
        assert_eq!(t.open_sessions(), 1);
    }

    #[tokio::test]
    async fn commit_rejects_foreign_parts() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let session = t
            .create_session(&UploadTarget::new("0", "a.bin"), 4)
            .await
            .unwrap();
        let forged = PartDescriptor {
            part_id: "DEADBEEF".into(),
            offset: 0,
            size: 4,
            digest: sha(b"abcd"),
        };
        let request = CommitRequest {
            session_id: session.id.clone(),
            parts: vec![forged],
            digest: sha(b"abcd"),
        };
        let err = t.commit(&session, request).await.unwrap_err();
        assert_eq!(err.code, "unknown_part");
    }

    #[tokio::test]
    async fn abort_discards_staging() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let session = t
            .create_session(&UploadTarget::new("0", "a.bin"), 4)
            .await
            .unwrap();
        let staging = dir
            .path()
            .join(SESSIONS_DIR)
            .join(format!("{}.part", session.id));
        assert!(staging.exists());

        assert_eq!(t.pending_sessions(), vec![session.clone()]);
        t.abort(&session).await.unwrap();
        assert!(!staging.exists());
        assert!(t.pending_sessions().is_empty());
        assert_eq!(t.open_sessions(), 0);

        let err = t.abort(&session).await.unwrap_err();
        assert_eq!(err.code, "session_not_found");
    }

    #[tokio::test]
    async fn upload_whole_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path());
        let target = UploadTarget::new("0", "small.txt");

        let c = t
            .upload_whole(&target, sha(b"hello"), b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(c.size, 5);
        assert_eq!(std::fs::read(dir.path().join("small.txt")).unwrap(), b"hello");

        let err = t
            .upload_whole(&target, sha(b"other"), b"hello".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.code, "digest_mismatch");
    }
}
