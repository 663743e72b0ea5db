//! Dataset isolation: private copy-on-write snapshots of persisted state.

use arena_env::HarnessError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Suffix of the shared-memory sidecar file.
pub const SHM_SUFFIX: &str = "-shm";

/// Suffix of the write-ahead-log sidecar file.
pub const WAL_SUFFIX: &str = "-wal";

/// A private, independently mutable copy of a dataset file and its sidecars.
///
/// The snapshot owns its temporary directory: dropping the snapshot removes
/// the isolated copy. Every call to [`isolate`](DatasetSnapshot::isolate)
/// produces a fresh directory, so snapshots never overwrite each other and
/// parallel test runs stay independent.
pub struct DatasetSnapshot {
    dir: TempDir,
    primary: PathBuf,
}

impl DatasetSnapshot {
    /// Copies `source` and its `-shm`/`-wal` sidecars into a fresh private
    /// directory and returns the snapshot handle.
    ///
    /// Missing sidecars are tolerated: a freshly created dataset has none.
    /// Any other I/O failure is fatal.
    pub async fn isolate(source: &Path) -> Result<Self, HarnessError> {
        let dir = tempfile::Builder::new().prefix("arena-env-").tempdir()?;

        let file_name = source.file_name().ok_or_else(|| {
            HarnessError::store(format!("dataset path has no file name: {}", source.display()))
        })?;
        let primary = dir.path().join(file_name);

        debug!("Isolating dataset {} -> {}", source.display(), primary.display());
        copy_file(source, &primary).await?;

        for suffix in [SHM_SUFFIX, WAL_SUFFIX] {
            let from = sidecar_path(source, suffix);
            match tokio::fs::metadata(&from).await {
                Ok(_) => copy_file(&from, &sidecar_path(&primary, suffix)).await?,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    // Fresh datasets have no sidecars yet
                    warn!("Sidecar {} not present, skipping", from.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self { dir, primary })
    }

    /// Path of the isolated primary dataset file.
    pub fn path(&self) -> &Path {
        &self.primary
    }

    /// Directory holding the isolated copies.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Appends a sidecar suffix to a path, `data.json` -> `data.json-wal`.
fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Streams all bytes of `from` into a newly created `to`.
async fn copy_file(from: &Path, to: &Path) -> Result<(), HarnessError> {
    let mut src = tokio::fs::File::open(from).await?;
    let mut dst = tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(to)
        .await?;
    tokio::io::copy(&mut src, &mut dst).await?;
    dst.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_dataset(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_isolate_copies_primary_bytes() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = write_dataset(source_dir.path(), "fleet.json", b"{\"servers\":[]}").await;

        let snapshot = DatasetSnapshot::isolate(&source).await.unwrap();

        assert_ne!(snapshot.path(), source.as_path());
        let copied = tokio::fs::read(snapshot.path()).await.unwrap();
        assert_eq!(copied, b"{\"servers\":[]}");
    }

    #[tokio::test]
    async fn test_isolate_copies_sidecars_when_present() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = write_dataset(source_dir.path(), "fleet.json", b"primary").await;
        write_dataset(source_dir.path(), "fleet.json-shm", b"shm bytes").await;
        write_dataset(source_dir.path(), "fleet.json-wal", b"wal bytes").await;

        let snapshot = DatasetSnapshot::isolate(&source).await.unwrap();

        let shm = tokio::fs::read(sidecar_path(snapshot.path(), SHM_SUFFIX))
            .await
            .unwrap();
        let wal = tokio::fs::read(sidecar_path(snapshot.path(), WAL_SUFFIX))
            .await
            .unwrap();
        assert_eq!(shm, b"shm bytes");
        assert_eq!(wal, b"wal bytes");
    }

    #[tokio::test]
    async fn test_missing_sidecars_are_tolerated() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = write_dataset(source_dir.path(), "fleet.json", b"primary").await;

        let snapshot = DatasetSnapshot::isolate(&source).await.unwrap();

        assert!(!sidecar_path(snapshot.path(), SHM_SUFFIX).exists());
        assert!(!sidecar_path(snapshot.path(), WAL_SUFFIX).exists());
    }

    #[tokio::test]
    async fn test_missing_primary_is_fatal() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("absent.json");

        let result = DatasetSnapshot::isolate(&source).await;
        assert!(matches!(result, Err(HarnessError::Io(_))));
    }

    #[tokio::test]
    async fn test_repeated_isolation_yields_distinct_targets() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = write_dataset(source_dir.path(), "fleet.json", b"primary").await;

        let first = DatasetSnapshot::isolate(&source).await.unwrap();
        let second = DatasetSnapshot::isolate(&source).await.unwrap();

        assert_ne!(first.path(), second.path());
    }

    #[tokio::test]
    async fn test_writes_to_snapshot_never_touch_source() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = write_dataset(source_dir.path(), "fleet.json", b"original").await;

        let snapshot = DatasetSnapshot::isolate(&source).await.unwrap();
        tokio::fs::write(snapshot.path(), b"mutated").await.unwrap();

        let original = tokio::fs::read(&source).await.unwrap();
        assert_eq!(original, b"original");
    }

    #[tokio::test]
    async fn test_snapshot_drop_removes_copy() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = write_dataset(source_dir.path(), "fleet.json", b"primary").await;

        let snapshot = DatasetSnapshot::isolate(&source).await.unwrap();
        let isolated = snapshot.path().to_path_buf();
        drop(snapshot);

        assert!(!isolated.exists());
    }
}
