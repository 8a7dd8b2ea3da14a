//! Ordered-list stores backing the available and leased sets
//!
//! The engine treats each set as an abstract ordered list with two
//! operations: read everything, replace everything. `LineFile` is the
//! durable implementation (one delimited record per line, atomic temp-file +
//! rename writes). `MemorySet` implements the same contract in memory for
//! embedding and tests.

use std::future::Future;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::LineRecord;

/// Persistence contract for one set of pool entries.
///
/// `replace_all` is transactional at the single-call level: it either fully
/// succeeds or leaves the previously persisted state observable to the next
/// `list`. Callers must not treat an in-memory mutation as committed when
/// `replace_all` fails.
pub trait SetStore<T>: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<T>>> + Send;
    fn replace_all(&self, entries: &[T]) -> impl Future<Output = Result<()>> + Send;
}

/// File-backed store: one entry per line, ordered top to bottom.
///
/// Reads go to disk on every `list`, so a failed write never leaves a stale
/// in-memory view behind. A missing file reads as the empty set. Malformed
/// lines are skipped with a warning rather than failing the read.
pub struct LineFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: LineRecord> LineFile<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: LineRecord + Send + Sync> SetStore<T> for LineFile<T> {
    async fn list(&self) -> Result<Vec<T>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "reading {}: {e}",
                    self.path.display()
                )));
            }
        };

        let mut entries = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match T::parse_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!(
                    path = %self.path.display(),
                    line = number + 1,
                    "skipping malformed entry"
                ),
            }
        }
        Ok(entries)
    }

    async fn replace_all(&self, entries: &[T]) -> Result<()> {
        let mut contents = entries
            .iter()
            .map(LineRecord::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        write_atomic(&self.path, contents.as_bytes()).await
    }
}

/// In-memory store with the same contract as `LineFile`.
#[derive(Default)]
pub struct MemorySet<T> {
    entries: Mutex<Vec<T>>,
}

impl<T> MemorySet<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone + Send + Sync> SetStore<T> for MemorySet<T> {
    async fn list(&self) -> Result<Vec<T>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn replace_all(&self, entries: &[T]) -> Result<()> {
        *self.entries.lock().await = entries.to_vec();
        Ok(())
    }
}

/// Write a set file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write never corrupts the set. Permissions are
/// 0600 since the files hold plaintext credentials.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("set path has no parent directory".into()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("pool-set");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Error::Storage(format!("writing {}: {e}", tmp_path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming into {}: {e}", path.display())))?;

    debug!(path = %path.display(), "persisted set");
    Ok(())
}
