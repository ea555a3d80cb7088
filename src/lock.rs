//! Store locking and atomic replacement
//!
//! Every mutating command runs load, mutate and save while holding an
//! exclusive advisory lock (fs2/flock). The lock file does not live next
//! to the store: it sits in `<temp>/todo-locks/`, named after the store's
//! absolute path. Saves go through a temp file in the store's directory
//! that is synced and then renamed over the store.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// How long a writer waits for the store lock by default
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

const LOCK_DIR: &str = "todo-locks";

/// Lock file for `store_path`; every process derives the same name.
pub fn lock_path_for(store_path: &Path) -> PathBuf {
    let absolute = std::path::absolute(store_path).unwrap_or_else(|_| store_path.to_path_buf());
    let key = Uuid::new_v5(&Uuid::NAMESPACE_URL, absolute.to_string_lossy().as_bytes());
    std::env::temp_dir()
        .join(LOCK_DIR)
        .join(format!("{}.lock", key.simple()))
}

/// Held store lock; dropping it unlocks.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock at `path` is ours, or fail with
    /// [`Error::LockFailed`] after `timeout_ms`.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(err) if busy(&err) && Instant::now() < deadline => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) if busy(&err) => {
                    tracing::warn!(path = %path.display(), timeout_ms, "gave up waiting for store lock");
                    return Err(Error::LockFailed(path.to_path_buf()));
                }
                Err(err) => return Err(Error::Io(err)),
            }
        }

        tracing::debug!(path = %path.display(), "store lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        tracing::debug!(path = %self.path.display(), "store lock released");
    }
}

fn busy(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}

/// Replace `path` with `data` so readers see either the old or the new
/// document, never a mix.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".todos-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| Error::Io(err.error))?;
    Ok(())
}
