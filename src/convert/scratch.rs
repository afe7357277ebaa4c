//! Scratch space for in-flight conversions
//!
//! Uploads are staged in one directory and transcoder output in another. Each
//! request names its files after a unique token, so concurrent requests never
//! share a path.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use super::format::SourceFormat;
use crate::config::ScratchConfig;

/// Staging directories shared by all requests
#[derive(Debug)]
pub struct ScratchSpace {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    prepared: AtomicBool,
}

impl ScratchSpace {
    pub fn new(config: &ScratchConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
            prepared: AtomicBool::new(false),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create both staging directories once per process.
    ///
    /// Concurrent first callers may both run `create_dir_all`, which is
    /// harmless since it succeeds on existing directories.
    pub async fn prepare(&self) -> io::Result<()> {
        if self.prepared.load(Ordering::Acquire) {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        self.prepared.store(true, Ordering::Release);
        tracing::debug!(
            upload_dir = %self.upload_dir.display(),
            output_dir = %self.output_dir.display(),
            "Scratch directories ready"
        );
        Ok(())
    }

    /// Reserve input and output paths for one request
    pub fn allocate(&self, format: SourceFormat) -> ScratchFiles {
        let token = unique_token();
        ScratchFiles {
            input: self
                .upload_dir
                .join(format!("{}.{}", token, format.extension())),
            output: self.output_dir.join(format!("{}.mp3", token)),
            token,
            cleaned: false,
        }
    }

    /// Remove files older than `max_age` from both directories.
    ///
    /// Only leftovers of a previous process can be that old, so this runs
    /// once at startup. Returns the number of files removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> usize {
        let mut removed = 0;
        for dir in [&self.upload_dir, &self.output_dir] {
            removed += sweep_dir(dir, max_age).await;
        }
        removed
    }
}

async fn sweep_dir(dir: &Path, max_age: Duration) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
        Err(e) => {
            tracing::warn!("Cannot scan scratch directory {}: {}", dir.display(), e);
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age >= max_age && remove_quietly(&entry.path()).await {
            removed += 1;
        }
    }
    removed
}

/// Build a per-request token: unix milliseconds plus a random suffix
pub fn unique_token() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", millis, &random[..8])
}

/// Input and output paths owned by a single request.
///
/// Call [`ScratchFiles::cleanup`] on every exit path. If the request future is
/// dropped before that happens, `Drop` removes the files synchronously.
#[derive(Debug)]
pub struct ScratchFiles {
    pub token: String,
    pub input: PathBuf,
    pub output: PathBuf,
    cleaned: bool,
}

impl ScratchFiles {
    pub async fn cleanup(mut self) {
        cleanup(&[self.input.as_path(), self.output.as_path()]).await;
        self.cleaned = true;
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        for path in [&self.input, &self.output] {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!("Removed abandoned scratch file {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Best-effort removal of scratch files.
///
/// Paths that were never created are fine; any other failure is logged and
/// swallowed so it cannot mask the result of the request.
pub async fn cleanup(paths: &[&Path]) {
    for path in paths {
        remove_quietly(path).await;
    }
}

async fn remove_quietly(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Failed to remove scratch file {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
pub(crate) fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0)
}
