//! External transcoder invocation
//!
//! The conversion itself is done by an ffmpeg binary run as a child process:
//!
//! ```text
//! ffmpeg -y -i <input> -codec:a libmp3lame -qscale:a <quality> <output>
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::TranscoderConfig;
use crate::error::ConvertError;

/// Environment variable pointing at the ffmpeg binary
pub const BINARY_ENV: &str = "FFMPEG_PATH";

/// MP3 encoder passed to `-codec:a`
pub const MP3_ENCODER: &str = "libmp3lame";

/// Only the tail of the transcoder's stderr is kept for error reports.
const MAX_DIAGNOSTIC_BYTES: usize = 4096;

#[cfg(windows)]
const BINARY_NAME: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "ffmpeg";

/// Resolve the transcoder binary.
///
/// Lookup order: `FFMPEG_PATH`, the configured path, then `PATH`. An explicit
/// path that does not exist counts as not found rather than falling through.
pub fn locate(configured: Option<&Path>) -> Option<PathBuf> {
    let from_env = std::env::var_os(BINARY_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    locate_with(from_env, configured, std::env::var_os("PATH"))
}

fn locate_with(
    from_env: Option<PathBuf>,
    configured: Option<&Path>,
    search_path: Option<OsString>,
) -> Option<PathBuf> {
    if let Some(explicit) = from_env.or_else(|| configured.map(Path::to_path_buf)) {
        if explicit.is_file() {
            return Some(explicit);
        }
        tracing::warn!("Transcoder binary {} does not exist", explicit.display());
        return None;
    }

    let search_path = search_path?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(BINARY_NAME))
        .find(|candidate| candidate.is_file())
}

/// Runs the external transcoder
#[derive(Debug, Clone)]
pub struct Transcoder {
    binary: Option<PathBuf>,
    quality: u8,
    timeout: Duration,
    version: Option<String>,
}

impl Transcoder {
    /// Resolve the binary once and keep the result for the process lifetime
    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self::new(
            locate(config.binary.as_deref()),
            config.quality,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(binary: Option<PathBuf>, quality: u8, timeout: Duration) -> Self {
        Self {
            binary,
            quality,
            timeout,
            version: None,
        }
    }

    /// Run `-version` once and keep the answer for [`Transcoder::version`]
    pub async fn with_probed_version(mut self) -> Self {
        self.version = self.probe_version().await;
        self
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    /// Fail with `ToolUnavailable` when no binary was found
    pub fn ensure_available(&self) -> Result<&Path, ConvertError> {
        self.binary().ok_or(ConvertError::ToolUnavailable)
    }

    /// Command line for one conversion
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-codec:a".into(),
            MP3_ENCODER.into(),
            "-qscale:a".into(),
            self.quality.to_string().into(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Convert `input` into an MP3 at `output`.
    ///
    /// The child is killed if it outlives the configured timeout or if this
    /// future is dropped. Scratch files are left for the caller to remove.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let binary = self.ensure_available()?;

        let mut command = Command::new(binary);
        command
            .args(self.args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Running {} {:?}", binary.display(), self.args(input, output));

        let child = command.spawn().map_err(ConvertError::Spawn)?;
        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("Transcoder timed out after {:?}, killed", self.timeout);
                return Err(ConvertError::ConversionTimedOut(self.timeout));
            }
        };

        if result.status.success() {
            Ok(())
        } else {
            Err(ConvertError::ConversionFailed {
                status: result.status,
                stderr: diagnostic_tail(&result.stderr),
            })
        }
    }

    /// Version reported at startup, if it was probed
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// First line of `ffmpeg -version`, if the binary can be run
    async fn probe_version(&self) -> Option<String> {
        let binary = self.binary()?;
        let output = Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(Duration::from_secs(10), output)
            .await
            .ok()?
            .ok()?;
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
    }
}

/// Last `MAX_DIAGNOSTIC_BYTES` of the stderr output, trimmed
fn diagnostic_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= MAX_DIAGNOSTIC_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - MAX_DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
