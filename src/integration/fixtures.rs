//! Test fixtures for conversion tests
//!
//! Provides shell scripts that honour the ffmpeg argument contract
//! (`-y -i <in> -codec:a libmp3lame -qscale:a 2 <out>`, so the input is `$3`
//! and the output `$8`) without needing ffmpeg installed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::convert::Transcoder;

/// Behaviour of a fake transcoder script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeTranscoder {
    /// Writes `ID3` followed by the input bytes
    Mp3,
    /// Writes its own argument list to the output file
    EchoArgs,
    /// Prints a diagnostic and exits 1
    Fail,
    /// Sleeps far longer than any test timeout
    Hang,
    /// Creates a zero-length output
    EmptyOutput,
    /// Exits 0 without producing output
    NoOutput,
}

impl FakeTranscoder {
    fn body(self) -> &'static str {
        match self {
            FakeTranscoder::Mp3 => "printf 'ID3' > \"$8\"\ncat \"$3\" >> \"$8\"\n",
            FakeTranscoder::EchoArgs => "echo \"$@\" > \"$8\"\n",
            FakeTranscoder::Fail => {
                "echo \"$3: Invalid data found when processing input\" >&2\nexit 1\n"
            }
            FakeTranscoder::Hang => "exec sleep 30\n",
            FakeTranscoder::EmptyOutput => ": > \"$8\"\n",
            FakeTranscoder::NoOutput => "exit 0\n",
        }
    }

    fn file_name(self) -> String {
        format!("fake-ffmpeg-{:?}", self).to_lowercase()
    }
}

/// Write an executable fake transcoder into `dir` and return its path
#[cfg(unix)]
pub fn write_fake_transcoder(dir: &Path, behaviour: FakeTranscoder) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(behaviour.file_name());
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then\n  echo 'fake ffmpeg version 0.0'\n  exit 0\nfi\n{}",
        behaviour.body()
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A transcoder backed by a fake script, with a generous timeout
#[cfg(unix)]
pub fn fake_transcoder(dir: &Path, behaviour: FakeTranscoder) -> Transcoder {
    Transcoder::new(
        Some(write_fake_transcoder(dir, behaviour)),
        2,
        Duration::from_secs(10),
    )
}
