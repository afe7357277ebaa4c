//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scratch directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchConfig {
    /// Staging directory for decoded uploads
    pub upload_dir: PathBuf,

    /// Staging directory for transcoder output
    pub output_dir: PathBuf,

    /// Files older than this are removed from both directories at startup
    pub stale_after_secs: u64,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("tmp_uploads"),
            output_dir: PathBuf::from("tmp_outputs"),
            stale_after_secs: 3600,
        }
    }
}

/// Worst libmp3lame VBR quality index
pub const MAX_QUALITY: u8 = 9;

/// External transcoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Explicit path to the ffmpeg binary; PATH is searched when unset
    pub binary: Option<PathBuf>,

    /// libmp3lame VBR quality index (0 = best, 9 = worst)
    pub quality: u8,

    /// Hard wall-clock limit for a single transcoder run
    pub timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            binary: None,
            quality: 2,
            timeout_secs: 300,
        }
    }
}

/// Request size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum decoded file size in megabytes
    pub max_file_size_mb: usize,

    /// Maximum HTTP request body in megabytes (covers base64 expansion)
    pub max_body_size_mb: usize,

    /// Check the container signature of decoded uploads
    pub sniff_container: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_body_size_mb: 200,
            sniff_container: false,
        }
    }
}

impl LimitsConfig {
    /// Get maximum decoded file size in bytes
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Get maximum request body size in bytes
    pub fn max_body_size_bytes(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Scratch directories
    pub scratch: ScratchConfig,

    /// External transcoder
    pub transcoder: TranscoderConfig,

    /// Size limits
    pub limits: LimitsConfig,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            scratch: ScratchConfig::default(),
            transcoder: TranscoderConfig::default(),
            limits: LimitsConfig::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply `LISTEN_HOST` and `PORT` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::var("LISTEN_HOST").ok(), std::env::var("PORT").ok());
    }

    fn apply_overrides(&mut self, host: Option<String>, port: Option<String>) {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.host = host;
        }
        if let Some(port) = port {
            match port.trim().parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value {:?}", port),
            }
        }
    }
}
