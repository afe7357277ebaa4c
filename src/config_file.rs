//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section except
//! `[server]` is optional and falls back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{LimitsConfig, ScratchConfig, ServerConfig, TranscoderConfig, MAX_QUALITY};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Scratch directory settings
    pub scratch: Option<ScratchSettings>,
    /// Transcoder settings
    pub transcoder: Option<TranscoderSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Limits settings
    pub limits: Option<LimitsSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchSettings {
    pub upload_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub stale_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderSettings {
    /// Path to the ffmpeg binary
    pub binary: Option<PathBuf>,
    /// libmp3lame VBR quality index
    pub quality: Option<u8>,
    /// Timeout for one run in seconds
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Maximum decoded file size in MB
    pub max_file_size_mb: Option<usize>,
    /// Maximum request body size in MB
    pub max_body_size_mb: Option<usize>,
    /// Reject uploads whose bytes do not match the declared container
    pub sniff_container: Option<bool>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
            },
            scratch: Some(ScratchSettings {
                upload_dir: Some(defaults.scratch.upload_dir),
                output_dir: Some(defaults.scratch.output_dir),
                stale_after_secs: Some(defaults.scratch.stale_after_secs),
            }),
            transcoder: Some(TranscoderSettings {
                binary: None,
                quality: Some(defaults.transcoder.quality),
                timeout_secs: Some(defaults.transcoder.timeout_secs),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
            limits: Some(LimitsSettings {
                max_file_size_mb: Some(defaults.limits.max_file_size_mb),
                max_body_size_mb: Some(defaults.limits.max_body_size_mb),
                sniff_container: Some(defaults.limits.sniff_container),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();

        let scratch = match self.scratch {
            Some(s) => ScratchConfig {
                upload_dir: s.upload_dir.unwrap_or(defaults.scratch.upload_dir),
                output_dir: s.output_dir.unwrap_or(defaults.scratch.output_dir),
                stale_after_secs: s
                    .stale_after_secs
                    .unwrap_or(defaults.scratch.stale_after_secs),
            },
            None => defaults.scratch,
        };

        let transcoder = match self.transcoder {
            Some(t) => TranscoderConfig {
                binary: t.binary,
                quality: t
                    .quality
                    .unwrap_or(defaults.transcoder.quality)
                    .min(MAX_QUALITY),
                timeout_secs: t.timeout_secs.unwrap_or(defaults.transcoder.timeout_secs),
            },
            None => defaults.transcoder,
        };

        let limits = match self.limits {
            Some(l) => LimitsConfig {
                max_file_size_mb: l.max_file_size_mb.unwrap_or(defaults.limits.max_file_size_mb),
                max_body_size_mb: l.max_body_size_mb.unwrap_or(defaults.limits.max_body_size_mb),
                sniff_container: l.sniff_container.unwrap_or(defaults.limits.sniff_container),
            },
            None => defaults.limits,
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or(defaults.log_format)),
            None => (defaults.log_level, defaults.log_format),
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            scratch,
            transcoder,
            limits,
            log_level,
            log_format,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
