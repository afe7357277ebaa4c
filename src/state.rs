//! Application state shared by all handlers
//!
//! Holds the server configuration and the conversion pipeline. Nothing in here
//! is mutated per request except the scratch directories' "prepared" flag.

use crate::config::ServerConfig;
use crate::convert::{Converter, Transcoder};

#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub converter: Converter,
}

impl AppState {
    /// Create state with an already resolved transcoder
    pub fn new(config: ServerConfig, transcoder: Transcoder) -> Self {
        let converter = Converter::new(&config, transcoder);
        Self { config, converter }
    }

    /// Create state, resolving the transcoder binary and its version from
    /// config and environment
    pub async fn from_config(config: ServerConfig) -> Self {
        let transcoder = Transcoder::from_config(&config.transcoder)
            .with_probed_version()
            .await;
        Self::new(config, transcoder)
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.converter.transcoder
    }
}
