//! Conversion pipeline
//!
//! This module handles one upload end to end:
//! - Request validation and base64 decoding
//! - Scratch file staging under a per-request token
//! - Running the external transcoder
//! - Reading back and encoding the MP3
//! - Removing scratch files on every exit path

pub mod format;
pub mod output;
pub mod request;
pub mod scratch;
pub mod transcoder;

use std::time::Instant;
use tracing::Instrument;

pub use format::SourceFormat;
pub use output::ConversionResult;
pub use request::{ConversionRequest, RequestValidator, ValidatedUpload};
pub use scratch::{ScratchFiles, ScratchSpace};
pub use transcoder::Transcoder;

use crate::config::ServerConfig;
use crate::error::ConvertError;

/// Everything a request needs to turn an upload into an MP3
#[derive(Debug)]
pub struct Converter {
    pub validator: RequestValidator,
    pub scratch: ScratchSpace,
    pub transcoder: Transcoder,
}

impl Converter {
    pub fn new(config: &ServerConfig, transcoder: Transcoder) -> Self {
        Self {
            validator: RequestValidator::new(&config.limits),
            scratch: ScratchSpace::new(&config.scratch),
            transcoder,
        }
    }

    /// Convert one upload.
    ///
    /// Tool availability is checked before anything else, and validation
    /// happens before the filesystem is touched. Once files are staged they
    /// are removed whatever the outcome.
    pub async fn convert(
        &self,
        request: ConversionRequest,
        format: SourceFormat,
    ) -> Result<ConversionResult, ConvertError> {
        self.transcoder.ensure_available()?;
        let upload = self.validator.validate(request, format)?;

        self.scratch.prepare().await?;
        let files = self.scratch.allocate(upload.format);
        let span = tracing::info_span!("convert", token = %files.token, format = %upload.format);

        async move {
            let started = Instant::now();
            let result = self.run_staged(&upload, &files).await;
            files.cleanup().await;

            match &result {
                Ok(converted) => tracing::info!(
                    input_bytes = upload.data.len(),
                    output_base64_bytes = converted.encoded_len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Converted {}",
                    upload.file_name
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Conversion of {} failed: {}",
                    upload.file_name,
                    e
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_staged(
        &self,
        upload: &ValidatedUpload,
        files: &ScratchFiles,
    ) -> Result<ConversionResult, ConvertError> {
        tokio::fs::write(&files.input, &upload.data).await?;
        self.transcoder.run(&files.input, &files.output).await?;
        output::encode_output(&files.output, &upload.file_name).await
    }
}
