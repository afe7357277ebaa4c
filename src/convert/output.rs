//! Output encoding and download file names

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::ConvertError;

/// Stem used when nothing of the original name survives sanitization
pub const DEFAULT_STEM: &str = "audio";

/// Extension of every converted file
pub const TARGET_EXTENSION: &str = "mp3";

/// A converted file ready to be sent back
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub file_name: String,
    pub file_data: String,
}

impl ConversionResult {
    /// Size of the encoded payload in bytes
    pub fn encoded_len(&self) -> usize {
        self.file_data.len()
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\-]").unwrap())
}

/// Derive the download name from the uploaded one: `"my song.m4a"` becomes
/// `"my_song.mp3"`.
pub fn sanitize_file_name(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = unsafe_chars().replace_all(&stem, "_");
    let stem = if stem.is_empty() {
        DEFAULT_STEM
    } else {
        stem.as_ref()
    };
    format!("{}.{}", stem, TARGET_EXTENSION)
}

/// Read the transcoder output and package it for the response.
///
/// An empty output file is a failed conversion, never a result.
pub async fn encode_output(path: &Path, original_name: &str) -> Result<ConversionResult, ConvertError> {
    let data = tokio::fs::read(path).await?;
    if data.is_empty() {
        return Err(ConvertError::EmptyOutput);
    }
    Ok(ConversionResult {
        file_name: sanitize_file_name(original_name),
        file_data: STANDARD.encode(&data),
    })
}
