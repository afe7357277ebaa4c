//! Request validation
//!
//! Turns the JSON body of a conversion request into decoded file bytes, or a
//! [`ValidationError`] explaining why the upload was refused. Nothing here
//! touches the filesystem.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;
use std::path::Path;

use super::format::SourceFormat;
use crate::config::LimitsConfig;
use crate::error::ValidationError;

/// Standard alphabet, padding optional.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// JSON body of `POST /convert/{format}-to-mp3`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_data: Option<String>,
}

/// A request that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub format: SourceFormat,
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_file_size: usize,
    sniff_container: bool,
}

impl RequestValidator {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_file_size: limits.max_file_size_bytes(),
            sniff_container: limits.sniff_container,
        }
    }

    #[cfg(test)]
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn validate(
        &self,
        request: ConversionRequest,
        format: SourceFormat,
    ) -> Result<ValidatedUpload, ValidationError> {
        let file_name = non_empty(request.file_name).ok_or(ValidationError::MissingFields)?;
        let file_data = non_empty(request.file_data).ok_or(ValidationError::MissingFields)?;

        if !has_extension(&file_name, format.extension()) {
            return Err(ValidationError::WrongExtension {
                expected: format.extension(),
            });
        }

        let data = self.decode_payload(&file_data)?;

        if self.sniff_container && !format.sniff(&data) {
            return Err(ValidationError::ContainerMismatch {
                expected: format.extension(),
            });
        }

        Ok(ValidatedUpload {
            format,
            file_name,
            data,
        })
    }

    fn decode_payload(&self, file_data: &str) -> Result<Vec<u8>, ValidationError> {
        let payload: String = strip_data_uri(file_data)
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        // Refuse obviously oversized payloads before allocating the decode buffer.
        let min_decoded = (payload.len() / 4 * 3).saturating_sub(2);
        if min_decoded > self.max_file_size {
            return Err(self.too_large());
        }

        let data = PAYLOAD_ENGINE
            .decode(payload.as_bytes())
            .map_err(|_| ValidationError::InvalidEncoding)?;

        if data.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        if data.len() > self.max_file_size {
            return Err(self.too_large());
        }
        Ok(data)
    }

    fn too_large(&self) -> ValidationError {
        ValidationError::TooLarge {
            limit_mb: self.max_file_size / (1024 * 1024),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn has_extension(file_name: &str, expected: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// Drop a `data:<mime>;base64,` style prefix: everything up to the last comma.
pub fn strip_data_uri(file_data: &str) -> &str {
    match file_data.rsplit_once(',') {
        Some((_, payload)) => payload,
        None => file_data,
    }
}
