//! Accepted source formats

use std::fmt;

/// Audio container accepted by a conversion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    M4a,
    Ogg,
}

impl SourceFormat {
    /// Every format that gets a conversion endpoint
    pub const ALL: [SourceFormat; 2] = [SourceFormat::M4a, SourceFormat::Ogg];

    /// Lowercase file extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::M4a => "m4a",
            SourceFormat::Ogg => "ogg",
        }
    }

    /// Route serving this format, e.g. `/convert/m4a-to-mp3`
    pub fn route(self) -> String {
        format!("/convert/{}-to-mp3", self.extension())
    }

    /// Check the container signature of decoded file bytes.
    ///
    /// M4A is an ISO-BMFF file and starts with an `ftyp` box, so the box type
    /// sits at offset 4. Ogg pages start with the `OggS` capture pattern.
    pub fn sniff(self, data: &[u8]) -> bool {
        match self {
            SourceFormat::M4a => data.len() >= 8 && &data[4..8] == b"ftyp",
            SourceFormat::Ogg => data.starts_with(b"OggS"),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
