use std::io::Cursor;

use sha2::{Digest, Sha256};

/// Mime type attached to WAV exports.
pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Mime type attached to compressed exports.
pub const COMPRESSED_MIME_TYPE: &str = "audio/mp3";

/// Target container of an export request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Wav,
    Compressed,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => WAV_MIME_TYPE,
            Self::Compressed => COMPRESSED_MIME_TYPE,
        }
    }
}

/// Final output of an export: encoded bytes plus their mime type.
///
/// Immutable once produced. Ownership passes to the export callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudioBlob {
    bytes: Vec<u8>,
    mime_type: String,
}

impl EncodedAudioBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A reader over the blob contents.
    pub fn reader(&self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes.clone())
    }

    /// Consume the blob into a reader without copying.
    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes)
    }

    /// SHA-256 hex digest of the encoded bytes.
    pub fn checksum(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
