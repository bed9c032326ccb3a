use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::blob::{EncodedAudioBlob, WAV_MIME_TYPE};
use crate::models::error::RecorderError;
use crate::processing::wav_codec;

/// Metadata stored alongside an exported recording.
///
/// Serializable for JSON export to a backend. The format fields are only
/// present for WAV exports, where they are read back from the header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub id: String,
    pub created_at: String,
    pub mime_type: String,
    pub byte_len: u64,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_count: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl ExportMetadata {
    /// Describe `blob`. WAV blobs must decode cleanly.
    pub fn for_blob(blob: &EncodedAudioBlob) -> Result<Self, RecorderError> {
        let mut metadata = Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            mime_type: blob.mime_type().to_string(),
            byte_len: blob.len() as u64,
            checksum: blob.checksum(),
            sample_rate: None,
            channel_count: None,
            duration_secs: None,
        };
        if blob.mime_type() == WAV_MIME_TYPE {
            let document = wav_codec::decode(blob.bytes())?;
            metadata.sample_rate = Some(document.sample_rate);
            metadata.channel_count = Some(document.channel_count);
            metadata.duration_secs = Some(document.duration_secs());
        }
        Ok(metadata)
    }
}

/// Path of the JSON sidecar for `recording_path`: `{recording_path}.metadata.json`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    let mut name = OsString::from(recording_path.as_os_str());
    name.push(".metadata.json");
    PathBuf::from(name)
}

/// Write `blob` to `path` and its metadata to the sidecar next to it.
///
/// Missing parent directories are created.
pub fn save_export(blob: &EncodedAudioBlob, path: &Path) -> Result<ExportMetadata, RecorderError> {
    let metadata = ExportMetadata::for_blob(blob)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| RecorderError::StorageError(format!("failed to create directory: {}", e)))?;
        }
    }
    fs::write(path, blob.bytes())
        .map_err(|e| RecorderError::StorageError(format!("failed to write export: {}", e)))?;
    write_metadata(&metadata, path)?;

    log::info!(
        "saved {} export ({} bytes) to {}",
        metadata.mime_type,
        metadata.byte_len,
        path.display()
    );
    Ok(metadata)
}

pub fn write_metadata(metadata: &ExportMetadata, recording_path: &Path) -> Result<(), RecorderError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RecorderError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| RecorderError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read export metadata from the JSON sidecar of `recording_path`.
pub fn read_metadata(recording_path: &Path) -> Result<ExportMetadata, RecorderError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| RecorderError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| RecorderError::StorageError(format!("failed to parse metadata: {}", e)))
}
