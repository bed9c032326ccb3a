use thiserror::Error;

use audio_recorder_core::RecorderError;

/// Failures while opening or driving a cpal input device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CpalHostError {
    #[error("input device not found: {0}")]
    DeviceNotFound(String),

    #[error("device enumeration failed: {0}")]
    Enumeration(String),

    #[error("no input config with {channels} channel(s) at {sample_rate} Hz")]
    NoMatchingConfig { channels: u16, sample_rate: u32 },

    #[error("invalid recorder config: {0}")]
    InvalidConfig(String),

    #[error("failed to build input stream: {0}")]
    BuildStream(String),

    #[error("failed to start input stream: {0}")]
    PlayStream(String),
}

impl From<CpalHostError> for RecorderError {
    fn from(e: CpalHostError) -> Self {
        match e {
            CpalHostError::BuildStream(_) | CpalHostError::PlayStream(_) => {
                RecorderError::IoError(e.to_string())
            }
            other => RecorderError::UnsupportedConfiguration(other.to_string()),
        }
    }
}
