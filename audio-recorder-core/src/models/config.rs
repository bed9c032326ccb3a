use serde::{Deserialize, Serialize};

use super::error::RecorderError;

/// Configuration for a recorder pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Number of captured channels (default: 1). Valid values: 1, 2.
    pub channel_count: u16,

    /// Capture sample rate in Hz (default: 48000).
    pub sample_rate: u32,

    /// Frames per audio quantum delivered by the host (default: 4096).
    pub quantum_size: usize,

    /// Bitrate in kbps requested from the transcoder (default: 128).
    pub bitrate: u32,

    /// Depth of the bounded aggregator queue, in messages (default: 256).
    ///
    /// The capture callback never blocks on this queue; quanta that do not
    /// fit are dropped and counted.
    pub queue_capacity: usize,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.sample_rate == 0 {
            return Err(RecorderError::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }
        if ![1, 2].contains(&self.channel_count) {
            return Err(RecorderError::InvalidConfiguration(format!(
                "unsupported channel count: {}",
                self.channel_count
            )));
        }
        if self.quantum_size == 0 {
            return Err(RecorderError::InvalidConfiguration(
                "quantum size must be positive".into(),
            ));
        }
        if self.bitrate == 0 {
            return Err(RecorderError::InvalidConfiguration(
                "bitrate must be positive".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(RecorderError::InvalidConfiguration(
                "queue capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Parse a JSON configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, RecorderError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RecorderError::InvalidConfiguration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            channel_count: 1,
            sample_rate: 48000,
            quantum_size: 4096,
            bitrate: 128,
            queue_capacity: 256,
        }
    }
}
