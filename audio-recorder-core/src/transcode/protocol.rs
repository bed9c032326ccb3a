//! Message envelope spoken with a transcoder.
//!
//! Serialized form is tagged on `cmd`, e.g. `{"cmd":"init","config":{...}}`,
//! `{"cmd":"finish"}`, `{"cmd":"end"}`.

use serde::{Deserialize, Serialize};

/// Channel layout requested from the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelMode {
    Mono,
    JointStereo,
}

impl ChannelMode {
    pub fn for_channels(channel_count: u16) -> Self {
        if channel_count == 1 {
            Self::Mono
        } else {
            Self::JointStereo
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscoderConfig {
    pub channel_mode: ChannelMode,
    pub channel_count: u16,
    pub sample_rate: u32,
    /// kbps
    pub bitrate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum TranscoderRequest {
    Init { config: TranscoderConfig },
    /// Interleaved float samples.
    Encode { buf: Vec<f32> },
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum TranscoderResponse {
    Data {
        buf: Vec<u8>,
    },
    End {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buf: Option<Vec<u8>>,
    },
    Error {
        error: String,
    },
}
