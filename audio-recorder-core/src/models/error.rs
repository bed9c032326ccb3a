use thiserror::Error;

/// Errors produced anywhere in the capture → buffer → encode/transcode pipeline.
///
/// Pipeline-internal failures never cross a thread boundary as panics; they
/// reach the caller through the pending export callback as one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("audio host cannot provide a processing callback: {0}")]
    UnsupportedConfiguration(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("recorder is not configured")]
    NotConfigured,

    #[error("recorder is already configured")]
    AlreadyConfigured,

    #[error("recorder is closed")]
    Closed,

    #[error("recording in progress or another export is pending")]
    RecordingInProgress,

    #[error("no data recorded to export")]
    NoDataRecorded,

    #[error("channel lengths differ: channel 0 has {left} samples, channel {channel} has {right}")]
    ChannelLengthMismatch {
        channel: usize,
        left: usize,
        right: usize,
    },

    #[error("malformed WAV container: {0}")]
    MalformedContainer(String),

    #[error("unsupported PCM sample format: {0} bits per sample")]
    UnsupportedSampleFormat(u16),

    #[error("PCM conversion failed: {0}")]
    ConversionError(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("transcoder unavailable: {0}")]
    TranscoderUnavailable(String),

    #[error("transcode failed: {0}")]
    TranscodeError(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<std::io::Error> for RecorderError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
