//! # audio-recorder-core
//!
//! Platform-agnostic audio recorder core library.
//!
//! Captures fixed-size audio quanta from a host, buffers them per channel on
//! a background aggregator, exports a 16-bit PCM WAV container and optionally
//! drives an external transcoder for a compressed export. Host backends
//! implement the `AudioHost` trait and plug into the generic
//! `CaptureOrchestrator`.
//!
//! ## Architecture
//!
//! ```text
//! audio-recorder-core (this crate)
//! ├── traits/       ← AudioHost, ProcessingNode, Transcoder
//! ├── models/       ← RecorderError, RecorderConfig, EncodedAudioBlob, RecordingSession, etc.
//! ├── processing/   ← PcmAggregator, QuantumAssembler, WAV encode/decode
//! ├── transcode/    ← Mp3TranscodeBridge, transcoder protocol, bundled stub
//! ├── session/      ← CaptureOrchestrator, ManualHost
//! └── storage/      ← export writer, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;
pub mod transcode;

// Re-export key types at crate root for convenience.
pub use models::blob::{EncodedAudioBlob, ExportFormat, COMPRESSED_MIME_TYPE, WAV_MIME_TYPE};
pub use models::config::RecorderConfig;
pub use models::diagnostics::CaptureDiagnostics;
pub use models::error::RecorderError;
pub use models::recording::{ChannelBuffer, RecordingSession};
pub use models::state::TranscodeState;
pub use processing::aggregator::{AggregatorReply, BuffersResult, PcmAggregator};
pub use processing::quantum::QuantumAssembler;
pub use processing::wav_codec::WavDocument;
pub use session::manual_host::ManualHost;
pub use session::orchestrator::{BuffersCallback, CaptureOrchestrator, ExportCallback};
pub use storage::export_writer::{read_metadata, save_export, ExportMetadata};
pub use traits::audio_host::{AudioHost, HostCapability, ProcessingNode, QuantumCallback};
pub use traits::transcoder::{Transcoder, TranscoderSpawner};
pub use transcode::bridge::Mp3TranscodeBridge;
pub use transcode::protocol::{ChannelMode, TranscoderConfig, TranscoderRequest, TranscoderResponse};
pub use transcode::stub::UnavailableTranscoder;
