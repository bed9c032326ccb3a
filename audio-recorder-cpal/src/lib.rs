//! # audio-recorder-cpal
//!
//! Cross-platform input backend for audio-recorder-core, built on cpal.
//!
//! Provides:
//! - `CpalHost`: `AudioHost` that opens the default or a named input device
//! - `DeviceSelector`: which device to open
//! - `CpalHostError`: device and stream failures
//!
//! ## Platform Requirements
//! - Enable the `cpal-audio` feature. On Linux this needs the ALSA
//!   development headers.
//!
//! ## Usage
//! ```ignore
//! use audio_recorder_core::{CaptureOrchestrator, RecorderConfig};
//! use audio_recorder_cpal::CpalHost;
//!
//! let mut recorder = CaptureOrchestrator::new(CpalHost::default_device());
//! recorder.configure(RecorderConfig::default())?;
//! recorder.start()?;
//! ```

pub mod device_selector;
pub mod error;
#[cfg(feature = "cpal-audio")]
pub mod host;

pub use device_selector::DeviceSelector;
pub use error::CpalHostError;
#[cfg(feature = "cpal-audio")]
pub use host::{CpalHost, CpalNode};
