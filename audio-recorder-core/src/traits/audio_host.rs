use std::sync::Arc;

use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;

/// Callback invoked once per audio quantum on the host's real-time thread.
///
/// Receives one slice per channel, each `quantum_size` frames long (a quantum
/// delivered by [`ProcessingNode::flush`] may be shorter). The slices are only valid
/// for the duration of the call.
pub type QuantumCallback = Arc<dyn Fn(&[&[f32]]) + Send + Sync + 'static>;

/// Result of asking a host for a processing node.
pub enum HostCapability {
    Available(Box<dyn ProcessingNode>),
    Unsupported(String),
}

/// A platform audio subsystem able to deliver capture quanta.
///
/// Implemented by:
/// - `ManualHost` (in-process, caller pushes quanta)
/// - `CpalHost` (`audio-recorder-cpal`, default input device)
pub trait AudioHost: Send {
    /// Resolve, once, whether this host can run a processing callback with
    /// the given channel count, sample rate and quantum size.
    fn probe(&mut self, config: &RecorderConfig) -> HostCapability;
}

/// A node attached to the host's audio graph.
pub trait ProcessingNode: Send {
    /// Start delivering quanta to `callback`.
    fn connect(&mut self, callback: QuantumCallback) -> Result<(), RecorderError>;

    /// Deliver any partially assembled quantum to the callback now.
    ///
    /// Called when recording stops, while the callback still accepts audio.
    /// Nodes that never hold back frames keep the default.
    fn flush(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }

    /// Detach from the audio graph. No callback fires after this returns.
    fn disconnect(&mut self) -> Result<(), RecorderError>;
}
