use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;
use crate::traits::audio_host::{AudioHost, HostCapability, ProcessingNode, QuantumCallback};

/// In-process host whose quanta are pushed by the caller.
///
/// Clones share the same connection, so a caller can keep one clone to
/// drive a recorder that owns another. Useful for feeding pre-recorded or
/// synthesized audio through the pipeline.
#[derive(Clone)]
pub struct ManualHost {
    callback: Arc<Mutex<Option<QuantumCallback>>>,
    unsupported: Option<String>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self {
            callback: Arc::new(Mutex::new(None)),
            unsupported: None,
        }
    }

    /// A host that reports it cannot run a processing callback.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            callback: Arc::new(Mutex::new(None)),
            unsupported: Some(reason.into()),
        }
    }

    /// Whether a processing node is currently connected.
    pub fn is_connected(&self) -> bool {
        self.callback.lock().is_some()
    }

    /// Deliver one quantum (one slice per channel) to the connected node.
    ///
    /// Returns `false` when nothing is connected.
    pub fn push(&self, channels: &[&[f32]]) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(cb) => {
                cb(channels);
                true
            }
            None => false,
        }
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for ManualHost {
    fn probe(&mut self, _config: &RecorderConfig) -> HostCapability {
        match &self.unsupported {
            Some(reason) => HostCapability::Unsupported(reason.clone()),
            None => HostCapability::Available(Box::new(ManualNode {
                callback: Arc::clone(&self.callback),
            })),
        }
    }
}

struct ManualNode {
    callback: Arc<Mutex<Option<QuantumCallback>>>,
}

impl ProcessingNode for ManualNode {
    fn connect(&mut self, callback: QuantumCallback) -> Result<(), RecorderError> {
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), RecorderError> {
        self.callback.lock().take();
        Ok(())
    }
}
