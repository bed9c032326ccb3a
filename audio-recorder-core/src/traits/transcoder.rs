use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::models::error::RecorderError;
use crate::transcode::protocol::{TranscoderRequest, TranscoderResponse};

/// An external PCM → compressed-audio service driven by messages.
///
/// Requests go in through `post`; responses come back asynchronously on the
/// sender handed to the [`TranscoderSpawner`] that created it.
pub trait Transcoder: Send {
    /// Deliver one request. Ownership of any sample buffer moves to the
    /// transcoder.
    fn post(&mut self, request: TranscoderRequest) -> Result<(), RecorderError>;
}

/// Creates a transcoder wired to the given response queue.
///
/// Failure means the service is unavailable and should be reported as
/// `RecorderError::TranscoderUnavailable`.
pub type TranscoderSpawner =
    Arc<dyn Fn(Sender<TranscoderResponse>) -> Result<Box<dyn Transcoder>, RecorderError> + Send + Sync + 'static>;
