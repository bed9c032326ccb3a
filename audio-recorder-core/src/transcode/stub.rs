use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::models::error::RecorderError;
use crate::traits::transcoder::{Transcoder, TranscoderSpawner};
use crate::transcode::protocol::{TranscoderRequest, TranscoderResponse};

/// Stand-in transcoder for builds without a compression library.
///
/// Always loads, and answers every request with an `error` response so
/// callers see a recoverable "compression unavailable" failure.
pub struct UnavailableTranscoder {
    responses: Sender<TranscoderResponse>,
}

impl UnavailableTranscoder {
    pub fn new(responses: Sender<TranscoderResponse>) -> Self {
        Self { responses }
    }

    /// Spawner producing the stub; the recorder's default.
    pub fn spawner() -> TranscoderSpawner {
        Arc::new(|responses| Ok(Box::new(UnavailableTranscoder::new(responses)) as Box<dyn Transcoder>))
    }
}

impl Transcoder for UnavailableTranscoder {
    fn post(&mut self, request: TranscoderRequest) -> Result<(), RecorderError> {
        let error = match request {
            TranscoderRequest::Init { .. } => "MP3 encoding not available: no encoder bundled".to_string(),
            TranscoderRequest::Encode { .. } | TranscoderRequest::Finish => {
                "MP3 encoding disabled: enable an encoder to use this feature".to_string()
            }
        };
        self.responses
            .send(TranscoderResponse::Error { error })
            .map_err(|_| RecorderError::TranscodeError("response queue closed".into()))
    }
}
