use std::io::Read;
use std::thread;

use crossbeam_channel::{bounded, never, select, unbounded, Receiver, RecvError, Sender};

use crate::models::blob::{EncodedAudioBlob, COMPRESSED_MIME_TYPE};
use crate::models::error::RecorderError;
use crate::models::state::TranscodeState;
use crate::processing::wav_codec;
use crate::traits::transcoder::{Transcoder, TranscoderSpawner};
use crate::transcode::protocol::{ChannelMode, TranscoderConfig, TranscoderRequest, TranscoderResponse};

/// Outcome of one compressed export.
pub type TranscodeResult = Result<EncodedAudioBlob, RecorderError>;

/// Commands accepted by the bridge thread.
pub enum BridgeCommand {
    /// Transcode the WAV container readable from the given source.
    Transcode(Box<dyn Read + Send>),
    /// Discard accumulated output; fails an active job.
    Clear,
    Shutdown,
}

/// Drives a [`Transcoder`] through `init` → `encode` → `finish` and
/// assembles its `data` chunks into one compressed blob.
pub struct Mp3TranscodeBridge {
    transcoder: Box<dyn Transcoder>,
    responses: Receiver<TranscoderResponse>,
    bitrate: u32,
    state: TranscodeState,
    chunks: Vec<Vec<u8>>,
}

impl Mp3TranscodeBridge {
    pub fn new(transcoder: Box<dyn Transcoder>, responses: Receiver<TranscoderResponse>, bitrate: u32) -> Self {
        Self {
            transcoder,
            responses,
            bitrate,
            state: TranscodeState::Idle,
            chunks: Vec::new(),
        }
    }

    pub fn state(&self) -> &TranscodeState {
        &self.state
    }

    /// Number of output chunks accumulated for the active job.
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Start a job. Returns the result if the job already terminated.
    ///
    /// Responses available between posts are processed immediately, so a
    /// transcoder that rejects `init` is not sent `encode` or `finish`.
    pub fn begin(&mut self, mut source: Box<dyn Read + Send>) -> Option<TranscodeResult> {
        if self.state.is_active() {
            return Some(Err(RecorderError::TranscodeError(
                "a transcode is already in progress".into(),
            )));
        }

        while let Ok(stale) = self.responses.try_recv() {
            log::debug!("discarding stale transcoder response: {:?}", stale);
        }
        self.chunks.clear();
        self.state = TranscodeState::Initializing;

        let mut wav = Vec::new();
        if let Err(e) = source.read_to_end(&mut wav) {
            return self.fail(RecorderError::IoError(format!("failed to read WAV data: {}", e)));
        }

        let document = match wav_codec::decode(&wav) {
            Ok(doc) => doc,
            Err(e) => return self.fail(e),
        };
        let samples = match wav_codec::pcm_to_float(&document.interleaved_samples, document.bits_per_sample) {
            Ok(samples) => samples,
            Err(e) => return self.fail(e),
        };
        if samples.is_empty() && !document.interleaved_samples.is_empty() {
            return self.fail(RecorderError::ConversionError(format!(
                "{} bytes of {}-bit PCM produced no samples",
                document.interleaved_samples.len(),
                document.bits_per_sample
            )));
        }

        let config = TranscoderConfig {
            channel_mode: ChannelMode::for_channels(document.channel_count),
            channel_count: document.channel_count,
            sample_rate: document.sample_rate,
            bitrate: self.bitrate,
        };
        if let Some(done) = self.post(TranscoderRequest::Init { config }) {
            return Some(done);
        }

        self.state = TranscodeState::Encoding;
        if let Some(done) = self.post(TranscoderRequest::Encode { buf: samples }) {
            return Some(done);
        }

        self.state = TranscodeState::Finishing;
        self.post(TranscoderRequest::Finish)
    }

    /// Apply one transcoder response. Returns the result once the job ends.
    pub fn on_response(&mut self, response: TranscoderResponse) -> Option<TranscodeResult> {
        if !self.state.is_active() {
            log::debug!("discarding transcoder response outside a job: {:?}", response);
            return None;
        }

        match response {
            TranscoderResponse::Data { buf } => {
                if !buf.is_empty() {
                    self.chunks.push(buf);
                }
                None
            }
            TranscoderResponse::End { buf } => {
                if let Some(buf) = buf.filter(|b| !b.is_empty()) {
                    self.chunks.push(buf);
                }
                let bytes = self.chunks.concat();
                self.chunks.clear();
                self.state = TranscodeState::Complete;
                Some(Ok(EncodedAudioBlob::new(bytes, COMPRESSED_MIME_TYPE)))
            }
            TranscoderResponse::Error { error } => {
                log::error!("transcoder error: {}", error);
                self.fail(RecorderError::TranscodeError(error))
            }
        }
    }

    /// Drop accumulated output. An active job fails with `TranscodeError`.
    pub fn clear(&mut self) -> Option<TranscodeResult> {
        if self.state.is_active() {
            return self.fail(RecorderError::TranscodeError("export discarded by clear".into()));
        }
        self.chunks.clear();
        None
    }

    /// Process commands and transcoder responses until `Shutdown`.
    pub fn run(mut self, commands: Receiver<BridgeCommand>, results: Sender<TranscodeResult>) {
        let mut responses = self.responses.clone();
        loop {
            let event = select! {
                recv(commands) -> command => Event::Command(command),
                recv(responses) -> response => Event::Response(response),
            };

            let outcome = match event {
                Event::Command(Ok(BridgeCommand::Transcode(source))) => self.begin(source),
                Event::Command(Ok(BridgeCommand::Clear)) => self.clear(),
                Event::Command(Ok(BridgeCommand::Shutdown)) | Event::Command(Err(_)) => break,
                Event::Response(Ok(response)) => self.on_response(response),
                Event::Response(Err(_)) => {
                    responses = never();
                    if self.state.is_active() {
                        self.fail(RecorderError::TranscodeError("transcoder disconnected".into()))
                    } else {
                        None
                    }
                }
            };

            if let Some(result) = outcome {
                if results.send(result).is_err() {
                    log::debug!("transcode result dropped, receiver is gone");
                }
            }
        }
        log::debug!("transcode bridge stopped");
    }

    fn post(&mut self, request: TranscoderRequest) -> Option<TranscodeResult> {
        if let Err(e) = self.transcoder.post(request) {
            return self.fail(e);
        }
        self.poll_ready()
    }

    /// Apply responses that have already arrived, stopping at a terminal one.
    fn poll_ready(&mut self) -> Option<TranscodeResult> {
        while let Ok(response) = self.responses.try_recv() {
            if let Some(done) = self.on_response(response) {
                return Some(done);
            }
        }
        None
    }

    fn fail(&mut self, error: RecorderError) -> Option<TranscodeResult> {
        self.chunks.clear();
        self.state = TranscodeState::Errored(error.clone());
        Some(Err(error))
    }
}

enum Event {
    Command(Result<BridgeCommand, RecvError>),
    Response(Result<TranscoderResponse, RecvError>),
}

/// Owning handle to a running bridge thread.
pub struct BridgeHandle {
    commands: Sender<BridgeCommand>,
    join: Option<thread::JoinHandle<()>>,
}

impl BridgeHandle {
    pub fn sender(&self) -> Sender<BridgeCommand> {
        self.commands.clone()
    }

    pub fn send(&self, command: BridgeCommand) -> Result<(), RecorderError> {
        self.commands.send(command).map_err(|_| RecorderError::Closed)
    }

    /// Whether the bridge thread has exited, normally or by panic.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |handle| handle.is_finished())
    }

    pub fn shutdown(&mut self) {
        let _ = self.commands.send(BridgeCommand::Shutdown);
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                log::warn!("transcode bridge thread panicked");
            }
        }
    }
}

/// Reports a job lost to a panic in the transcoder so its export is released.
struct AbortGuard {
    results: Sender<TranscodeResult>,
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("transcode bridge panicked");
            let _ = self.results.send(Err(RecorderError::TranscodeError(
                "transcode bridge stopped unexpectedly".into(),
            )));
        }
    }
}

/// Create a transcoder and start a bridge thread around it.
///
/// Any failure to bring the transcoder up is `TranscoderUnavailable`.
pub fn spawn_bridge(
    spawner: &TranscoderSpawner,
    bitrate: u32,
    results: Sender<TranscodeResult>,
) -> Result<BridgeHandle, RecorderError> {
    let (response_tx, response_rx) = unbounded();
    let transcoder = spawner(response_tx).map_err(|e| match e {
        RecorderError::TranscoderUnavailable(_) => e,
        other => RecorderError::TranscoderUnavailable(other.to_string()),
    })?;

    let bridge = Mp3TranscodeBridge::new(transcoder, response_rx, bitrate);
    let (tx, rx) = bounded(4);
    let join = thread::Builder::new()
        .name("transcode-bridge".into())
        .spawn(move || {
            let _guard = AbortGuard {
                results: results.clone(),
            };
            bridge.run(rx, results)
        })
        .map_err(|e| RecorderError::TranscoderUnavailable(format!("failed to spawn bridge thread: {}", e)))?;

    Ok(BridgeHandle {
        commands: tx,
        join: Some(join),
    })
}
