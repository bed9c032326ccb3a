use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::models::blob::{EncodedAudioBlob, WAV_MIME_TYPE};
use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;
use crate::models::recording::RecordingSession;
use crate::processing::wav_codec;

/// Outcome of a WAV export.
pub type WavExportResult = Result<EncodedAudioBlob, RecorderError>;

/// Merged per-channel samples, unencoded.
pub type BuffersResult = Result<Vec<Vec<f32>>, RecorderError>;

/// Sent back over the aggregator's reply queue, one per request.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatorReply {
    Wav(WavExportResult),
    Buffers(BuffersResult),
}

/// Messages accepted by the aggregator thread, processed strictly in order.
#[derive(Debug)]
pub enum AggregatorCommand {
    Init(RecorderConfig),
    /// One quantum: one owned sample chunk per channel.
    Record(Vec<Vec<f32>>),
    ExportWav,
    /// Reply with the merged float samples of each channel.
    GetBuffers,
    Clear,
    Shutdown,
}

/// Accumulates per-channel sample chunks and builds WAV exports.
///
/// Single-threaded: all state is owned by whichever thread drives it,
/// normally the one started by [`spawn_aggregator`].
#[derive(Debug, Default)]
pub struct PcmAggregator {
    session: Option<RecordingSession>,
}

impl PcmAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Allocate one empty channel buffer per configured channel.
    pub fn init(&mut self, config: &RecorderConfig) {
        self.session = Some(RecordingSession::new(config));
    }

    /// Append one quantum. Returns `false` when the quantum was dropped.
    ///
    /// A quantum whose channel count differs from the session's, or which
    /// carries an empty channel, is discarded without advancing the session.
    pub fn record(&mut self, quantum: Vec<Vec<f32>>) -> bool {
        let Some(session) = self.session.as_mut() else {
            log::debug!("dropping quantum received before init");
            return false;
        };

        if quantum.len() != session.channel_count as usize {
            log::debug!(
                "dropping quantum with {} channels, session has {}",
                quantum.len(),
                session.channel_count
            );
            return false;
        }
        if quantum.iter().any(|chunk| chunk.is_empty()) {
            log::debug!("dropping quantum with an empty channel");
            return false;
        }

        let advance = quantum[0].len();
        for (buffer, chunk) in session.channel_buffers.iter_mut().zip(quantum) {
            buffer.push(chunk);
        }
        session.total_sample_count += advance;
        true
    }

    /// Merge, interleave and encode everything recorded so far.
    pub fn export_wav(&self) -> WavExportResult {
        let session = match &self.session {
            Some(s) if !s.is_empty() => s,
            _ => return Err(RecorderError::NoDataRecorded),
        };

        let merged = merge_channels(session)?;
        let interleaved = match merged.as_slice() {
            [mono] => mono.clone(),
            [left, right] => interleave(left, right),
            _ => {
                return Err(RecorderError::InvalidConfiguration(format!(
                    "unsupported channel count: {}",
                    merged.len()
                )))
            }
        };

        let bytes = wav_codec::encode(session.sample_rate, session.channel_count, &interleaved)?;
        Ok(EncodedAudioBlob::new(bytes, WAV_MIME_TYPE))
    }

    /// Merged samples per channel, in arrival order.
    ///
    /// An empty session yields one empty buffer per channel.
    pub fn buffers(&self) -> BuffersResult {
        match &self.session {
            Some(session) => merge_channels(session),
            None => Err(RecorderError::NotConfigured),
        }
    }

    /// Discard all recorded audio; configuration is kept.
    pub fn clear(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.clear();
        }
    }

    /// Apply one command. Returns `false` once the aggregator should stop.
    pub fn handle(&mut self, command: AggregatorCommand, replies: &Sender<AggregatorReply>) -> bool {
        let reply = match command {
            AggregatorCommand::Init(config) => {
                self.init(&config);
                None
            }
            AggregatorCommand::Record(quantum) => {
                self.record(quantum);
                None
            }
            AggregatorCommand::ExportWav => {
                let result = self.export_wav();
                if let Err(ref e) = result {
                    log::warn!("WAV export failed: {}", e);
                }
                Some(AggregatorReply::Wav(result))
            }
            AggregatorCommand::GetBuffers => Some(AggregatorReply::Buffers(self.buffers())),
            AggregatorCommand::Clear => {
                self.clear();
                None
            }
            AggregatorCommand::Shutdown => return false,
        };
        if let Some(reply) = reply {
            if replies.send(reply).is_err() {
                log::debug!("aggregator reply dropped, receiver is gone");
            }
        }
        true
    }

    /// Process commands until `Shutdown` or until every sender is dropped.
    pub fn run(mut self, commands: Receiver<AggregatorCommand>, replies: Sender<AggregatorReply>) {
        while let Ok(command) = commands.recv() {
            if !self.handle(command, &replies) {
                break;
            }
        }
        log::debug!("aggregator stopped");
    }
}

/// Merge every channel, requiring all of them to hold `total_sample_count` samples.
fn merge_channels(session: &RecordingSession) -> BuffersResult {
    let total = session.total_sample_count;
    for (channel, buffer) in session.channel_buffers.iter().enumerate() {
        if buffer.sample_count() != total {
            return Err(RecorderError::ChannelLengthMismatch {
                channel,
                left: total,
                right: buffer.sample_count(),
            });
        }
    }
    Ok(session.channel_buffers.iter().map(|b| b.merge()).collect())
}

/// Interleave two equal-length channels into `[L0, R0, L1, R1, ...]`.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    for (&l, &r) in left.iter().zip(right) {
        out.push(l);
        out.push(r);
    }
    out
}

/// Owning handle to a running aggregator thread.
pub struct AggregatorHandle {
    commands: Sender<AggregatorCommand>,
    join: Option<thread::JoinHandle<()>>,
}

impl AggregatorHandle {
    /// A sender for the capture callback. Use [`try_record`] on it.
    pub fn sender(&self) -> Sender<AggregatorCommand> {
        self.commands.clone()
    }

    /// Queue a control command, waiting for room if the queue is full.
    pub fn send(&self, command: AggregatorCommand) -> Result<(), RecorderError> {
        self.commands.send(command).map_err(|_| RecorderError::Closed)
    }

    /// Stop the thread after it drains already queued commands.
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(AggregatorCommand::Shutdown);
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                log::warn!("aggregator thread panicked");
            }
        }
    }
}

/// Queue a quantum without blocking. Returns `false` if it was not queued.
pub fn try_record(commands: &Sender<AggregatorCommand>, quantum: Vec<Vec<f32>>) -> bool {
    commands.try_send(AggregatorCommand::Record(quantum)).is_ok()
}

/// Start the aggregator on its own thread with a queue of `capacity` commands.
pub fn spawn_aggregator(capacity: usize, replies: Sender<AggregatorReply>) -> Result<AggregatorHandle, RecorderError> {
    let (tx, rx) = bounded(capacity);
    let join = thread::Builder::new()
        .name("pcm-aggregator".into())
        .spawn(move || PcmAggregator::new().run(rx, replies))
        .map_err(|e| RecorderError::IoError(format!("failed to spawn aggregator thread: {}", e)))?;
    Ok(AggregatorHandle {
        commands: tx,
        join: Some(join),
    })
}
