use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvError, Sender};
use parking_lot::Mutex;

use crate::models::blob::{EncodedAudioBlob, ExportFormat};
use crate::models::config::RecorderConfig;
use crate::models::diagnostics::CaptureDiagnostics;
use crate::models::error::RecorderError;
use crate::processing::aggregator::{
    self, AggregatorCommand, AggregatorHandle, AggregatorReply, BuffersResult, WavExportResult,
};
use crate::traits::audio_host::{AudioHost, HostCapability, ProcessingNode, QuantumCallback};
use crate::traits::transcoder::TranscoderSpawner;
use crate::transcode::bridge::{self, BridgeCommand, BridgeHandle, TranscodeResult};
use crate::transcode::stub::UnavailableTranscoder;

/// Completion handler for an export. Receives exactly one of blob or error.
pub type ExportCallback = Box<dyn FnOnce(Result<EncodedAudioBlob, RecorderError>) + Send + 'static>;

/// Completion handler for [`CaptureOrchestrator::get_buffers`].
pub type BuffersCallback = Box<dyn FnOnce(BuffersResult) + Send + 'static>;

/// The single in-flight request slot.
enum PendingRequest {
    Wav(ExportCallback),
    /// Waiting for the WAV, then for the bridge to transcode it.
    Compressed {
        bridge: Sender<BridgeCommand>,
        callback: ExportCallback,
    },
    Buffers(BuffersCallback),
}

impl PendingRequest {
    fn fail(self, error: RecorderError) {
        match self {
            Self::Wav(callback) | Self::Compressed { callback, .. } => callback(Err(error)),
            Self::Buffers(callback) => callback(Err(error)),
        }
    }

    fn is_blob(&self) -> bool {
        !matches!(self, Self::Buffers(_))
    }

    fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed { .. })
    }

    fn is_buffers(&self) -> bool {
        matches!(self, Self::Buffers(_))
    }
}

#[derive(Default)]
struct CaptureCounters {
    quanta_captured: AtomicU64,
    quanta_dropped: AtomicU64,
    samples_captured: AtomicU64,
}

/// Real-time side of the pipeline: copies each quantum into the aggregator
/// queue while the recording flag is set.
///
/// Never blocks. A full queue drops the quantum and counts it.
#[derive(Clone)]
pub struct CaptureTap {
    recording: Arc<AtomicBool>,
    /// Callbacks currently between the flag check and the enqueue.
    in_flight: Arc<AtomicUsize>,
    counters: Arc<CaptureCounters>,
    commands: Sender<AggregatorCommand>,
}

impl CaptureTap {
    pub fn on_quantum(&self, channels: &[&[f32]]) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.recording.load(Ordering::SeqCst) {
            self.enqueue(channels);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn enqueue(&self, channels: &[&[f32]]) {
        // The host reuses its buffers once the callback returns.
        let quantum: Vec<Vec<f32>> = channels.iter().map(|c| c.to_vec()).collect();
        let frames = channels.first().map_or(0, |c| c.len()) as u64;

        if aggregator::try_record(&self.commands, quantum) {
            self.counters.quanta_captured.fetch_add(1, Ordering::Relaxed);
            self.counters.samples_captured.fetch_add(frames, Ordering::Relaxed);
        } else {
            self.counters.quanta_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Capture lifecycle and message routing.
///
/// Data flow:
/// ```text
/// [AudioHost node] → CaptureTap ─(record)→ [pcm-aggregator] ─(WAV)→ [export-dispatch] → callback
///                                                                     │        ↑
///                                                                     └→ [transcode-bridge] ↔ Transcoder
/// ```
///
/// At most one export (or buffer read) is in flight; further requests are
/// rejected through their callback with `RecordingInProgress` rather than
/// queued.
pub struct CaptureOrchestrator<H: AudioHost> {
    host: H,
    transcoder: TranscoderSpawner,
    config: Option<RecorderConfig>,
    node: Option<Box<dyn ProcessingNode>>,
    recording: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    counters: Arc<CaptureCounters>,
    pending: Arc<Mutex<Option<PendingRequest>>>,
    aggregator: Option<AggregatorHandle>,
    bridge: Option<BridgeHandle>,
    transcode_results: Option<Sender<TranscodeResult>>,
    dispatcher_stop: Option<Sender<()>>,
    dispatcher: Option<thread::JoinHandle<()>>,
    closed: bool,
}

impl<H: AudioHost> CaptureOrchestrator<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            transcoder: UnavailableTranscoder::spawner(),
            config: None,
            node: None,
            recording: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            counters: Arc::new(CaptureCounters::default()),
            pending: Arc::new(Mutex::new(None)),
            aggregator: None,
            bridge: None,
            transcode_results: None,
            dispatcher_stop: None,
            dispatcher: None,
            closed: false,
        }
    }

    /// Use `spawner` to create the transcoder for compressed exports.
    pub fn with_transcoder(mut self, spawner: TranscoderSpawner) -> Self {
        self.transcoder = spawner;
        self
    }

    pub fn config(&self) -> Option<&RecorderConfig> {
        self.config.as_ref()
    }

    /// One-time setup: probe the host, start the background threads and
    /// attach the capture callback.
    pub fn configure(&mut self, config: RecorderConfig) -> Result<(), RecorderError> {
        if self.closed {
            return Err(RecorderError::Closed);
        }
        if self.config.is_some() {
            return Err(RecorderError::AlreadyConfigured);
        }
        config.validate()?;

        let mut node = match self.host.probe(&config) {
            HostCapability::Available(node) => node,
            HostCapability::Unsupported(reason) => {
                return Err(RecorderError::UnsupportedConfiguration(reason));
            }
        };

        let (reply_tx, reply_rx) = unbounded();
        let (transcode_tx, transcode_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded(0);

        let mut aggregator = aggregator::spawn_aggregator(config.queue_capacity, reply_tx)?;
        aggregator.send(AggregatorCommand::Init(config.clone()))?;

        let pending = Arc::clone(&self.pending);
        let dispatcher = thread::Builder::new()
            .name("export-dispatch".into())
            .spawn(move || run_dispatcher(reply_rx, transcode_rx, stop_rx, pending));
        let dispatcher = match dispatcher {
            Ok(handle) => handle,
            Err(e) => {
                aggregator.shutdown();
                return Err(RecorderError::IoError(format!("failed to spawn dispatch thread: {}", e)));
            }
        };

        let tap = CaptureTap {
            recording: Arc::clone(&self.recording),
            in_flight: Arc::clone(&self.in_flight),
            counters: Arc::clone(&self.counters),
            commands: aggregator.sender(),
        };
        let callback: QuantumCallback = Arc::new(move |channels: &[&[f32]]| tap.on_quantum(channels));

        self.aggregator = Some(aggregator);
        self.transcode_results = Some(transcode_tx);
        self.dispatcher_stop = Some(stop_tx);
        self.dispatcher = Some(dispatcher);

        if let Err(e) = node.connect(callback) {
            self.shutdown_workers();
            return Err(RecorderError::UnsupportedConfiguration(format!(
                "failed to attach capture node: {}",
                e
            )));
        }
        self.node = Some(node);

        log::info!(
            "recorder configured: {} ch, {} Hz, {} frames per quantum",
            config.channel_count,
            config.sample_rate,
            config.quantum_size
        );
        self.config = Some(config);
        Ok(())
    }

    /// Begin buffering captured quanta.
    pub fn start(&self) -> Result<(), RecorderError> {
        self.ensure_open()?;
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop buffering.
    ///
    /// The node's partial quantum is flushed first, and this returns only
    /// once no capture callback is still enqueueing, so every quantum
    /// accepted while recording precedes a subsequent export.
    pub fn stop(&mut self) -> Result<(), RecorderError> {
        self.ensure_open()?;
        if self.recording.load(Ordering::SeqCst) {
            if let Some(node) = self.node.as_mut() {
                if let Err(e) = node.flush() {
                    log::warn!("failed to flush capture node: {}", e);
                }
            }
        }

        self.recording.store(false, Ordering::SeqCst);
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }

        let dropped = self.counters.quanta_dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            log::warn!("{} quanta dropped because the aggregator queue was full", dropped);
        }
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Whether an export or buffer read is waiting for its result.
    pub fn has_pending_export(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        CaptureDiagnostics {
            quanta_captured: self.counters.quanta_captured.load(Ordering::Relaxed),
            quanta_dropped: self.counters.quanta_dropped.load(Ordering::Relaxed),
            samples_captured: self.counters.samples_captured.load(Ordering::Relaxed),
        }
    }

    /// Discard recorded audio and any partial compressed output.
    pub fn clear(&self) -> Result<(), RecorderError> {
        self.ensure_open()?;
        if let Some(aggregator) = &self.aggregator {
            aggregator.send(AggregatorCommand::Clear)?;
        }
        if let Some(bridge) = &self.bridge {
            bridge.send(BridgeCommand::Clear)?;
        }
        Ok(())
    }

    pub fn export_wav<F>(&mut self, callback: F)
    where
        F: FnOnce(Result<EncodedAudioBlob, RecorderError>) + Send + 'static,
    {
        self.export_as(ExportFormat::Wav, callback);
    }

    pub fn export_compressed<F>(&mut self, callback: F)
    where
        F: FnOnce(Result<EncodedAudioBlob, RecorderError>) + Send + 'static,
    {
        self.export_as(ExportFormat::Compressed, callback);
    }

    /// Request an export. The outcome, including any rejection, is delivered
    /// to `callback`; rejections are delivered before this returns.
    pub fn export_as<F>(&mut self, format: ExportFormat, callback: F)
    where
        F: FnOnce(Result<EncodedAudioBlob, RecorderError>) + Send + 'static,
    {
        if let Err(e) = self.check_idle() {
            return callback(Err(e));
        }

        let request = match format {
            ExportFormat::Wav => PendingRequest::Wav(Box::new(callback)),
            ExportFormat::Compressed => match self.ensure_bridge() {
                Ok(bridge) => PendingRequest::Compressed {
                    bridge,
                    callback: Box::new(callback),
                },
                Err(e) => {
                    log::warn!("compressed export unavailable: {}", e);
                    return callback(Err(e));
                }
            },
        };
        self.submit(request, AggregatorCommand::ExportWav);
    }

    /// Read the recorded samples of each channel without encoding them.
    ///
    /// Subject to the same rules as an export: rejected while recording or
    /// while another request is in flight.
    pub fn get_buffers<F>(&mut self, callback: F)
    where
        F: FnOnce(BuffersResult) + Send + 'static,
    {
        if let Err(e) = self.check_idle() {
            return callback(Err(e));
        }
        self.submit(PendingRequest::Buffers(Box::new(callback)), AggregatorCommand::GetBuffers);
    }

    /// Detach from the host and stop all background threads.
    ///
    /// Idempotent and infallible: detach errors are logged. An export still
    /// in flight is abandoned and its callback is never invoked.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.recording.store(false, Ordering::SeqCst);

        if let Some(mut node) = self.node.take() {
            if let Err(e) = node.disconnect() {
                log::warn!("failed to detach capture node: {}", e);
            }
        }

        let abandoned = self.pending.lock().take();
        if abandoned.is_some() {
            log::debug!("abandoning in-flight export on close");
        }
        drop(abandoned);
        self.shutdown_workers();
        log::debug!("recorder closed");
    }

    fn ensure_open(&self) -> Result<(), RecorderError> {
        if self.closed {
            return Err(RecorderError::Closed);
        }
        if self.config.is_none() {
            return Err(RecorderError::NotConfigured);
        }
        Ok(())
    }

    fn check_idle(&self) -> Result<(), RecorderError> {
        self.ensure_open()?;
        if self.is_recording() || self.has_pending_export() {
            return Err(RecorderError::RecordingInProgress);
        }
        Ok(())
    }

    /// Claim the pending slot for `request` and ask the aggregator for its data.
    fn submit(&mut self, request: PendingRequest, command: AggregatorCommand) {
        {
            let mut slot = self.pending.lock();
            if slot.is_some() {
                drop(slot);
                return request.fail(RecorderError::RecordingInProgress);
            }
            *slot = Some(request);
        }

        let sent = match &self.aggregator {
            Some(aggregator) => aggregator.send(command),
            None => Err(RecorderError::NotConfigured),
        };
        if let Err(e) = sent {
            let request = self.pending.lock().take();
            if let Some(request) = request {
                request.fail(e);
            }
        }
    }

    fn ensure_bridge(&mut self) -> Result<Sender<BridgeCommand>, RecorderError> {
        if let Some(bridge) = &self.bridge {
            if !bridge.is_finished() {
                return Ok(bridge.sender());
            }
        }
        if let Some(mut dead) = self.bridge.take() {
            log::warn!("transcode bridge exited, starting a new one");
            dead.shutdown();
        }

        let (bitrate, results) = match (&self.config, &self.transcode_results) {
            (Some(config), Some(results)) => (config.bitrate, results.clone()),
            _ => return Err(RecorderError::NotConfigured),
        };
        let bridge = bridge::spawn_bridge(&self.transcoder, bitrate, results)?;
        let commands = bridge.sender();
        self.bridge = Some(bridge);
        Ok(commands)
    }

    fn shutdown_workers(&mut self) {
        if let Some(mut aggregator) = self.aggregator.take() {
            aggregator.shutdown();
        }
        if let Some(mut bridge) = self.bridge.take() {
            bridge.shutdown();
        }
        self.transcode_results = None;
        self.dispatcher_stop = None;
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                log::warn!("export dispatch thread panicked");
            }
        }
    }
}

impl<H: AudioHost> Drop for CaptureOrchestrator<H> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Take the pending request if `wanted` accepts it.
fn take_pending(
    pending: &Mutex<Option<PendingRequest>>,
    wanted: fn(&PendingRequest) -> bool,
) -> Option<PendingRequest> {
    let mut slot = pending.lock();
    if slot.as_ref().map_or(false, wanted) {
        slot.take()
    } else {
        None
    }
}

/// Deliver a finished blob (or its error) to the pending export.
fn complete_blob(pending: &Mutex<Option<PendingRequest>>, result: Result<EncodedAudioBlob, RecorderError>) {
    match take_pending(pending, PendingRequest::is_blob) {
        Some(PendingRequest::Wav(callback)) | Some(PendingRequest::Compressed { callback, .. }) => callback(result),
        _ => log::debug!("export result arrived with no pending export"),
    }
}

/// A WAV is ready: hand it to the caller, or on to the bridge for a
/// compressed export.
fn route_wav(pending: &Mutex<Option<PendingRequest>>, result: WavExportResult) {
    let bridge = match pending.lock().as_ref() {
        Some(PendingRequest::Compressed { bridge, .. }) => Some(bridge.clone()),
        _ => None,
    };
    match (bridge, result) {
        (Some(bridge), Ok(wav)) => {
            let source = Box::new(wav.into_reader());
            if bridge.send(BridgeCommand::Transcode(source)).is_err() {
                complete_blob(
                    pending,
                    Err(RecorderError::TranscodeError("transcode bridge stopped".into())),
                );
            }
        }
        (_, result) => complete_blob(pending, result),
    }
}

enum DispatchEvent {
    Aggregator(Result<AggregatorReply, RecvError>),
    Transcoded(Result<TranscodeResult, RecvError>),
    Stop,
}

/// Routes aggregator and bridge results to the pending callback.
fn run_dispatcher(
    replies: Receiver<AggregatorReply>,
    transcode_results: Receiver<TranscodeResult>,
    stop: Receiver<()>,
    pending: Arc<Mutex<Option<PendingRequest>>>,
) {
    loop {
        let event = select! {
            recv(replies) -> reply => DispatchEvent::Aggregator(reply),
            recv(transcode_results) -> result => DispatchEvent::Transcoded(result),
            recv(stop) -> _ => DispatchEvent::Stop,
        };

        match event {
            DispatchEvent::Aggregator(Ok(AggregatorReply::Wav(result))) => route_wav(&pending, result),
            DispatchEvent::Aggregator(Ok(AggregatorReply::Buffers(result))) => {
                match take_pending(&pending, PendingRequest::is_buffers) {
                    Some(PendingRequest::Buffers(callback)) => callback(result),
                    _ => log::debug!("buffers arrived with no pending request"),
                }
            }
            DispatchEvent::Transcoded(Ok(result)) => match take_pending(&pending, PendingRequest::is_compressed) {
                Some(PendingRequest::Compressed { callback, .. }) => callback(result),
                _ => log::debug!("transcode result arrived with no pending compressed export"),
            },
            DispatchEvent::Aggregator(Err(_)) | DispatchEvent::Transcoded(Err(_)) | DispatchEvent::Stop => break,
        }
    }
    log::debug!("export dispatcher stopped");
}
