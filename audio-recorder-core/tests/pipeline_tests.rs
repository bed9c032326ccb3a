// End-to-end tests for the recorder pipeline.
//
// A ManualHost stands in for the audio device so each test pushes quanta
// by hand; fake transcoders cover the compressed export path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use audio_recorder_core::processing::wav_codec;
use audio_recorder_core::{
    AudioHost, BuffersResult, CaptureOrchestrator, ChannelMode, EncodedAudioBlob, ExportFormat, HostCapability,
    ManualHost, ProcessingNode, QuantumAssembler, QuantumCallback, RecorderConfig, RecorderError, Transcoder,
    TranscoderConfig, TranscoderRequest, TranscoderResponse, TranscoderSpawner,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

const TIMEOUT: Duration = Duration::from_secs(5);

type ExportResult = Result<EncodedAudioBlob, RecorderError>;

fn setup(channel_count: u16, sample_rate: u32) -> (CaptureOrchestrator<ManualHost>, ManualHost) {
    setup_with(channel_count, sample_rate, None)
}

fn setup_with(
    channel_count: u16,
    sample_rate: u32,
    transcoder: Option<TranscoderSpawner>,
) -> (CaptureOrchestrator<ManualHost>, ManualHost) {
    let host = ManualHost::new();
    let mut recorder = CaptureOrchestrator::new(host.clone());
    if let Some(spawner) = transcoder {
        recorder = recorder.with_transcoder(spawner);
    }
    recorder
        .configure(RecorderConfig {
            channel_count,
            sample_rate,
            ..Default::default()
        })
        .unwrap();
    (recorder, host)
}

fn request<H: AudioHost>(recorder: &mut CaptureOrchestrator<H>, format: ExportFormat) -> Receiver<ExportResult> {
    let (tx, rx) = bounded(1);
    recorder.export_as(format, move |result| {
        let _ = tx.send(result);
    });
    rx
}

fn export<H: AudioHost>(recorder: &mut CaptureOrchestrator<H>, format: ExportFormat) -> ExportResult {
    request(recorder, format).recv_timeout(TIMEOUT).unwrap()
}

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// Emits one chunk per encoded buffer plus a trailing chunk on `finish`.
/// Records every request it sees.
struct ChunkingTranscoder {
    responses: Sender<TranscoderResponse>,
    seen: Arc<Mutex<Vec<TranscoderRequest>>>,
}

impl Transcoder for ChunkingTranscoder {
    fn post(&mut self, request: TranscoderRequest) -> Result<(), RecorderError> {
        let reply = match &request {
            TranscoderRequest::Init { .. } => None,
            TranscoderRequest::Encode { buf } => {
                let _ = self.responses.send(TranscoderResponse::Data { buf: Vec::new() });
                Some(TranscoderResponse::Data {
                    buf: (buf.len() as u32).to_le_bytes().to_vec(),
                })
            }
            TranscoderRequest::Finish => Some(TranscoderResponse::End { buf: Some(vec![0xEE]) }),
        };
        self.seen.lock().push(request);
        if let Some(reply) = reply {
            let _ = self.responses.send(reply);
        }
        Ok(())
    }
}

fn chunking_spawner(seen: Arc<Mutex<Vec<TranscoderRequest>>>) -> TranscoderSpawner {
    Arc::new(move |responses| {
        Ok(Box::new(ChunkingTranscoder {
            responses,
            seen: Arc::clone(&seen),
        }) as Box<dyn Transcoder>)
    })
}

/// Accepts everything and never answers; reports `finish` on `finished`.
struct SilentTranscoder {
    _responses: Sender<TranscoderResponse>,
    finished: Sender<()>,
}

impl Transcoder for SilentTranscoder {
    fn post(&mut self, request: TranscoderRequest) -> Result<(), RecorderError> {
        if matches!(request, TranscoderRequest::Finish) {
            let _ = self.finished.send(());
        }
        Ok(())
    }
}

fn silent_spawner() -> (TranscoderSpawner, Receiver<()>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawner: TranscoderSpawner = Arc::new(move |responses| {
        Ok(Box::new(SilentTranscoder {
            _responses: responses,
            finished: tx.clone(),
        }) as Box<dyn Transcoder>)
    });
    (spawner, rx)
}

#[test]
fn three_mono_quanta_export_as_10240_samples() {
    let (mut recorder, host) = setup(1, 16000);
    recorder.start().unwrap();
    for len in [4096usize, 4096, 2048] {
        assert!(host.push(&[&vec![0.0f32; len]]));
    }
    recorder.stop().unwrap();
    assert_eq!(recorder.diagnostics().samples_captured, 10240);

    let blob = export(&mut recorder, ExportFormat::Wav).unwrap();
    let bytes = blob.bytes();
    assert_eq!(blob.mime_type(), "audio/wav");
    assert_eq!(bytes.len(), 44 + 20480);
    assert_eq!(le_u32(bytes, 4), 36 + 20480);
    assert_eq!(le_u32(bytes, 40), 20480);
    assert_eq!(le_u32(bytes, 24), 16000);
    assert!(bytes[44..].iter().all(|&b| b == 0));
}

#[test]
fn export_without_data_reports_no_data() {
    let (mut recorder, _host) = setup(1, 16000);
    assert_eq!(export(&mut recorder, ExportFormat::Wav), Err(RecorderError::NoDataRecorded));
}

#[test]
fn clear_then_export_reports_no_data() {
    let (mut recorder, host) = setup(2, 44100);
    recorder.start().unwrap();
    host.push(&[&[0.25; 128], &[-0.25; 128]]);
    recorder.stop().unwrap();
    recorder.clear().unwrap();
    assert_eq!(export(&mut recorder, ExportFormat::Wav), Err(RecorderError::NoDataRecorded));

    // The session stays usable after a clear.
    recorder.start().unwrap();
    host.push(&[&[0.25; 16], &[-0.25; 16]]);
    recorder.stop().unwrap();
    let blob = export(&mut recorder, ExportFormat::Wav).unwrap();
    assert_eq!(blob.len(), 44 + 16 * 2 * 2);
}

#[test]
fn stereo_export_is_interleaved() {
    let (mut recorder, host) = setup(2, 8000);
    recorder.start().unwrap();
    host.push(&[&[1.0, 1.0], &[-1.0, -1.0]]);
    recorder.stop().unwrap();

    let blob = export(&mut recorder, ExportFormat::Wav).unwrap();
    assert_eq!(&blob.bytes()[44..], &[0xFF, 0x7F, 0x00, 0x80, 0xFF, 0x7F, 0x00, 0x80]);

    let document = wav_codec::decode(blob.bytes()).unwrap();
    assert_eq!(document.channel_count, 2);
    assert_eq!(document.frame_count(), 2);
}

#[test]
fn diverging_stereo_channels_report_mismatch() {
    let (mut recorder, host) = setup(2, 8000);
    recorder.start().unwrap();
    host.push(&[&[0.1; 4], &[0.1; 4]]);
    host.push(&[&[0.1; 4], &[0.1; 3]]);
    recorder.stop().unwrap();

    assert!(matches!(
        export(&mut recorder, ExportFormat::Wav),
        Err(RecorderError::ChannelLengthMismatch { .. })
    ));
}

#[test]
fn malformed_quanta_are_dropped() {
    let (mut recorder, host) = setup(2, 8000);
    recorder.start().unwrap();
    host.push(&[&[0.1; 4]]);
    host.push(&[&[0.1; 4], &[0.1; 4]]);
    recorder.stop().unwrap();

    let blob = export(&mut recorder, ExportFormat::Wav).unwrap();
    assert_eq!(blob.len(), 44 + 4 * 2 * 2);
}

#[test]
fn export_while_recording_is_rejected() {
    let (mut recorder, host) = setup(1, 16000);
    recorder.start().unwrap();
    host.push(&[&[0.5; 64]]);
    assert!(recorder.is_recording());

    let rx = request(&mut recorder, ExportFormat::Wav);
    // Rejections are delivered before export_as returns.
    assert_eq!(rx.try_recv().unwrap(), Err(RecorderError::RecordingInProgress));
    assert!(!recorder.has_pending_export());
}

#[test]
fn stub_transcoder_fails_compressed_export() {
    let (mut recorder, host) = setup(1, 16000);
    recorder.start().unwrap();
    host.push(&[&[0.5; 256]]);
    recorder.stop().unwrap();

    match export(&mut recorder, ExportFormat::Compressed) {
        Err(RecorderError::TranscodeError(message)) => assert!(message.contains("not available")),
        other => panic!("expected TranscodeError, got {:?}", other),
    }
    assert!(!recorder.has_pending_export());

    // The WAV path is unaffected.
    assert!(export(&mut recorder, ExportFormat::Wav).is_ok());
}

#[test]
fn compressed_export_assembles_transcoder_chunks() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (mut recorder, host) = setup_with(2, 22050, Some(chunking_spawner(Arc::clone(&seen))));
    recorder.start().unwrap();
    host.push(&[&[0.5; 100], &[-0.5; 100]]);
    recorder.stop().unwrap();

    let blob = export(&mut recorder, ExportFormat::Compressed).unwrap();
    assert_eq!(blob.mime_type(), "audio/mp3");
    let mut expected = 200u32.to_le_bytes().to_vec();
    expected.push(0xEE);
    assert_eq!(blob.bytes(), expected.as_slice());

    let seen = seen.lock();
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen[0],
        TranscoderRequest::Init {
            config: TranscoderConfig {
                channel_mode: ChannelMode::JointStereo,
                channel_count: 2,
                sample_rate: 22050,
                bitrate: 128,
            },
        }
    );
    assert!(matches!(seen[2], TranscoderRequest::Finish));
}

#[test]
fn unavailable_transcoder_fails_without_touching_recording() {
    let spawner: TranscoderSpawner = Arc::new(|_: Sender<TranscoderResponse>| {
        Err(RecorderError::TranscoderUnavailable("no encoder installed".into()))
    });
    let (mut recorder, host) = setup_with(1, 16000, Some(spawner));
    recorder.start().unwrap();
    host.push(&[&[0.5; 32]]);
    recorder.stop().unwrap();

    let rx = request(&mut recorder, ExportFormat::Compressed);
    assert!(matches!(rx.try_recv().unwrap(), Err(RecorderError::TranscoderUnavailable(_))));
    assert!(!recorder.has_pending_export());

    let blob = export(&mut recorder, ExportFormat::Wav).unwrap();
    assert_eq!(blob.len(), 44 + 64);
}

#[test]
fn second_export_rejected_while_one_is_pending() {
    let (spawner, finished) = silent_spawner();
    let (mut recorder, host) = setup_with(1, 16000, Some(spawner));
    recorder.start().unwrap();
    host.push(&[&[0.5; 32]]);
    recorder.stop().unwrap();

    let first = request(&mut recorder, ExportFormat::Compressed);
    finished.recv_timeout(TIMEOUT).unwrap();
    assert!(recorder.has_pending_export());

    let second = request(&mut recorder, ExportFormat::Wav);
    assert_eq!(second.try_recv().unwrap(), Err(RecorderError::RecordingInProgress));

    // Close abandons the pending export without invoking its callback.
    recorder.close();
    assert_eq!(first.recv_timeout(TIMEOUT), Err(RecvTimeoutError::Disconnected));
}

#[test]
fn clear_fails_an_export_mid_transcode() {
    let (spawner, finished) = silent_spawner();
    let (mut recorder, host) = setup_with(1, 16000, Some(spawner));
    recorder.start().unwrap();
    host.push(&[&[0.5; 32]]);
    recorder.stop().unwrap();

    let pending = request(&mut recorder, ExportFormat::Compressed);
    finished.recv_timeout(TIMEOUT).unwrap();
    recorder.clear().unwrap();

    assert!(matches!(
        pending.recv_timeout(TIMEOUT).unwrap(),
        Err(RecorderError::TranscodeError(_))
    ));
    assert!(!recorder.has_pending_export());
}

#[test]
fn unsupported_host_is_reported_at_configure() {
    let mut recorder = CaptureOrchestrator::new(ManualHost::unsupported("no processing callback"));
    assert_eq!(
        recorder.configure(RecorderConfig::default()),
        Err(RecorderError::UnsupportedConfiguration("no processing callback".into()))
    );
    assert_eq!(recorder.start(), Err(RecorderError::NotConfigured));
}

#[test]
fn invalid_config_is_rejected() {
    let mut recorder = CaptureOrchestrator::new(ManualHost::new());
    let result = recorder.configure(RecorderConfig {
        channel_count: 3,
        ..Default::default()
    });
    assert!(matches!(result, Err(RecorderError::InvalidConfiguration(_))));
}

#[test]
fn drop_detaches_from_host() {
    let (recorder, host) = setup(1, 16000);
    assert!(host.is_connected());
    drop(recorder);
    assert!(!host.is_connected());
    assert!(!host.push(&[&[0.0; 4]]));
}

fn read_buffers<H: AudioHost>(recorder: &mut CaptureOrchestrator<H>) -> BuffersResult {
    let (tx, rx) = bounded(1);
    recorder.get_buffers(move |result| {
        let _ = tx.send(result);
    });
    rx.recv_timeout(TIMEOUT).unwrap()
}

#[test]
fn get_buffers_returns_merged_channels() {
    let (mut recorder, host) = setup(2, 16000);
    recorder.start().unwrap();
    host.push(&[&[0.25; 3], &[-0.25; 3]]);
    host.push(&[&[0.5; 2], &[-0.5; 2]]);

    assert_eq!(read_buffers(&mut recorder), Err(RecorderError::RecordingInProgress));
    recorder.stop().unwrap();

    let channels = read_buffers(&mut recorder).unwrap();
    assert_eq!(channels[0], vec![0.25, 0.25, 0.25, 0.5, 0.5]);
    assert_eq!(channels[1], vec![-0.25, -0.25, -0.25, -0.5, -0.5]);

    recorder.clear().unwrap();
    assert_eq!(read_buffers(&mut recorder), Ok(vec![Vec::new(), Vec::new()]));
}

#[test]
fn get_buffers_rejected_while_an_export_is_pending() {
    let (spawner, finished) = silent_spawner();
    let (mut recorder, host) = setup_with(1, 16000, Some(spawner));
    recorder.start().unwrap();
    host.push(&[&[0.5; 32]]);
    recorder.stop().unwrap();

    let _pending = request(&mut recorder, ExportFormat::Compressed);
    finished.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(read_buffers(&mut recorder), Err(RecorderError::RecordingInProgress));
}

/// Host that re-blocks pushed interleaved frames the way a device backend
/// does, holding a partial quantum until flushed.
#[derive(Clone)]
struct AssemblingHost {
    assembler: Arc<Mutex<Option<QuantumAssembler>>>,
    callback: Arc<Mutex<Option<QuantumCallback>>>,
}

impl AssemblingHost {
    fn new() -> Self {
        Self {
            assembler: Arc::new(Mutex::new(None)),
            callback: Arc::new(Mutex::new(None)),
        }
    }

    fn feed(&self, interleaved: &[f32]) {
        let callback = self.callback.lock().clone();
        if let (Some(callback), Some(assembler)) = (callback, self.assembler.lock().as_mut()) {
            assembler.push_interleaved(interleaved, |quantum| callback(quantum));
        }
    }
}

impl AudioHost for AssemblingHost {
    fn probe(&mut self, config: &RecorderConfig) -> HostCapability {
        match QuantumAssembler::new(config.channel_count as usize, config.quantum_size) {
            Ok(assembler) => {
                *self.assembler.lock() = Some(assembler);
                HostCapability::Available(Box::new(self.clone()))
            }
            Err(e) => HostCapability::Unsupported(e.to_string()),
        }
    }
}

impl ProcessingNode for AssemblingHost {
    fn connect(&mut self, callback: QuantumCallback) -> Result<(), RecorderError> {
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        let callback = self.callback.lock().clone();
        if let (Some(callback), Some(assembler)) = (callback, self.assembler.lock().as_mut()) {
            assembler.flush(|quantum| callback(quantum));
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), RecorderError> {
        self.callback.lock().take();
        Ok(())
    }
}

#[test]
fn stop_delivers_the_partial_quantum() {
    let host = AssemblingHost::new();
    let mut recorder = CaptureOrchestrator::new(host.clone());
    recorder
        .configure(RecorderConfig {
            channel_count: 1,
            sample_rate: 16000,
            quantum_size: 4,
            ..Default::default()
        })
        .unwrap();

    recorder.start().unwrap();
    host.feed(&[0.5; 10]);
    assert_eq!(recorder.diagnostics().samples_captured, 8);
    recorder.stop().unwrap();
    assert_eq!(recorder.diagnostics().samples_captured, 10);

    let blob = export(&mut recorder, ExportFormat::Wav).unwrap();
    assert_eq!(blob.len(), 44 + 10 * 2);
    assert_eq!(read_buffers(&mut recorder).unwrap(), vec![vec![0.5; 10]]);
}

#[test]
fn export_after_stop_includes_every_captured_quantum() {
    let (mut recorder, host) = setup(1, 16000);
    let running = Arc::new(AtomicBool::new(true));
    let pusher = {
        let host = host.clone();
        let running = Arc::clone(&running);
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                host.push(&[&[0.5; 8]]);
            }
        })
    };

    for _ in 0..20 {
        let before = recorder.diagnostics().samples_captured;
        recorder.start().unwrap();
        thread::sleep(Duration::from_millis(2));
        recorder.stop().unwrap();
        let captured = recorder.diagnostics().samples_captured - before;

        match export(&mut recorder, ExportFormat::Wav) {
            Ok(blob) => assert_eq!(blob.len() as u64, 44 + 2 * captured),
            Err(e) => {
                assert_eq!(e, RecorderError::NoDataRecorded);
                assert_eq!(captured, 0);
            }
        }
        recorder.clear().unwrap();
    }

    running.store(false, Ordering::SeqCst);
    pusher.join().unwrap();
}

/// Panics on the first `encode` it ever sees; later instances behave like
/// `ChunkingTranscoder`.
struct FlakyTranscoder {
    responses: Sender<TranscoderResponse>,
    panics: bool,
}

impl Transcoder for FlakyTranscoder {
    fn post(&mut self, request: TranscoderRequest) -> Result<(), RecorderError> {
        match request {
            TranscoderRequest::Init { .. } => {}
            TranscoderRequest::Encode { buf } => {
                if self.panics {
                    panic!("encoder crashed");
                }
                let _ = self.responses.send(TranscoderResponse::Data {
                    buf: (buf.len() as u32).to_le_bytes().to_vec(),
                });
            }
            TranscoderRequest::Finish => {
                let _ = self.responses.send(TranscoderResponse::End { buf: None });
            }
        }
        Ok(())
    }
}

#[test]
fn crashed_transcoder_is_replaced_on_next_export() {
    let spawned = Arc::new(AtomicUsize::new(0));
    let spawner: TranscoderSpawner = {
        let spawned = Arc::clone(&spawned);
        Arc::new(move |responses: Sender<TranscoderResponse>| {
            let first = spawned.fetch_add(1, Ordering::SeqCst) == 0;
            Ok(Box::new(FlakyTranscoder {
                responses,
                panics: first,
            }) as Box<dyn Transcoder>)
        })
    };
    let (mut recorder, host) = setup_with(1, 16000, Some(spawner));
    recorder.start().unwrap();
    host.push(&[&[0.5; 32]]);
    recorder.stop().unwrap();

    assert!(matches!(
        export(&mut recorder, ExportFormat::Compressed),
        Err(RecorderError::TranscodeError(_))
    ));
    assert!(!recorder.has_pending_export());

    // Until the crashed bridge thread has fully exited an export may still
    // fail, but it must never stay pending.
    let deadline = Instant::now() + TIMEOUT;
    let blob = loop {
        match export(&mut recorder, ExportFormat::Compressed) {
            Ok(blob) => break blob,
            Err(RecorderError::TranscodeError(_)) if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(5));
            }
            Err(e) => panic!("compressed export did not recover: {:?}", e),
        }
    };
    assert_eq!(blob.bytes(), &32u32.to_le_bytes());
    assert_eq!(spawned.load(Ordering::SeqCst), 2);
    assert!(export(&mut recorder, ExportFormat::Wav).is_ok());
}
