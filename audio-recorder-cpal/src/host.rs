//! cpal input backend.
//!
//! Opens an f32 input stream on the selected device and re-blocks whatever
//! buffer sizes the driver delivers into fixed quanta before handing them to
//! the recorder.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use audio_recorder_core::{
    AudioHost, HostCapability, ProcessingNode, QuantumAssembler, QuantumCallback, RecorderConfig, RecorderError,
};

use crate::device_selector::{is_filtered_device, DeviceSelector};
use crate::error::CpalHostError;

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched through the owning node's Mutex, and
/// only to be dropped.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// `AudioHost` backed by the platform's default cpal host.
pub struct CpalHost {
    selector: DeviceSelector,
}

impl CpalHost {
    pub fn default_device() -> Self {
        Self {
            selector: DeviceSelector::Default,
        }
    }

    pub fn with_device(selector: DeviceSelector) -> Self {
        Self { selector }
    }

    /// Names of the input devices worth recording from.
    pub fn list_input_devices() -> Result<Vec<String>, CpalHostError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CpalHostError::Enumeration(e.to_string()))?;
        Ok(devices
            .filter_map(|device| device.name().ok())
            .filter(|name| !is_filtered_device(name))
            .collect())
    }

    fn find_device(&self) -> Result<cpal::Device, CpalHostError> {
        let host = cpal::default_host();
        match &self.selector {
            DeviceSelector::Default => host
                .default_input_device()
                .ok_or_else(|| CpalHostError::DeviceNotFound("default".into())),
            selector => {
                let mut devices = host
                    .input_devices()
                    .map_err(|e| CpalHostError::Enumeration(e.to_string()))?;
                devices
                    .find(|device| device.name().map(|name| selector.matches(&name)).unwrap_or(false))
                    .ok_or_else(|| CpalHostError::DeviceNotFound(selector.describe().to_string()))
            }
        }
    }

    fn open(&self, config: &RecorderConfig) -> Result<CpalNode, CpalHostError> {
        let device = self.find_device()?;
        let rate = cpal::SampleRate(config.sample_rate);

        let supported = device
            .supported_input_configs()
            .map_err(|e| CpalHostError::Enumeration(e.to_string()))?
            .any(|range| {
                range.channels() == config.channel_count
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            });
        if !supported {
            return Err(CpalHostError::NoMatchingConfig {
                channels: config.channel_count,
                sample_rate: config.sample_rate,
            });
        }

        let assembler = QuantumAssembler::new(config.channel_count as usize, config.quantum_size)
            .map_err(|e| CpalHostError::InvalidConfig(e.to_string()))?;

        log::info!(
            "opened input device {} ({} ch, {} Hz)",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            config.channel_count,
            config.sample_rate
        );

        Ok(CpalNode {
            device,
            stream_config: cpal::StreamConfig {
                channels: config.channel_count,
                sample_rate: rate,
                buffer_size: cpal::BufferSize::Default,
            },
            assembler: Arc::new(Mutex::new(assembler)),
            stream: None,
            callback: None,
        })
    }
}

impl AudioHost for CpalHost {
    fn probe(&mut self, config: &RecorderConfig) -> HostCapability {
        match self.open(config) {
            Ok(node) => HostCapability::Available(Box::new(node)),
            Err(e) => {
                log::warn!("cpal input unavailable: {}", e);
                HostCapability::Unsupported(e.to_string())
            }
        }
    }
}

/// A running (or ready to run) cpal input stream.
pub struct CpalNode {
    device: cpal::Device,
    stream_config: cpal::StreamConfig,
    assembler: Arc<Mutex<QuantumAssembler>>,
    stream: Option<SendableStream>,
    callback: Option<QuantumCallback>,
}

impl ProcessingNode for CpalNode {
    fn connect(&mut self, callback: QuantumCallback) -> Result<(), RecorderError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.assembler.lock().reset();

        let assembler = Arc::clone(&self.assembler);
        let on_quantum = Arc::clone(&callback);
        let stream = self
            .device
            .build_input_stream(
                &self.stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.lock().push_interleaved(data, |quantum| on_quantum(quantum));
                },
                |err| log::error!("input stream error: {}", err),
                None,
            )
            .map_err(|e| CpalHostError::BuildStream(e.to_string()))?;
        stream.play().map_err(|e| CpalHostError::PlayStream(e.to_string()))?;

        self.stream = Some(SendableStream(stream));
        self.callback = Some(callback);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        if let Some(callback) = &self.callback {
            self.assembler.lock().flush(|quantum| callback(quantum));
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), RecorderError> {
        self.callback = None;
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        let paused = stream.0.pause();
        drop(stream);
        self.assembler.lock().reset();
        paused.map_err(|e| RecorderError::IoError(format!("failed to pause input stream: {}", e)))
    }
}
