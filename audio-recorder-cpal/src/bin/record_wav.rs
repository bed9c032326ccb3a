//! Record from an input device and save the export with a metadata sidecar.
//!
//! ```text
//! record-wav [--seconds N] [--device NAME] [--channels 1|2] [--rate HZ]
//!            [--compressed] [--list] <output-path>
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use audio_recorder_core::{save_export, CaptureOrchestrator, ExportFormat, RecorderConfig, RecorderError};
use audio_recorder_cpal::{CpalHost, DeviceSelector};

struct Options {
    seconds: u64,
    device: Option<String>,
    config: RecorderConfig,
    format: ExportFormat,
    list: bool,
    output: Option<PathBuf>,
}

fn parse_args() -> Result<Options, String> {
    let mut options = Options {
        seconds: 5,
        device: None,
        config: RecorderConfig::default(),
        format: ExportFormat::Wav,
        list: false,
        output: None,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seconds" => options.seconds = parse_value(&arg, args.next())?,
            "--channels" => options.config.channel_count = parse_value(&arg, args.next())?,
            "--rate" => options.config.sample_rate = parse_value(&arg, args.next())?,
            "--device" => options.device = Some(args.next().ok_or("--device needs a value")?),
            "--compressed" => options.format = ExportFormat::Compressed,
            "--list" => options.list = true,
            other if other.starts_with("--") => return Err(format!("unknown option {}", other)),
            path => options.output = Some(PathBuf::from(path)),
        }
    }
    Ok(options)
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{} needs a value", flag))?;
    value.parse().map_err(|_| format!("invalid value for {}: {}", flag, value))
}

fn record(options: Options) -> Result<(), RecorderError> {
    let output = options
        .output
        .ok_or_else(|| RecorderError::InvalidConfiguration("missing output path".into()))?;

    let host = CpalHost::with_device(DeviceSelector::from_name(options.device.as_deref()));
    let mut recorder = CaptureOrchestrator::new(host);
    recorder.configure(options.config)?;

    log::info!("recording for {} s", options.seconds);
    recorder.start()?;
    thread::sleep(Duration::from_secs(options.seconds));
    recorder.stop()?;

    let diagnostics = recorder.diagnostics();
    log::info!(
        "captured {} quanta ({} samples), dropped {}",
        diagnostics.quanta_captured,
        diagnostics.samples_captured,
        diagnostics.quanta_dropped
    );

    let (tx, rx) = crossbeam_channel::bounded(1);
    recorder.export_as(options.format, move |result| {
        let _ = tx.send(result);
    });
    let blob = rx
        .recv_timeout(Duration::from_secs(30))
        .map_err(|_| RecorderError::EncodingFailed("export did not complete".into()))??;
    recorder.close();

    let metadata = save_export(&blob, &output)?;
    println!("{} ({} bytes, sha256 {})", output.display(), metadata.byte_len, metadata.checksum);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("record-wav: {}", message);
            return ExitCode::from(2);
        }
    };

    if options.list {
        return match CpalHost::list_input_devices() {
            Ok(names) => {
                for name in names {
                    println!("{}", name);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("record-wav: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match record(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("recording failed: {}", e);
            eprintln!("record-wav: {}", e);
            ExitCode::FAILURE
        }
    }
}
