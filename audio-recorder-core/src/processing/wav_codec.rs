//! WAV container encode/decode.
//!
//! Encoding always produces a canonical 44-byte RIFF header followed by
//! interleaved signed 16-bit little-endian PCM. Decoding accepts any RIFF
//! file whose `fmt ` chunk comes first, skipping intervening chunks
//! (e.g. `LIST` metadata) until it finds `data`.

use crate::models::error::RecorderError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Bit depth of every container this codec writes.
pub const ENCODED_BITS_PER_SAMPLE: u16 = 16;

const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const WAVE_MAGIC: &[u8; 4] = b"WAVE";
const FMT_MAGIC: &[u8; 4] = b"fmt ";
const DATA_MAGIC: &[u8; 4] = b"data";

/// Decoded form of a WAV container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavDocument {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channel_count: u16,
    /// Raw interleaved PCM payload of the `data` chunk.
    pub interleaved_samples: Vec<u8>,
}

impl WavDocument {
    /// Number of complete frames in the payload.
    pub fn frame_count(&self) -> usize {
        let block_align = self.channel_count as usize * (self.bits_per_sample as usize / 8);
        if block_align == 0 {
            return 0;
        }
        self.interleaved_samples.len() / block_align
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Build the canonical 44-byte RIFF/WAVE header for PCM data.
///
/// Size fields saturate rather than wrap; `encode` rejects payloads that
/// would not fit.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let frame_bytes = u64::from(channels) * u64::from(bit_depth) / 8;
    let byte_rate = u32::try_from(u64::from(sample_rate) * frame_bytes).unwrap_or(u32::MAX);
    let block_align = u16::try_from(frame_bytes).unwrap_or(u16::MAX);
    let chunk_size = data_size.saturating_add(36);

    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(RIFF_MAGIC);
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(WAVE_MAGIC);

    header[12..16].copy_from_slice(FMT_MAGIC);
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    header[36..40].copy_from_slice(DATA_MAGIC);
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Quantize one float sample to signed 16-bit.
///
/// Negative values scale by 32768 and positive by 32767, so both -1.0 and
/// 1.0 land exactly on the i16 range ends.
pub fn float_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Encode interleaved float samples as a 16-bit PCM WAV container.
pub fn encode(sample_rate: u32, channel_count: u16, interleaved: &[f32]) -> Result<Vec<u8>, RecorderError> {
    let data_size = interleaved
        .len()
        .checked_mul(2)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| n.checked_add(36).is_some())
        .ok_or_else(|| {
            RecorderError::EncodingFailed(format!(
                "{} samples exceed the 32-bit RIFF size limit",
                interleaved.len()
            ))
        })?;

    let header = generate_wav_header(sample_rate, ENCODED_BITS_PER_SAMPLE, channel_count, data_size);

    let mut out = Vec::with_capacity(WAV_HEADER_SIZE + data_size as usize);
    out.extend_from_slice(&header);
    for &sample in interleaved {
        out.extend_from_slice(&float_to_i16(sample).to_le_bytes());
    }
    Ok(out)
}

/// Parse a WAV byte stream.
pub fn decode(bytes: &[u8]) -> Result<WavDocument, RecorderError> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(RecorderError::MalformedContainer(format!(
            "container is {} bytes, shorter than the {}-byte header",
            bytes.len(),
            WAV_HEADER_SIZE
        )));
    }
    if &bytes[0..4] != RIFF_MAGIC || &bytes[8..12] != WAVE_MAGIC {
        return Err(RecorderError::MalformedContainer("RIFF/WAVE header not found".into()));
    }
    if &bytes[12..16] != FMT_MAGIC {
        return Err(RecorderError::MalformedContainer("'fmt ' chunk not found".into()));
    }

    let fmt_size = read_u32(bytes, 16)? as usize;
    if fmt_size < 16 {
        return Err(RecorderError::MalformedContainer(format!(
            "'fmt ' chunk is {} bytes, expected at least 16",
            fmt_size
        )));
    }
    let channel_count = read_u16(bytes, 22)?;
    let sample_rate = read_u32(bytes, 24)?;
    let bits_per_sample = read_u16(bytes, 34)?;
    if channel_count == 0 {
        return Err(RecorderError::MalformedContainer("zero channels declared".into()));
    }

    let mut offset = padded(fmt_size)
        .and_then(|size| size.checked_add(20))
        .ok_or_else(|| RecorderError::MalformedContainer("'fmt ' chunk size overflows".into()))?;

    loop {
        let header_end = offset
            .checked_add(8)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| RecorderError::MalformedContainer("'data' chunk not found".into()))?;

        let chunk_id = &bytes[offset..offset + 4];
        let chunk_size = read_u32(bytes, offset + 4)? as usize;

        if chunk_id == DATA_MAGIC {
            let data_end = header_end
                .checked_add(chunk_size)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| {
                    RecorderError::MalformedContainer(format!(
                        "'data' chunk declares {} bytes but only {} remain",
                        chunk_size,
                        bytes.len() - header_end
                    ))
                })?;
            return Ok(WavDocument {
                sample_rate,
                bits_per_sample,
                channel_count,
                interleaved_samples: bytes[header_end..data_end].to_vec(),
            });
        }

        // RIFF chunks are padded to an even length.
        offset = padded(chunk_size)
            .and_then(|size| header_end.checked_add(size))
            .ok_or_else(|| RecorderError::MalformedContainer("chunk size overflows".into()))?;
    }
}

/// Convert raw little-endian PCM to normalized floats.
///
/// 16-bit samples are divided by 32768; a trailing odd byte is ignored.
/// 8-bit samples are unsigned, centered at 128 and divided by 128.
pub fn pcm_to_float(bytes: &[u8], bits_per_sample: u16) -> Result<Vec<f32>, RecorderError> {
    match bits_per_sample {
        16 => Ok(bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect()),
        8 => Ok(bytes.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect()),
        other => Err(RecorderError::UnsupportedSampleFormat(other)),
    }
}

/// Chunk payload length including the RIFF pad byte for odd sizes.
fn padded(size: usize) -> Option<usize> {
    size.checked_add(size & 1)
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, RecorderError> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| RecorderError::MalformedContainer(format!("read past end of buffer at offset {}", offset)))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, RecorderError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| RecorderError::MalformedContainer(format!("read past end of buffer at offset {}", offset)))
}
