use super::config::RecorderConfig;

/// Ordered sample chunks for a single channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelBuffer {
    chunks: Vec<Vec<f32>>,
    sample_count: usize,
}

impl ChannelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk, taking ownership of its storage.
    pub fn push(&mut self, chunk: Vec<f32>) {
        self.sample_count += chunk.len();
        self.chunks.push(chunk);
    }

    /// Total samples across all chunks.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Concatenate chunks in arrival order into one flat array.
    pub fn merge(&self) -> Vec<f32> {
        let mut merged = Vec::with_capacity(self.sample_count);
        for chunk in &self.chunks {
            merged.extend_from_slice(chunk);
        }
        merged
    }
}

/// Mutable recording state owned by the aggregator.
///
/// Exactly one per pipeline. `clear` empties the buffers but keeps the
/// format configuration. The recording flag itself lives with the capture
/// callback, which is the only reader.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    pub channel_buffers: Vec<ChannelBuffer>,
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Per-channel frames recorded, advanced by channel 0's chunk length.
    pub total_sample_count: usize,
}

impl RecordingSession {
    pub fn new(config: &RecorderConfig) -> Self {
        Self {
            channel_buffers: (0..config.channel_count).map(|_| ChannelBuffer::new()).collect(),
            sample_rate: config.sample_rate,
            channel_count: config.channel_count,
            total_sample_count: 0,
        }
    }

    pub fn clear(&mut self) {
        self.channel_buffers = (0..self.channel_count).map(|_| ChannelBuffer::new()).collect();
        self.total_sample_count = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.total_sample_count == 0
    }

    /// Recorded duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_sample_count as f64 / self.sample_rate as f64
    }
}
