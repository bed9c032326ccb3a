use crate::models::error::RecorderError;

/// Largest channel count a quantum can carry.
pub const MAX_CHANNELS: usize = 2;

/// Re-blocks interleaved host buffers into fixed-size planar quanta.
///
/// Hosts deliver buffers of whatever size their driver prefers; the
/// pipeline expects `quantum_size` frames per channel per quantum. All
/// storage is allocated up front, so `push_interleaved` is safe to call
/// from a real-time audio callback.
#[derive(Debug)]
pub struct QuantumAssembler {
    planes: Vec<Vec<f32>>,
    filled: usize,
    quantum_size: usize,
}

impl QuantumAssembler {
    pub fn new(channels: usize, quantum_size: usize) -> Result<Self, RecorderError> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(RecorderError::InvalidConfiguration(format!(
                "unsupported channel count: {}",
                channels
            )));
        }
        if quantum_size == 0 {
            return Err(RecorderError::InvalidConfiguration(
                "quantum size must be positive".into(),
            ));
        }
        Ok(Self {
            planes: (0..channels).map(|_| vec![0.0; quantum_size]).collect(),
            filled: 0,
            quantum_size,
        })
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Frames buffered toward the next quantum.
    pub fn pending_frames(&self) -> usize {
        self.filled
    }

    /// Deinterleave `data` into the planes, calling `emit` once per completed
    /// quantum. A trailing partial frame is ignored.
    pub fn push_interleaved<F>(&mut self, data: &[f32], mut emit: F)
    where
        F: FnMut(&[&[f32]]),
    {
        let channels = self.planes.len();
        for frame in data.chunks_exact(channels) {
            for (plane, &sample) in self.planes.iter_mut().zip(frame) {
                plane[self.filled] = sample;
            }
            self.filled += 1;
            if self.filled == self.quantum_size {
                Self::emit_planes(&self.planes, self.quantum_size, &mut emit);
                self.filled = 0;
            }
        }
    }

    /// Emit whatever is buffered as a short final quantum.
    pub fn flush<F>(&mut self, mut emit: F)
    where
        F: FnMut(&[&[f32]]),
    {
        if self.filled > 0 {
            Self::emit_planes(&self.planes, self.filled, &mut emit);
            self.filled = 0;
        }
    }

    pub fn reset(&mut self) {
        self.filled = 0;
    }

    fn emit_planes<F>(planes: &[Vec<f32>], len: usize, emit: &mut F)
    where
        F: FnMut(&[&[f32]]),
    {
        let mut views: [&[f32]; MAX_CHANNELS] = [&[]; MAX_CHANNELS];
        for (view, plane) in views.iter_mut().zip(planes) {
            *view = &plane[..len];
        }
        emit(&views[..planes.len()]);
    }
}
