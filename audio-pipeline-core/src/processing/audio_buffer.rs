/// Planar PCM buffer, shaped like the host platform's audio buffer type.
///
/// Produced by `render_to_buffer` for consumers that want captured samples
/// as a playable buffer instead of a stream of blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate_hz: f64,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Silent buffer with `channel_count` channels of `length` frames each.
    pub fn new(channel_count: usize, length: usize, sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz,
            channels: vec![vec![0.0; length]; channel_count],
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn length(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Duration in seconds. Zero when the sample rate is not positive.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate_hz <= 0.0 {
            return 0.0;
        }
        self.length() as f64 / self.sample_rate_hz
    }

    pub fn channel_data(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    pub fn channel_data_mut(&mut self, channel: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(channel).map(Vec::as_mut_slice)
    }
}

/// Copy mono samples into a single-channel `AudioBuffer` at `sample_rate_hz`.
///
/// Pure: the input is copied, never resampled.
pub fn render_to_buffer(samples: &[f32], sample_rate_hz: f64) -> AudioBuffer {
    let mut buffer = AudioBuffer::new(1, samples.len(), sample_rate_hz);
    if let Some(channel) = buffer.channel_data_mut(0) {
        channel.copy_from_slice(samples);
    }
    buffer
}
