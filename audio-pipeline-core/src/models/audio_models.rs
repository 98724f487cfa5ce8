use std::fmt;

use serde::{Deserialize, Serialize};

/// Channel count emitted by every backend. Capture is always mono.
pub const CHANNEL_COUNT: u16 = 1;

/// Width of one emitted sample (IEEE 754 single precision).
pub const BITS_PER_SAMPLE: u16 = 32;

/// Sample format of the blocks emitted by a session.
///
/// Published exactly once per session through the `format` event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
    pub channel_count: u16,
    pub bits_per_sample: u16,
    pub sample_rate_hz: f64,
    pub is_signed: bool,
    pub is_float: bool,
    /// Configured block size, passed through unchanged even when it is
    /// outside the supported range.
    pub block_size_frames: u32,
}

impl FormatDescriptor {
    pub fn new(sample_rate_hz: f64, block_size_frames: u32) -> Self {
        Self {
            channel_count: CHANNEL_COUNT,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_rate_hz,
            is_signed: true,
            is_float: true,
            block_size_frames,
        }
    }

    /// Wall-clock length of one block, or zero for a degenerate sample rate.
    pub fn block_duration_secs(&self) -> f64 {
        if self.sample_rate_hz <= 0.0 {
            return 0.0;
        }
        self.block_size_frames as f64 / self.sample_rate_hz
    }
}

/// One scheduling quantum of mono `f32` samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleBlock {
    samples: Vec<f32>,
}

impl SampleBlock {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// A zero-filled block of `frames` samples.
    pub fn silent(frames: usize) -> Self {
        Self {
            samples: vec![0.0; frames],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.samples
    }
}

impl From<Vec<f32>> for SampleBlock {
    fn from(samples: Vec<f32>) -> Self {
        Self::new(samples)
    }
}

impl From<&[f32]> for SampleBlock {
    fn from(samples: &[f32]) -> Self {
        Self::new(samples.to_vec())
    }
}

impl AsRef<[f32]> for SampleBlock {
    fn as_ref(&self) -> &[f32] {
        &self.samples
    }
}

/// Which backend currently feeds the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    None,
    Worklet,
    LegacyProcessor,
    Synthetic,
}

impl BackendKind {
    pub fn is_attached(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Worklet => "worklet",
            Self::LegacyProcessor => "legacy-processor",
            Self::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub attach_attempts: u64,
    pub fallbacks_taken: u64,
    pub contexts_substituted: u64,
    pub blocks_delivered: u64,
    pub samples_delivered: u64,
    /// Blocks that arrived while the session was paused.
    pub blocks_dropped_paused: u64,
    /// Blocks that arrived from a backend that was already detached.
    pub blocks_dropped_stale: u64,
}
