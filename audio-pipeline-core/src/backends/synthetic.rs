use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::BlockSink;
use crate::models::audio_models::SampleBlock;
use crate::models::media_source::MediaSource;

/// Tick period of the synthetic generator.
pub const SYNTHETIC_INTERVAL: Duration = Duration::from_millis(100);

/// Headless backend emitting zero-filled blocks on a timer.
///
/// Exercises the orchestration without hardware. Only reachable through a
/// headless environment.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    buffer_size_frames: u32,
    interval: Duration,
}

impl SyntheticBackend {
    pub fn new(buffer_size_frames: u32) -> Self {
        Self {
            buffer_size_frames,
            interval: SYNTHETIC_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn attach(
        &self,
        sample_rate_hz: f64,
        source: &MediaSource,
        on_block: BlockSink,
    ) -> SyntheticAttachment {
        let block_frames = self.buffer_size_frames as usize;
        let block_limit = source
            .length_frames(sample_rate_hz)
            .map(|frames| blocks_covering(frames, self.buffer_size_frames));

        SyntheticAttachment {
            block_frames,
            block_limit,
            interval: self.interval,
            on_block,
            cancel: CancellationToken::new(),
            started: false,
        }
    }
}

/// Blocks needed to cover `frames`, the last one possibly partial.
pub fn blocks_covering(frames: u64, block_frames: u32) -> u64 {
    if block_frames == 0 {
        return 0;
    }
    frames.div_ceil(block_frames as u64)
}

pub struct SyntheticAttachment {
    block_frames: usize,
    block_limit: Option<u64>,
    interval: Duration,
    on_block: BlockSink,
    cancel: CancellationToken,
    started: bool,
}

impl SyntheticAttachment {
    /// Blocks this attachment will emit before going quiet, if finite.
    pub fn block_limit(&self) -> Option<u64> {
        self.block_limit
    }

    pub fn start(&mut self, runtime: &Handle) {
        if self.started {
            return;
        }
        self.started = true;

        if self.block_frames == 0 {
            log::warn!("Synthetic backend configured with zero-frame blocks; emitting nothing");
            return;
        }

        let cancel = self.cancel.clone();
        let on_block = Arc::clone(&self.on_block);
        let block_frames = self.block_frames;
        let mut remaining = self.block_limit;
        let interval = self.interval;

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                if remaining == Some(0) {
                    log::debug!("Synthetic source exhausted");
                    break;
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                on_block(SampleBlock::silent(block_frames));
                if let Some(left) = remaining.as_mut() {
                    *left -= 1;
                }
            }
        });
    }

    pub fn detach(self) {
        self.cancel.cancel();
    }
}

impl Drop for SyntheticAttachment {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
