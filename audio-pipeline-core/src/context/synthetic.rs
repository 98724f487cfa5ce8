//! Headless audio context.
//!
//! Stands in for a real context when no audio hardware exists (CI, servers,
//! tests). It tracks its own running/suspended/closed state and hands out
//! inert source nodes; it has no worklet host and cannot build block
//! processors, so only the synthetic backend can run on it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::error::ContextError;
use crate::models::media_source::MediaSource;
use crate::traits::audio_context::{
    AudioContextHandle, AudioNode, ContextState, NodeTarget, ProcessorCallback, WorkletHost,
};

pub const DEFAULT_HEADLESS_SAMPLE_RATE_HZ: f64 = 48000.0;

#[derive(Debug)]
pub struct SyntheticContext {
    sample_rate_hz: f64,
    state: Mutex<ContextState>,
}

impl SyntheticContext {
    pub fn new(sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz,
            state: Mutex::new(ContextState::Running),
        }
    }
}

impl Default for SyntheticContext {
    fn default() -> Self {
        Self::new(DEFAULT_HEADLESS_SAMPLE_RATE_HZ)
    }
}

#[async_trait]
impl AudioContextHandle for SyntheticContext {
    fn sample_rate(&self) -> f64 {
        self.sample_rate_hz
    }

    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    async fn resume(&self) -> Result<(), ContextError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        *state = ContextState::Running;
        Ok(())
    }

    async fn suspend(&self) -> Result<(), ContextError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        *state = ContextState::Suspended;
        Ok(())
    }

    async fn close(&self) -> Result<(), ContextError> {
        *self.state.lock() = ContextState::Closed;
        Ok(())
    }

    fn create_media_source(&self, source: &MediaSource) -> Result<Arc<dyn AudioNode>, ContextError> {
        if self.state() == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        Ok(Arc::new(InertNode {
            label: format!("synthetic-source:{}", source.id()),
        }))
    }

    fn worklet(&self) -> Option<Arc<dyn WorkletHost>> {
        None
    }

    fn create_block_processor(
        &self,
        _buffer_size_frames: u32,
        _input_channels: u16,
        _output_channels: u16,
        _on_process: ProcessorCallback,
    ) -> Result<Arc<dyn AudioNode>, ContextError> {
        Err(ContextError::Unsupported(
            "headless context has no block processors".into(),
        ))
    }
}

/// Source node with no graph behind it.
struct InertNode {
    label: String,
}

impl AudioNode for InertNode {
    fn label(&self) -> &str {
        &self.label
    }

    fn connect(&self, _target: NodeTarget<'_>) -> Result<(), ContextError> {
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ContextError> {
        Ok(())
    }
}
