use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{wire_through, BlockSink};
use crate::models::audio_models::SampleBlock;
use crate::models::error::{AttachError, TeardownWarning};
use crate::traits::audio_context::{AudioContextHandle, AudioNode, ProcessorCallback};

/// Deprecated block-callback processor (ScriptProcessor style).
///
/// Only used as the worklet fallback or when explicitly forced. The node has
/// one input and one output channel; the output is connected to the
/// destination purely so the host keeps calling it.
#[derive(Debug, Clone)]
pub struct LegacyProcessorBackend {
    buffer_size_frames: u32,
}

impl LegacyProcessorBackend {
    pub fn new(buffer_size_frames: u32) -> Self {
        Self { buffer_size_frames }
    }

    pub fn buffer_size_frames(&self) -> u32 {
        self.buffer_size_frames
    }

    /// Build and wire the processor node.
    ///
    /// Callers must check the context is not closed first; a processor built
    /// on a closed context never fires.
    pub fn attach(
        &self,
        context: &Arc<dyn AudioContextHandle>,
        source_node: &Arc<dyn AudioNode>,
        on_block: BlockSink,
    ) -> Result<LegacyAttachment, AttachError> {
        let live = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&live);
        let callback: ProcessorCallback = Arc::new(move |input: &[f32]| {
            if gate.load(Ordering::Acquire) {
                on_block(SampleBlock::from(input));
            }
        });

        let node = context
            .create_block_processor(self.buffer_size_frames, 1, 1, callback)
            .map_err(AttachError::NodeCreationFailed)?;

        if let Err(e) = wire_through(source_node, &node) {
            if let Err(disconnect_err) = node.disconnect() {
                log::warn!("Failed to disconnect half-wired processor node: {}", disconnect_err);
            }
            return Err(AttachError::NodeCreationFailed(e));
        }

        Ok(LegacyAttachment { node, live })
    }
}

pub struct LegacyAttachment {
    node: Arc<dyn AudioNode>,
    live: Arc<AtomicBool>,
}

impl LegacyAttachment {
    pub fn node(&self) -> &Arc<dyn AudioNode> {
        &self.node
    }

    pub fn start(&mut self) {
        self.live.store(true, Ordering::Release);
    }

    pub fn detach(self) -> Result<(), TeardownWarning> {
        self.live.store(false, Ordering::Release);
        self.node
            .disconnect()
            .map_err(|error| TeardownWarning::Disconnect {
                node: "processor node",
                error,
            })
    }
}

impl Drop for LegacyAttachment {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
    }
}
