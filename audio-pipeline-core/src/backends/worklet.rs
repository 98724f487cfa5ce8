use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{wire_through, BlockSink};
use crate::models::audio_models::SampleBlock;
use crate::models::error::{AttachError, ModuleError, TeardownWarning};
use crate::traits::audio_context::{AudioContextHandle, AudioNode};

/// Module that defines the block-forwarding processor.
pub const WORKLET_MODULE: &str = "capture-block-forwarder.js";

/// Name the processor registers itself under.
pub const WORKLET_PROCESSOR: &str = "capture-block-forwarder";

/// Worklet backend: a processor in the rendering context posts each block
/// over a message channel; a pump task forwards messages to the sink.
#[derive(Debug, Clone, Default)]
pub struct WorkletBackend;

impl WorkletBackend {
    pub fn new() -> Self {
        Self
    }

    pub async fn attach(
        &self,
        context: &Arc<dyn AudioContextHandle>,
        source_node: &Arc<dyn AudioNode>,
        on_block: BlockSink,
    ) -> Result<WorkletAttachment, AttachError> {
        let host = context.worklet().ok_or(AttachError::WorkletUnavailable)?;

        match host.add_module(WORKLET_MODULE).await {
            Ok(()) => {}
            Err(ModuleError::AlreadyRegistered) => {
                log::debug!("Worklet module {} already registered on this context", WORKLET_MODULE);
            }
            Err(ModuleError::Failed(reason)) => {
                return Err(AttachError::ModuleRegistrationFailed(reason));
            }
        }

        let (port, inbox) = mpsc::unbounded_channel();
        let node = host
            .create_worklet_node(WORKLET_PROCESSOR, port)
            .map_err(AttachError::NodeCreationFailed)?;

        if let Err(e) = wire_through(source_node, &node) {
            if let Err(disconnect_err) = node.disconnect() {
                log::warn!("Failed to disconnect half-wired worklet node: {}", disconnect_err);
            }
            return Err(AttachError::NodeCreationFailed(e));
        }

        Ok(WorkletAttachment {
            node,
            inbox: Some(inbox),
            on_block,
            cancel: CancellationToken::new(),
        })
    }
}

pub struct WorkletAttachment {
    node: Arc<dyn AudioNode>,
    inbox: Option<mpsc::UnboundedReceiver<Vec<f32>>>,
    on_block: BlockSink,
    cancel: CancellationToken,
}

impl WorkletAttachment {
    pub fn node(&self) -> &Arc<dyn AudioNode> {
        &self.node
    }

    /// Spawn the pump. Messages posted before this point are kept in the
    /// channel and delivered first.
    pub fn start(&mut self, runtime: &Handle) {
        let Some(mut inbox) = self.inbox.take() else {
            return;
        };
        let cancel = self.cancel.clone();
        let on_block = Arc::clone(&self.on_block);

        runtime.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    message = inbox.recv() => match message {
                        Some(samples) => on_block(SampleBlock::new(samples)),
                        None => break,
                    },
                }
            }
        });
    }

    pub fn detach(self) -> Result<(), TeardownWarning> {
        self.cancel.cancel();
        self.node
            .disconnect()
            .map_err(|error| TeardownWarning::Disconnect {
                node: "worklet node",
                error,
            })
    }
}

impl Drop for WorkletAttachment {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
