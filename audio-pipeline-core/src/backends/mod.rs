//! Capture backends.
//!
//! A backend turns a connected source node into a stream of `SampleBlock`s
//! delivered to a single `BlockSink`. Selection happens once per attach and
//! is expressed as the tagged `Backend` enum; the attached result is the
//! matching `AttachedBackend` variant. Attaching wires the graph but does
//! not deliver anything until `AttachedBackend::start` is called, so the
//! session can commit its state first.

pub mod legacy;
pub mod synthetic;
pub mod worklet;

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::models::audio_models::{BackendKind, SampleBlock};
use crate::models::error::{AttachError, ContextError, TeardownWarning};
use crate::models::media_source::MediaSource;
use crate::traits::audio_context::{AudioContextHandle, AudioNode, NodeTarget};

pub use legacy::{LegacyAttachment, LegacyProcessorBackend};
pub use synthetic::{SyntheticAttachment, SyntheticBackend};
pub use worklet::{WorkletAttachment, WorkletBackend};

/// Receives every block a backend produces, in production order.
pub type BlockSink = Arc<dyn Fn(SampleBlock) + Send + Sync + 'static>;

/// Backend selected for one attach attempt.
#[derive(Debug, Clone)]
pub enum Backend {
    Worklet(WorkletBackend),
    LegacyProcessor(LegacyProcessorBackend),
    Synthetic(SyntheticBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Worklet(_) => BackendKind::Worklet,
            Self::LegacyProcessor(_) => BackendKind::LegacyProcessor,
            Self::Synthetic(_) => BackendKind::Synthetic,
        }
    }

    pub async fn attach(
        &self,
        context: &Arc<dyn AudioContextHandle>,
        source_node: &Arc<dyn AudioNode>,
        source: &MediaSource,
        on_block: BlockSink,
    ) -> Result<AttachedBackend, AttachError> {
        match self {
            Self::Worklet(backend) => backend
                .attach(context, source_node, on_block)
                .await
                .map(AttachedBackend::Worklet),
            Self::LegacyProcessor(backend) => backend
                .attach(context, source_node, on_block)
                .map(AttachedBackend::LegacyProcessor),
            Self::Synthetic(backend) => Ok(AttachedBackend::Synthetic(backend.attach(
                context.sample_rate(),
                source,
                on_block,
            ))),
        }
    }
}

/// A backend wired into the graph.
pub enum AttachedBackend {
    Worklet(WorkletAttachment),
    LegacyProcessor(LegacyAttachment),
    Synthetic(SyntheticAttachment),
}

impl AttachedBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Worklet(_) => BackendKind::Worklet,
            Self::LegacyProcessor(_) => BackendKind::LegacyProcessor,
            Self::Synthetic(_) => BackendKind::Synthetic,
        }
    }

    /// Begin delivering blocks to the sink.
    pub fn start(&mut self, runtime: &Handle) {
        match self {
            Self::Worklet(attachment) => attachment.start(runtime),
            Self::LegacyProcessor(attachment) => attachment.start(),
            Self::Synthetic(attachment) => attachment.start(runtime),
        }
    }

    /// Stop delivery and disconnect the processing node. No block reaches the
    /// sink after this returns, even if disconnecting fails.
    pub fn detach(self) -> Result<(), TeardownWarning> {
        match self {
            Self::Worklet(attachment) => attachment.detach(),
            Self::LegacyProcessor(attachment) => attachment.detach(),
            Self::Synthetic(attachment) => {
                attachment.detach();
                Ok(())
            }
        }
    }
}

/// Connect `source → node → destination`.
///
/// The destination edge keeps the node scheduled on hosts that skip
/// unconnected nodes; it carries no meaningful audio.
pub(crate) fn wire_through(
    source_node: &Arc<dyn AudioNode>,
    node: &Arc<dyn AudioNode>,
) -> Result<(), ContextError> {
    source_node.connect(NodeTarget::Node(node.as_ref()))?;
    node.connect(NodeTarget::Destination)
}
