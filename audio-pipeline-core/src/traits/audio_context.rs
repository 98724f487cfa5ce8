use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::error::{ContextError, ModuleError};
use crate::models::media_source::MediaSource;

/// Lifecycle state reported by an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

/// Callback invoked by a block-processing node with one quantum of input.
///
/// Fires on the context's rendering path; keep work minimal.
pub type ProcessorCallback = Arc<dyn Fn(&[f32]) + Send + Sync + 'static>;

/// Sending half of the worklet message channel. The worklet processor posts
/// one message per rendered block.
pub type WorkletPort = mpsc::UnboundedSender<Vec<f32>>;

/// Where a node's output is connected.
pub enum NodeTarget<'a> {
    Node(&'a dyn AudioNode),
    Destination,
}

/// A node in the context's processing graph.
pub trait AudioNode: Send + Sync {
    /// Human-readable label used in logs.
    fn label(&self) -> &str;

    fn connect(&self, target: NodeTarget<'_>) -> Result<(), ContextError>;

    /// Drop every outgoing connection of this node.
    fn disconnect(&self) -> Result<(), ContextError>;
}

/// Registration surface for processors running in the isolated rendering
/// context.
#[async_trait]
pub trait WorkletHost: Send + Sync {
    /// Load and register a processor module. Registering a module twice on
    /// the same context reports `ModuleError::AlreadyRegistered`.
    async fn add_module(&self, module: &str) -> Result<(), ModuleError>;

    /// Instantiate a registered processor whose blocks are posted to `port`.
    fn create_worklet_node(
        &self,
        processor: &str,
        port: WorkletPort,
    ) -> Result<Arc<dyn AudioNode>, ContextError>;
}

/// Handle to an audio context and its processing graph.
///
/// Implemented by platform glue (browser bindings, native hosts) and by
/// `SyntheticContext` for headless runs.
#[async_trait]
pub trait AudioContextHandle: Send + Sync {
    fn sample_rate(&self) -> f64;

    fn state(&self) -> ContextState;

    async fn resume(&self) -> Result<(), ContextError>;

    async fn suspend(&self) -> Result<(), ContextError>;

    async fn close(&self) -> Result<(), ContextError>;

    /// Wrap a live media source in a graph node.
    fn create_media_source(&self, source: &MediaSource) -> Result<Arc<dyn AudioNode>, ContextError>;

    /// Worklet support, or `None` when the runtime lacks it.
    fn worklet(&self) -> Option<Arc<dyn WorkletHost>>;

    /// Create a block-callback processing node.
    fn create_block_processor(
        &self,
        buffer_size_frames: u32,
        input_channels: u16,
        output_channels: u16,
        on_process: ProcessorCallback,
    ) -> Result<Arc<dyn AudioNode>, ContextError>;
}

/// Creates fresh audio contexts for sessions that own theirs.
pub trait ContextFactory: Send + Sync {
    fn create_context(&self) -> Result<Arc<dyn AudioContextHandle>, ContextError>;
}

impl<F> ContextFactory for F
where
    F: Fn() -> Result<Arc<dyn AudioContextHandle>, ContextError> + Send + Sync,
{
    fn create_context(&self) -> Result<Arc<dyn AudioContextHandle>, ContextError> {
        self()
    }
}
