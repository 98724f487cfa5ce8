use std::sync::Arc;

use crate::backends::AttachedBackend;
use crate::models::audio_models::BackendKind;
use crate::models::error::{ContextError, TeardownWarning};
use crate::models::media_source::MediaSource;
use crate::traits::audio_context::{AudioContextHandle, AudioNode, ContextState};

/// An audio context plus whether this session is allowed to close it.
///
/// Ownership is fixed when the lease is created, never inferred from the
/// context itself.
#[derive(Clone)]
pub struct ContextLease {
    context: Arc<dyn AudioContextHandle>,
    owned: bool,
}

impl ContextLease {
    /// A context the session created and must close.
    pub fn owned(context: Arc<dyn AudioContextHandle>) -> Self {
        Self { context, owned: true }
    }

    /// A caller-supplied context: suspended at most, never closed.
    pub fn borrowed(context: Arc<dyn AudioContextHandle>) -> Self {
        Self {
            context,
            owned: false,
        }
    }

    pub fn context(&self) -> &Arc<dyn AudioContextHandle> {
        &self.context
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Close the context if this lease owns it and it is not already closed.
    ///
    /// Returns whether a close was performed.
    pub async fn close_owned_context(&self) -> Result<bool, ContextError> {
        if !self.owned {
            log::debug!("Leaving borrowed audio context open");
            return Ok(false);
        }
        if self.context.state() == ContextState::Closed {
            return Ok(false);
        }
        self.context.close().await?;
        Ok(true)
    }
}

/// Ordered acquire/release of the resources one session holds: the context
/// lease, every source adopted so far (and the current source's graph node),
/// and at most one attached backend.
pub struct ResourceLifecycle {
    lease: ContextLease,
    /// Sources whose tracks are stopped on release, in adoption order.
    sources: Vec<MediaSource>,
    source_node: Option<Arc<dyn AudioNode>>,
    backend: Option<AttachedBackend>,
}

impl ResourceLifecycle {
    pub fn new(lease: ContextLease) -> Self {
        Self {
            lease,
            sources: Vec::new(),
            source_node: None,
            backend: None,
        }
    }

    pub fn lease(&self) -> ContextLease {
        self.lease.clone()
    }

    pub fn context(&self) -> &Arc<dyn AudioContextHandle> {
        self.lease.context()
    }

    pub fn owns_context(&self) -> bool {
        self.lease.is_owned()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend
            .as_ref()
            .map_or(BackendKind::None, AttachedBackend::kind)
    }

    pub fn has_source_node(&self) -> bool {
        self.source_node.is_some()
    }

    /// Precondition for building processing nodes: the context must not be
    /// closed.
    pub fn ensure_context_open(&self) -> Result<(), ContextError> {
        match self.context().state() {
            ContextState::Closed => Err(ContextError::Closed),
            ContextState::Running | ContextState::Suspended => Ok(()),
        }
    }

    /// Swap in a fresh context after the current one was closed underneath us.
    ///
    /// Tears down all graph resources first; they belong to the old context.
    pub fn replace_context(&mut self, lease: ContextLease) {
        self.teardown();
        self.lease = lease;
    }

    /// Adopt a new source and its node, tearing down any previous graph.
    ///
    /// Replaced sources stay adopted; their tracks are only stopped by
    /// `release_tracks`, since a caller may attach the same source again.
    pub fn install_source(&mut self, source: MediaSource, node: Arc<dyn AudioNode>) {
        self.teardown();
        if !self.sources.iter().any(|adopted| adopted.id() == source.id()) {
            self.sources.push(source);
        }
        self.source_node = Some(node);
    }


    /// Adopt an attached backend. An existing backend is detached first so at
    /// most one processing node exists.
    pub fn install_backend(&mut self, backend: AttachedBackend) {
        if let Some(previous) = self.backend.take() {
            log::warn!(
                "Replacing {} backend that was still attached",
                previous.kind()
            );
            if let Err(warning) = previous.detach() {
                log::warn!("{}", warning);
            }
        }
        self.backend = Some(backend);
    }

    /// Disconnect the source node, then the backend's processing node.
    ///
    /// Idempotent. Failures are logged and collected; they never stop the
    /// remaining steps. The source itself is kept so its tracks can be
    /// released later.
    pub fn teardown(&mut self) -> Vec<TeardownWarning> {
        let mut warnings = Vec::new();

        if let Some(node) = self.source_node.take() {
            if let Err(error) = node.disconnect() {
                warnings.push(TeardownWarning::Disconnect {
                    node: "source node",
                    error,
                });
            }
        }

        if let Some(backend) = self.backend.take() {
            if let Err(warning) = backend.detach() {
                warnings.push(warning);
            }
        }

        for warning in &warnings {
            log::warn!("Teardown: {}", warning);
        }
        warnings
    }

    /// Stop the hardware tracks of every adopted source and forget them.
    pub fn release_tracks(&mut self) {
        for source in self.sources.drain(..) {
            source.stop_tracks();
        }
    }
}
