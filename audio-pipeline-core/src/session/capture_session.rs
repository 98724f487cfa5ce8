use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backends::{
    AttachedBackend, Backend, BlockSink, LegacyProcessorBackend, SyntheticBackend, WorkletBackend,
};
use crate::events::event_bus::{EventBus, SubscriptionId};
use crate::models::audio_models::{BackendKind, FormatDescriptor, SampleBlock, SessionDiagnostics};
use crate::models::config::CaptureConfiguration;
use crate::models::error::{AttachError, CaptureError, TeardownWarning};
use crate::models::events::{ErrorCause, EventKind, SessionEvent};
use crate::models::media_source::MediaSource;
use crate::models::state::CaptureState;
use crate::processing::audio_buffer::{self, AudioBuffer};
use crate::session::environment::Environment;
use crate::session::lifecycle::{ContextLease, ResourceLifecycle};
use crate::traits::audio_context::{AudioContextHandle, AudioNode, ContextState};
use crate::traits::session_observer::SessionObserver;

/// Mutable session state, protected by `parking_lot::Mutex`.
///
/// Never held across an `.await`.
struct SessionCore {
    state: CaptureState,
    /// Bumped whenever the current attachment ends or a new one begins.
    /// Block sinks carry the epoch they were created for and drop blocks
    /// from any other epoch.
    epoch: u64,
    lifecycle: ResourceLifecycle,
    pending_suspend: Option<JoinHandle<()>>,
    diagnostics: SessionDiagnostics,
}

struct SessionInner {
    id: Uuid,
    environment: Environment,
    buffer_size_frames: u32,
    allow_legacy_fallback: bool,
    use_buffered_samples: bool,
    events: EventBus,
    core: Mutex<SessionCore>,
}

impl SessionInner {
    fn deliver(&self, epoch: u64, block: SampleBlock) {
        {
            let mut core = self.core.lock();
            if core.epoch != epoch {
                core.diagnostics.blocks_dropped_stale += 1;
                return;
            }
            match core.state {
                CaptureState::Active => {
                    core.diagnostics.blocks_delivered += 1;
                    core.diagnostics.samples_delivered += block.len() as u64;
                }
                CaptureState::Paused => {
                    core.diagnostics.blocks_dropped_paused += 1;
                    return;
                }
                _ => {
                    core.diagnostics.blocks_dropped_stale += 1;
                    return;
                }
            }
        }
        self.events.publish(SessionEvent::Data(block));
    }

    fn flush_format(&self) {
        let sample_rate_hz = self.core.lock().lifecycle.context().sample_rate();
        let block_size_frames = self.buffer_size_frames;
        if self
            .events
            .publish_format_once(|| FormatDescriptor::new(sample_rate_hz, block_size_frames))
        {
            log::debug!(
                "[{}] Format published: {} Hz, {} frames per block",
                self.id,
                sample_rate_hz,
                block_size_frames
            );
        }
    }
}

/// Capture pipeline orchestrator.
///
/// Owns one audio context lease, selects a backend for each supplied media
/// source (worklet first, legacy processor as fallback, synthetic when
/// headless) and fans captured blocks out through its `EventBus`.
///
/// ```text
/// [MediaSource] → [source node] → [Worklet | LegacyProcessor | Synthetic]
///                                              │ on_block
///                                              ↓
///                                 [epoch + state gate] → EventBus "data"
/// ```
///
/// Cloning yields another handle to the same session. Must be driven from a
/// tokio runtime; the cooperative current-thread flavour matches its
/// scheduling model exactly.
#[derive(Clone)]
pub struct CaptureSession {
    inner: Arc<SessionInner>,
}

impl CaptureSession {
    /// Create a session in `Idle`.
    ///
    /// Uses `config.shared_context` (borrowed) when present, otherwise creates
    /// and owns a context from `environment`. The `format` event is published
    /// from a spawned task, so subscribers added right after this returns
    /// still receive it.
    pub fn new(environment: Environment, mut config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        if let Some(warning) = config.buffer_size_warning() {
            log::warn!("{}", warning);
        }

        let runtime = Handle::try_current().ok();
        if config.media_source.is_some() && runtime.is_none() {
            return Err(CaptureError::ConfigurationFailed(
                "a media source in the configuration needs a running tokio runtime".into(),
            ));
        }

        let lease = match config.shared_context.take() {
            Some(context) => ContextLease::borrowed(context),
            None => ContextLease::owned(environment.create_context()?),
        };

        let id = Uuid::new_v4();
        log::debug!(
            "[{}] Capture session created ({:?}, {} context, {} frames per block)",
            id,
            environment,
            if lease.is_owned() { "owned" } else { "borrowed" },
            config.buffer_size_frames
        );

        let session = Self {
            inner: Arc::new(SessionInner {
                id,
                environment,
                buffer_size_frames: config.buffer_size_frames,
                allow_legacy_fallback: config.allow_legacy_fallback,
                use_buffered_samples: config.use_buffered_samples,
                events: EventBus::new(),
                core: Mutex::new(SessionCore {
                    state: CaptureState::Idle,
                    epoch: 0,
                    lifecycle: ResourceLifecycle::new(lease),
                    pending_suspend: None,
                    diagnostics: SessionDiagnostics::default(),
                }),
            }),
        };

        match runtime {
            Some(runtime) => session.spawn_deferred_start(&runtime, config.media_source.take()),
            None => log::debug!("[{}] No runtime yet; format will be published on first attach", id),
        }

        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> CaptureState {
        self.inner.core.lock().state
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    /// Backend feeding the session; `None` unless Active or Paused.
    pub fn backend_kind(&self) -> BackendKind {
        let core = self.inner.core.lock();
        if core.state.is_attached() {
            core.lifecycle.backend_kind()
        } else {
            BackendKind::None
        }
    }

    pub fn buffer_size_frames(&self) -> u32 {
        self.inner.buffer_size_frames
    }

    pub fn allow_legacy_fallback(&self) -> bool {
        self.inner.allow_legacy_fallback
    }

    /// The format already published on this session, if any.
    pub fn format(&self) -> Option<FormatDescriptor> {
        self.inner.events.format()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.inner.core.lock().diagnostics.clone()
    }

    /// The context currently leased by this session.
    pub fn context(&self) -> Arc<dyn AudioContextHandle> {
        Arc::clone(self.inner.core.lock().lifecycle.context())
    }

    pub fn owns_context(&self) -> bool {
        self.inner.core.lock().lifecycle.owns_context()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(kind, id)
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) -> Vec<SubscriptionId> {
        self.inner.events.add_observer(observer)
    }

    /// Wrap captured samples in a mono buffer. No session state involved.
    pub fn render_to_buffer(samples: &[f32], sample_rate_hz: f64) -> AudioBuffer {
        audio_buffer::render_to_buffer(samples, sample_rate_hz)
    }

    /// Connect `source` through a backend and start emitting `data` events.
    ///
    /// Transitions: idle/stopped → attaching → active. Calling this while
    /// Active or Paused replaces the current attachment. Failures are
    /// returned and also published as `error` events.
    pub async fn attach_source(&self, source: MediaSource) -> Result<(), AttachError> {
        self.inner.flush_format();
        let result = self.run_attach(source).await;
        if let Err(ref error) = result {
            self.report_attach_failure(error);
        }
        result
    }

    /// Stop forwarding blocks without tearing anything down.
    /// Transitions: active → paused. Idempotent.
    pub fn pause(&self) {
        let mut core = self.inner.core.lock();
        match core.state {
            CaptureState::Active => {
                core.state = CaptureState::Paused;
                log::debug!("[{}] Paused", self.inner.id);
            }
            CaptureState::Paused => {}
            other => log::debug!("[{}] pause() ignored while {}", self.inner.id, other),
        }
    }

    /// Transitions: paused → active. Blocks produced while paused are gone.
    pub fn resume(&self) {
        let mut core = self.inner.core.lock();
        match core.state {
            CaptureState::Paused => {
                core.state = CaptureState::Active;
                log::debug!("[{}] Resumed", self.inner.id);
            }
            CaptureState::Active => {}
            other => log::debug!("[{}] resume() ignored while {}", self.inner.id, other),
        }
    }

    /// Tear down the backend and source node and suspend the context.
    ///
    /// Transitions: active/paused → stopped. Returns immediately; the suspend
    /// runs on a spawned task and a failure is published as an `error` event.
    pub fn stop(&self) {
        let mut core = self.inner.core.lock();
        match core.state {
            CaptureState::Active | CaptureState::Paused => {}
            CaptureState::Attaching => {
                log::warn!(
                    "[{}] stop() ignored while an attach is in flight; wait for it to settle",
                    self.inner.id
                );
                return;
            }
            other => {
                log::debug!("[{}] stop() ignored while {}", self.inner.id, other);
                return;
            }
        }
        core.epoch += 1;
        core.lifecycle.teardown();
        core.state = CaptureState::Stopped;
        log::debug!("[{}] Stopped", self.inner.id);

        let lease = core.lifecycle.lease();
        if lease.context().state() != ContextState::Running {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            log::warn!(
                "[{}] No tokio runtime; audio context left running after stop",
                self.inner.id
            );
            return;
        };

        // Stored before the lock is released so the next attach always waits on it.
        let weak = Arc::downgrade(&self.inner);
        core.pending_suspend = Some(runtime.spawn(async move {
            if let Err(e) = lease.context().suspend().await {
                log::warn!("Failed to suspend audio context after stop: {}", e);
                if let Some(inner) = weak.upgrade() {
                    inner.events.publish_error(
                        format!("failed to suspend audio context after stop: {}", e),
                        ErrorCause::Context(e),
                    );
                }
            }
        }));
    }

    /// Release everything: processing nodes, source node, media tracks and,
    /// if owned, the context. Emits `close` as the final event.
    ///
    /// Transitions: any → destroyed (terminal). Idempotent. Teardown failures
    /// are logged only.
    pub fn destroy(&self) {
        let (lease, pending_suspend) = {
            let mut core = self.inner.core.lock();
            if core.state == CaptureState::Destroyed {
                return;
            }
            core.epoch += 1;
            core.lifecycle.teardown();
            core.lifecycle.release_tracks();
            core.state = CaptureState::Destroyed;
            (core.lifecycle.lease(), core.pending_suspend.take())
        };
        log::debug!("[{}] Destroyed", self.inner.id);

        if lease.is_owned() {
            match Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        if let Some(suspend) = pending_suspend {
                            let _ = suspend.await;
                        }
                        if let Err(e) = lease.close_owned_context().await {
                            log::warn!("{}", TeardownWarning::Close(e));
                        }
                    });
                }
                Err(_) => log::warn!(
                    "[{}] No tokio runtime; owned audio context was not closed",
                    self.inner.id
                ),
            }
        }

        // A session destroyed before its deferred start still reports format first.
        self.inner.flush_format();
        self.inner.events.close();
    }

    // --- Internal helpers ---

    fn spawn_deferred_start(&self, runtime: &Handle, source: Option<MediaSource>) {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        runtime.spawn(async move {
            tokio::task::yield_now().await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.flush_format();
            if let Some(source) = source {
                let session = CaptureSession { inner };
                if let Err(e) = session.attach_source(source).await {
                    log::warn!("[{}] Configured media source failed to attach: {}", session.id(), e);
                }
            }
        });
    }

    async fn run_attach(&self, source: MediaSource) -> Result<(), AttachError> {
        let runtime = Handle::try_current().map_err(|_| AttachError::NoRuntime)?;
        let (epoch, pending_suspend) = self.begin_attach()?;

        if let Some(suspend) = pending_suspend {
            if let Err(e) = suspend.await {
                log::warn!("[{}] Suspend task ended abnormally: {}", self.inner.id, e);
            }
        }

        let attempted = source.clone();
        let result = match self.connect_pipeline(epoch, source).await {
            Ok(backend) => self.commit_attach(epoch, backend, &runtime),
            Err(error) => {
                self.abort_attach(epoch);
                Err(error)
            }
        };

        // An attach that lost to destroy() reports Destroyed, whatever step it
        // failed at, and releases a source destroy() never adopted.
        if result.is_err() && self.state() == CaptureState::Destroyed {
            attempted.stop_tracks();
            return Err(AttachError::Destroyed);
        }
        result
    }

    /// Claim the session for one attach. Returns the new epoch and any
    /// suspend still running from a previous stop.
    fn begin_attach(&self) -> Result<(u64, Option<JoinHandle<()>>), AttachError> {
        let mut core = self.inner.core.lock();
        match core.state {
            CaptureState::Destroyed => return Err(AttachError::Destroyed),
            CaptureState::Attaching => return Err(AttachError::AttachInProgress),
            CaptureState::Active | CaptureState::Paused => {
                log::debug!(
                    "[{}] Replacing {} attachment with a new source",
                    self.inner.id,
                    core.lifecycle.backend_kind()
                );
                core.lifecycle.teardown();
            }
            CaptureState::Idle | CaptureState::Stopped => {}
        }
        core.epoch += 1;
        core.state = CaptureState::Attaching;
        core.diagnostics.attach_attempts += 1;
        Ok((core.epoch, core.pending_suspend.take()))
    }

    async fn connect_pipeline(&self, epoch: u64, source: MediaSource) -> Result<AttachedBackend, AttachError> {
        let context = self.usable_context().await?;
        self.ensure_current(epoch)?;

        let source_node = context
            .create_media_source(&source)
            .map_err(|e| AttachError::SourceAcquisitionFailed(e.to_string()))?;
        {
            let mut core = self.inner.core.lock();
            if core.epoch != epoch {
                drop(core);
                if let Err(e) = source_node.disconnect() {
                    log::warn!("Failed to disconnect abandoned source node: {}", e);
                }
                return Err(AttachError::Destroyed);
            }
            core.lifecycle.install_source(source.clone(), Arc::clone(&source_node));
        }

        let sink = self.block_sink(epoch);
        self.attach_backend(&context, &source_node, &source, sink).await
    }

    /// The leased context, replaced if it was closed and resumed if suspended.
    async fn usable_context(&self) -> Result<Arc<dyn AudioContextHandle>, AttachError> {
        let context = {
            let mut core = self.inner.core.lock();
            if core.lifecycle.context().state() == ContextState::Closed {
                let fresh = self
                    .inner
                    .environment
                    .create_context()
                    .map_err(AttachError::ContextUnavailable)?;
                log::info!(
                    "[{}] Audio context was closed; substituting a fresh one",
                    self.inner.id
                );
                core.lifecycle.replace_context(ContextLease::owned(fresh));
                core.diagnostics.contexts_substituted += 1;
            }
            Arc::clone(core.lifecycle.context())
        };

        if context.state() == ContextState::Suspended {
            context.resume().await.map_err(AttachError::ResumeFailed)?;
        }
        Ok(context)
    }

    /// Backend choice and fallback policy.
    async fn attach_backend(
        &self,
        context: &Arc<dyn AudioContextHandle>,
        source_node: &Arc<dyn AudioNode>,
        source: &MediaSource,
        sink: BlockSink,
    ) -> Result<AttachedBackend, AttachError> {
        let primary = self.primary_backend();
        log::debug!("[{}] Attaching {} backend", self.inner.id, primary.kind());

        if let Backend::LegacyProcessor(_) = primary {
            self.ensure_context_open()?;
        }

        let cause = match primary.attach(context, source_node, source, Arc::clone(&sink)).await {
            Ok(attached) => return Ok(attached),
            Err(cause) => cause,
        };

        match primary {
            Backend::Worklet(_) if self.inner.allow_legacy_fallback => {
                log::warn!(
                    "[{}] AudioWorklet capture unavailable ({}); falling back to legacy ScriptProcessor",
                    self.inner.id,
                    cause
                );
                self.inner.core.lock().diagnostics.fallbacks_taken += 1;
                self.ensure_context_open()?;
                let legacy = Backend::LegacyProcessor(LegacyProcessorBackend::new(self.inner.buffer_size_frames));
                legacy.attach(context, source_node, source, sink).await
            }
            Backend::Worklet(_) => Err(AttachError::FallbackDisabled(Box::new(cause))),
            Backend::LegacyProcessor(_) | Backend::Synthetic(_) => Err(cause),
        }
    }

    fn primary_backend(&self) -> Backend {
        let frames = self.inner.buffer_size_frames;
        match (&self.inner.environment, self.inner.use_buffered_samples) {
            (Environment::Headless { .. }, _) => Backend::Synthetic(SyntheticBackend::new(frames)),
            (Environment::Hardware(_), true) => {
                Backend::LegacyProcessor(LegacyProcessorBackend::new(frames))
            }
            (Environment::Hardware(_), false) => Backend::Worklet(WorkletBackend::new()),
        }
    }

    fn ensure_context_open(&self) -> Result<(), AttachError> {
        self.inner
            .core
            .lock()
            .lifecycle
            .ensure_context_open()
            .map_err(AttachError::ContextUnavailable)
    }

    fn ensure_current(&self, epoch: u64) -> Result<(), AttachError> {
        if self.inner.core.lock().epoch == epoch {
            Ok(())
        } else {
            Err(AttachError::Destroyed)
        }
    }

    fn commit_attach(
        &self,
        epoch: u64,
        mut backend: AttachedBackend,
        runtime: &Handle,
    ) -> Result<(), AttachError> {
        let mut core = self.inner.core.lock();
        if core.epoch != epoch || core.state != CaptureState::Attaching {
            drop(core);
            if let Err(warning) = backend.detach() {
                log::warn!("{}", warning);
            }
            return Err(AttachError::Destroyed);
        }

        let kind = backend.kind();
        backend.start(runtime);
        core.lifecycle.install_backend(backend);
        core.state = CaptureState::Active;
        drop(core);

        log::info!("[{}] Capturing via {} backend", self.inner.id, kind);
        Ok(())
    }

    /// Return to Idle after a failed attach, releasing the partial graph.
    fn abort_attach(&self, epoch: u64) {
        let mut core = self.inner.core.lock();
        if core.epoch != epoch || core.state != CaptureState::Attaching {
            return;
        }
        core.epoch += 1;
        core.lifecycle.teardown();
        core.state = CaptureState::Idle;
    }

    fn block_sink(&self, epoch: u64) -> BlockSink {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move |block: SampleBlock| {
            if let Some(inner) = weak.upgrade() {
                inner.deliver(epoch, block);
            }
        })
    }

    fn report_attach_failure(&self, error: &AttachError) {
        let message = match error {
            AttachError::FallbackDisabled(cause) => format!(
                "AudioWorklet capture failed ({}); the legacy ScriptProcessor path is available but disabled (allow_legacy_fallback = false)",
                cause
            ),
            other => format!("failed to attach media source: {}", other),
        };
        log::error!("[{}] {}", self.inner.id, message);
        self.inner
            .events
            .publish_error(message, ErrorCause::Attach(error.clone()));
    }
}
