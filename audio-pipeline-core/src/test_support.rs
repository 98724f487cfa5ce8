//! Scriptable doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backends::BlockSink;
use crate::models::audio_models::{FormatDescriptor, SampleBlock};
use crate::models::error::{ContextError, ModuleError};
use crate::models::events::{ErrorEvent, EventKind, SessionEvent};
use crate::models::media_source::MediaSource;
use crate::traits::audio_context::{
    AudioContextHandle, AudioNode, ContextFactory, ContextState, NodeTarget, ProcessorCallback,
    WorkletHost, WorkletPort,
};
use crate::traits::media_track::MediaTrack;
use crate::traits::session_observer::SessionObserver;

/// Route `log` output through the test harness. Set `RUST_LOG` to see it.
pub(crate) fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Let spawned tasks run.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ModuleBehavior {
    /// First registration succeeds, later ones report `AlreadyRegistered`.
    Register,
    Fail(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FakeCounters {
    pub legacy_processors: usize,
    pub worklet_nodes: usize,
    pub sources: usize,
    pub module_loads: usize,
    pub resumes: usize,
    pub suspends: usize,
    pub closes: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeContextBuilder {
    sample_rate: f64,
    has_worklet: bool,
    module: ModuleBehavior,
    module_delay: Option<Duration>,
    resume_delay: Option<Duration>,
    fail_disconnects: bool,
    fail_processors: bool,
    initial_state: ContextState,
}

impl FakeContextBuilder {
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn without_worklet(mut self) -> Self {
        self.has_worklet = false;
        self
    }

    pub fn module(mut self, behavior: ModuleBehavior) -> Self {
        self.module = behavior;
        self
    }

    pub fn module_delay(mut self, delay: Duration) -> Self {
        self.module_delay = Some(delay);
        self
    }

    pub fn resume_delay(mut self, delay: Duration) -> Self {
        self.resume_delay = Some(delay);
        self
    }

    pub fn failing_disconnects(mut self) -> Self {
        self.fail_disconnects = true;
        self
    }

    /// `create_block_processor` fails until `restore_processors` is called.
    pub fn failing_processors(mut self) -> Self {
        self.fail_processors = true;
        self
    }

    pub fn suspended(mut self) -> Self {
        self.initial_state = ContextState::Suspended;
        self
    }

    pub fn build(self) -> Arc<FakeContext> {
        Arc::new(FakeContext {
            shared: Arc::new(FakeShared {
                sample_rate: self.sample_rate,
                state: Mutex::new(self.initial_state),
                has_worklet: self.has_worklet,
                module: self.module,
                module_delay: self.module_delay,
                resume_delay: self.resume_delay,
                fail_disconnects: self.fail_disconnects,
                registered: Mutex::new(HashSet::new()),
                resume_error: Mutex::new(None),
                suspend_error: Mutex::new(None),
                processor_error: Mutex::new(
                    self.fail_processors
                        .then(|| ContextError::Unsupported("ScriptProcessorNode".into())),
                ),
                counters: Mutex::new(FakeCounters::default()),
                processor_requests: Mutex::new(Vec::new()),
                processor_callback: Mutex::new(None),
                worklet_port: Mutex::new(None),
                graph_log: Arc::new(Mutex::new(Vec::new())),
            }),
        })
    }
}

struct FakeShared {
    sample_rate: f64,
    state: Mutex<ContextState>,
    has_worklet: bool,
    module: ModuleBehavior,
    module_delay: Option<Duration>,
    resume_delay: Option<Duration>,
    fail_disconnects: bool,
    registered: Mutex<HashSet<String>>,
    resume_error: Mutex<Option<ContextError>>,
    suspend_error: Mutex<Option<ContextError>>,
    processor_error: Mutex<Option<ContextError>>,
    counters: Mutex<FakeCounters>,
    processor_requests: Mutex<Vec<(u32, u16, u16)>>,
    processor_callback: Mutex<Option<ProcessorCallback>>,
    worklet_port: Mutex<Option<WorkletPort>>,
    graph_log: Arc<Mutex<Vec<String>>>,
}

impl FakeShared {
    fn node(&self, label: String) -> Arc<dyn AudioNode> {
        Arc::new(FakeNode {
            label,
            log: Arc::clone(&self.graph_log),
            fail_disconnect: self.fail_disconnects,
        })
    }
}

/// In-memory audio context with counters and hooks to inject blocks.
pub(crate) struct FakeContext {
    shared: Arc<FakeShared>,
}

impl FakeContext {
    pub fn builder() -> FakeContextBuilder {
        FakeContextBuilder {
            sample_rate: 48000.0,
            has_worklet: true,
            module: ModuleBehavior::Register,
            module_delay: None,
            resume_delay: None,
            fail_disconnects: false,
            fail_processors: false,
            initial_state: ContextState::Running,
        }
    }

    pub fn counters(&self) -> FakeCounters {
        self.shared.counters.lock().clone()
    }

    pub fn graph_log(&self) -> Vec<String> {
        self.shared.graph_log.lock().clone()
    }

    pub fn processor_requests(&self) -> Vec<(u32, u16, u16)> {
        self.shared.processor_requests.lock().clone()
    }

    pub fn set_state(&self, state: ContextState) {
        *self.shared.state.lock() = state;
    }

    pub fn fail_resume(&self, error: ContextError) {
        *self.shared.resume_error.lock() = Some(error);
    }

    pub fn fail_suspend(&self, error: ContextError) {
        *self.shared.suspend_error.lock() = Some(error);
    }

    pub fn restore_processors(&self) {
        *self.shared.processor_error.lock() = None;
    }

    pub fn media_source_node(&self, label: &str) -> Arc<dyn AudioNode> {
        self.shared.node(label.to_string())
    }

    /// Run the most recent processor callback, as the render thread would.
    pub fn emit_processor_block(&self, samples: &[f32]) -> bool {
        let callback = self.shared.processor_callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(samples);
                true
            }
            None => false,
        }
    }

    /// Post a block from the most recent worklet processor.
    pub fn post_worklet_block(&self, samples: Vec<f32>) -> bool {
        match self.shared.worklet_port.lock().as_ref() {
            Some(port) => port.send(samples).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl AudioContextHandle for FakeContext {
    fn sample_rate(&self) -> f64 {
        self.shared.sample_rate
    }

    fn state(&self) -> ContextState {
        *self.shared.state.lock()
    }

    async fn resume(&self) -> Result<(), ContextError> {
        self.shared.counters.lock().resumes += 1;
        if let Some(delay) = self.shared.resume_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.shared.resume_error.lock().clone() {
            return Err(error);
        }
        let mut state = self.shared.state.lock();
        if *state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        *state = ContextState::Running;
        Ok(())
    }

    async fn suspend(&self) -> Result<(), ContextError> {
        self.shared.counters.lock().suspends += 1;
        if let Some(error) = self.shared.suspend_error.lock().clone() {
            return Err(error);
        }
        let mut state = self.shared.state.lock();
        if *state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        *state = ContextState::Suspended;
        Ok(())
    }

    async fn close(&self) -> Result<(), ContextError> {
        self.shared.counters.lock().closes += 1;
        *self.shared.state.lock() = ContextState::Closed;
        Ok(())
    }

    fn create_media_source(&self, source: &MediaSource) -> Result<Arc<dyn AudioNode>, ContextError> {
        self.shared.counters.lock().sources += 1;
        if self.state() == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        Ok(self.shared.node(source.id().to_string()))
    }

    fn worklet(&self) -> Option<Arc<dyn WorkletHost>> {
        if !self.shared.has_worklet {
            return None;
        }
        Some(Arc::new(FakeWorklet {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn create_block_processor(
        &self,
        buffer_size_frames: u32,
        input_channels: u16,
        output_channels: u16,
        on_process: ProcessorCallback,
    ) -> Result<Arc<dyn AudioNode>, ContextError> {
        if let Some(error) = self.shared.processor_error.lock().clone() {
            return Err(error);
        }
        self.shared.counters.lock().legacy_processors += 1;
        self.shared
            .processor_requests
            .lock()
            .push((buffer_size_frames, input_channels, output_channels));
        *self.shared.processor_callback.lock() = Some(on_process);
        Ok(self.shared.node(format!("processor:{}", buffer_size_frames)))
    }
}

struct FakeWorklet {
    shared: Arc<FakeShared>,
}

#[async_trait]
impl WorkletHost for FakeWorklet {
    async fn add_module(&self, module: &str) -> Result<(), ModuleError> {
        self.shared.counters.lock().module_loads += 1;
        if let Some(delay) = self.shared.module_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.shared.module {
            ModuleBehavior::Register => {
                if self.shared.registered.lock().insert(module.to_string()) {
                    Ok(())
                } else {
                    Err(ModuleError::AlreadyRegistered)
                }
            }
            ModuleBehavior::Fail(reason) => Err(ModuleError::Failed(reason.clone())),
        }
    }

    fn create_worklet_node(
        &self,
        processor: &str,
        port: WorkletPort,
    ) -> Result<Arc<dyn AudioNode>, ContextError> {
        self.shared.counters.lock().worklet_nodes += 1;
        *self.shared.worklet_port.lock() = Some(port);
        Ok(self.shared.node(format!("worklet:{}", processor)))
    }
}

struct FakeNode {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
    fail_disconnect: bool,
}

impl AudioNode for FakeNode {
    fn label(&self) -> &str {
        &self.label
    }

    fn connect(&self, target: NodeTarget<'_>) -> Result<(), ContextError> {
        let target = match target {
            NodeTarget::Node(node) => node.label().to_string(),
            NodeTarget::Destination => "destination".to_string(),
        };
        self.log.lock().push(format!("connect {} -> {}", self.label, target));
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ContextError> {
        self.log.lock().push(format!("disconnect {}", self.label));
        if self.fail_disconnect {
            return Err(ContextError::Graph(format!("{} already disconnected", self.label)));
        }
        Ok(())
    }
}

/// Context factory handing out `FakeContext`s built from one template.
pub(crate) struct FakeFactory {
    template: FakeContextBuilder,
    created: Mutex<Vec<Arc<FakeContext>>>,
}

impl FakeFactory {
    pub fn new(template: FakeContextBuilder) -> Arc<Self> {
        Arc::new(Self {
            template,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub fn latest(&self) -> Arc<FakeContext> {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("factory has not created a context yet")
    }
}

impl ContextFactory for FakeFactory {
    fn create_context(&self) -> Result<Arc<dyn AudioContextHandle>, ContextError> {
        let context = self.template.clone().build();
        self.created.lock().push(Arc::clone(&context));
        Ok(context)
    }
}

pub(crate) struct FakeTrack {
    id: String,
    live: AtomicBool,
    stops: AtomicUsize,
}

impl FakeTrack {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            live: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Collects blocks handed to a backend sink.
pub(crate) struct BlockRecorder {
    blocks: Arc<Mutex<Vec<SampleBlock>>>,
}

impl BlockRecorder {
    pub fn new() -> Self {
        Self {
            blocks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sink(&self) -> BlockSink {
        let blocks = Arc::clone(&self.blocks);
        Arc::new(move |block| blocks.lock().push(block))
    }

    pub fn blocks(&self) -> Vec<SampleBlock> {
        self.blocks.lock().clone()
    }

    pub fn first_samples(&self) -> Vec<f32> {
        self.blocks
            .lock()
            .iter()
            .filter_map(|block| block.as_slice().first().copied())
            .collect()
    }
}

/// Records every session event in arrival order.
#[derive(Default)]
pub(crate) struct EventRecorder {
    events: Mutex<Vec<SessionEvent>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(SessionEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn formats(&self) -> Vec<FormatDescriptor> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Format(format) => Some(*format),
                _ => None,
            })
            .collect()
    }

    pub fn data(&self) -> Vec<SampleBlock> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Data(block) => Some(block.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Error(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for EventRecorder {
    fn on_format(&self, format: &FormatDescriptor) {
        self.events.lock().push(SessionEvent::Format(*format));
    }

    fn on_data(&self, block: &SampleBlock) {
        self.events.lock().push(SessionEvent::Data(block.clone()));
    }

    fn on_error(&self, error: &ErrorEvent) {
        self.events.lock().push(SessionEvent::Error(error.clone()));
    }

    fn on_close(&self) {
        self.events.lock().push(SessionEvent::Close);
    }
}
