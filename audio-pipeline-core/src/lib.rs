//! # audio-pipeline-core
//!
//! Audio capture pipeline manager.
//!
//! Owns a live media source, picks a processing backend for it (AudioWorklet
//! first, the legacy ScriptProcessor as fallback, a synthetic generator when
//! running headless), manages the audio-graph resources behind it and
//! publishes captured sample blocks as typed events.
//!
//! ## Architecture
//!
//! ```text
//! audio-pipeline-core (this crate)
//! ├── traits/       ← AudioContextHandle, AudioNode, WorkletHost, MediaTrack, SessionObserver
//! ├── models/       ← FormatDescriptor, SampleBlock, CaptureState, CaptureConfiguration, errors, events
//! ├── context/      ← SyntheticContext (headless audio context)
//! ├── backends/     ← Backend / AttachedBackend: Worklet, LegacyProcessor, Synthetic
//! ├── events/       ← EventBus (format, data, error, close)
//! ├── processing/   ← AudioBuffer, render_to_buffer
//! └── session/      ← CaptureSession (orchestrator), ResourceLifecycle, Environment
//! ```

pub mod backends;
pub mod context;
pub mod events;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use backends::{AttachedBackend, Backend, BlockSink};
pub use context::synthetic::SyntheticContext;
pub use events::event_bus::{EventBus, EventHandler, SubscriptionId};
pub use models::audio_models::{BackendKind, FormatDescriptor, SampleBlock, SessionDiagnostics};
pub use models::config::CaptureConfiguration;
pub use models::error::{AttachError, CaptureError, ContextError, ModuleError, TeardownWarning};
pub use models::events::{ErrorCause, ErrorEvent, EventKind, SessionEvent};
pub use models::media_source::MediaSource;
pub use models::state::CaptureState;
pub use processing::audio_buffer::{render_to_buffer, AudioBuffer};
pub use session::capture_session::CaptureSession;
pub use session::environment::Environment;
pub use session::lifecycle::{ContextLease, ResourceLifecycle};
pub use traits::audio_context::{
    AudioContextHandle, AudioNode, ContextFactory, ContextState, NodeTarget, ProcessorCallback, WorkletHost,
    WorkletPort,
};
pub use traits::media_track::MediaTrack;
pub use traits::session_observer::SessionObserver;
