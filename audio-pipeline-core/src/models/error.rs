use thiserror::Error;

/// Failures reported by an audio context or one of its graph nodes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("audio context is closed")]
    Closed,

    #[error("not supported by this audio context: {0}")]
    Unsupported(String),

    #[error("failed to create audio context: {0}")]
    CreationFailed(String),

    #[error("failed to resume audio context: {0}")]
    ResumeFailed(String),

    #[error("failed to suspend audio context: {0}")]
    SuspendFailed(String),

    #[error("failed to close audio context: {0}")]
    CloseFailed(String),

    #[error("audio graph error: {0}")]
    Graph(String),
}

/// Outcome of registering a processor module with a worklet host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("processor module already registered")]
    AlreadyRegistered,

    #[error("processor module registration failed: {0}")]
    Failed(String),
}

/// Errors returned by `CaptureSession::attach_source`.
///
/// Every attach failure is also published as an `error` event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttachError {
    #[error("AudioWorklet is not supported by this audio context")]
    WorkletUnavailable,

    #[error("worklet module registration failed: {0}")]
    ModuleRegistrationFailed(String),

    #[error("worklet capture failed ({0}); the legacy ScriptProcessor path is available but disabled")]
    FallbackDisabled(Box<AttachError>),

    #[error("another attach is already in progress on this session")]
    AttachInProgress,

    #[error("media source could not be connected: {0}")]
    SourceAcquisitionFailed(String),

    #[error("could not resume suspended audio context: {0}")]
    ResumeFailed(ContextError),

    #[error("no usable audio context: {0}")]
    ContextUnavailable(ContextError),

    #[error("processing node could not be created: {0}")]
    NodeCreationFailed(ContextError),

    #[error("attach_source must be awaited inside a tokio runtime")]
    NoRuntime,

    #[error("session has been destroyed")]
    Destroyed,
}

impl AttachError {
    /// The innermost failure, unwrapping `FallbackDisabled`.
    pub fn root_cause(&self) -> &AttachError {
        match self {
            Self::FallbackDisabled(cause) => cause.root_cause(),
            other => other,
        }
    }
}

/// Errors raised while constructing a capture session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Non-fatal failure during teardown. Logged, never surfaced to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TeardownWarning {
    #[error("failed to disconnect {node}: {error}")]
    Disconnect {
        node: &'static str,
        error: ContextError,
    },

    #[error("failed to close audio context: {0}")]
    Close(ContextError),
}
