use thiserror::Error;

use super::audio_models::{FormatDescriptor, SampleBlock};
use super::error::{AttachError, ContextError};

/// Discriminant used to subscribe to one kind of session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Format,
    Data,
    Error,
    Close,
}

/// Notification published by a capture session.
///
/// `Format` always precedes any `Data`; `Close` is always last.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Format(FormatDescriptor),
    Data(SampleBlock),
    Error(ErrorEvent),
    Close,
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Format(_) => EventKind::Format,
            Self::Data(_) => EventKind::Data,
            Self::Error(_) => EventKind::Error,
            Self::Close => EventKind::Close,
        }
    }
}

/// Payload of an `error` event.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub message: String,
    pub cause: ErrorCause,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorCause {
    #[error(transparent)]
    Attach(#[from] AttachError),

    #[error(transparent)]
    Context(#[from] ContextError),
}
