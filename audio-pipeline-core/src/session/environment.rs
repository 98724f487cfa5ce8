use std::fmt;
use std::sync::Arc;

use crate::context::synthetic::{SyntheticContext, DEFAULT_HEADLESS_SAMPLE_RATE_HZ};
use crate::models::error::ContextError;
use crate::traits::audio_context::{AudioContextHandle, ContextFactory};

/// Where a session runs. Chosen by the caller; never detected.
#[derive(Clone)]
pub enum Environment {
    /// Audio-capable runtime. Contexts come from the factory; backends are
    /// the worklet with the legacy processor as fallback.
    Hardware(Arc<dyn ContextFactory>),

    /// No audio hardware. Contexts are `SyntheticContext`s and the synthetic
    /// backend is the only one used.
    Headless { sample_rate_hz: f64 },
}

impl Environment {
    pub fn hardware(factory: impl ContextFactory + 'static) -> Self {
        Self::Hardware(Arc::new(factory))
    }

    pub fn headless() -> Self {
        Self::Headless {
            sample_rate_hz: DEFAULT_HEADLESS_SAMPLE_RATE_HZ,
        }
    }

    pub fn is_headless(&self) -> bool {
        matches!(self, Self::Headless { .. })
    }

    pub fn create_context(&self) -> Result<Arc<dyn AudioContextHandle>, ContextError> {
        match self {
            Self::Hardware(factory) => factory.create_context(),
            Self::Headless { sample_rate_hz } => Ok(Arc::new(SyntheticContext::new(*sample_rate_hz))),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware(_) => f.write_str("Hardware"),
            Self::Headless { sample_rate_hz } => f
                .debug_struct("Headless")
                .field("sample_rate_hz", sample_rate_hz)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::audio_context::ContextState;

    #[test]
    fn headless_creates_synthetic_contexts() {
        let env = Environment::Headless {
            sample_rate_hz: 22050.0,
        };
        let context = env.create_context().unwrap();
        assert!(env.is_headless());
        assert_eq!(context.sample_rate(), 22050.0);
        assert_eq!(context.state(), ContextState::Running);
        assert!(context.worklet().is_none());
    }

    #[test]
    fn hardware_delegates_to_factory() {
        let env = Environment::hardware(|| -> Result<Arc<dyn AudioContextHandle>, ContextError> {
            Err(ContextError::CreationFailed("no device".into()))
        });
        assert!(!env.is_headless());
        assert_eq!(
            env.create_context().err(),
            Some(ContextError::CreationFailed("no device".into()))
        );
    }
}
