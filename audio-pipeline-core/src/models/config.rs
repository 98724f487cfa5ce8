use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::media_source::MediaSource;
use crate::traits::audio_context::AudioContextHandle;

pub const DEFAULT_BUFFER_SIZE_FRAMES: u32 = 4096;
pub const MIN_BUFFER_SIZE_FRAMES: u32 = 256;
pub const MAX_BUFFER_SIZE_FRAMES: u32 = 16384;

/// Configuration for a capture session.
///
/// The plain fields deserialize from JSON; the runtime handles
/// (`media_source`, `shared_context`) are set in code.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfiguration {
    /// Source attached as soon as the session has started.
    #[serde(skip)]
    pub media_source: Option<MediaSource>,

    /// Force the legacy block-callback processor instead of the worklet.
    pub use_buffered_samples: bool,

    /// Frames per emitted block (default: 4096). Expected to be a power of
    /// two in [256, 16384]; other values are kept as-is and only logged.
    pub buffer_size_frames: u32,

    /// Pre-existing context, borrowed: suspended on stop, never closed.
    #[serde(skip)]
    pub shared_context: Option<Arc<dyn AudioContextHandle>>,

    /// Fall back to the legacy processor when the worklet path fails
    /// (default: true).
    pub allow_legacy_fallback: bool,
}

impl CaptureConfiguration {
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid configuration: {}", e)))?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size_frames == 0 {
            return Err("buffer size must be at least one frame".into());
        }
        Ok(())
    }

    /// Describes why `buffer_size_frames` is outside the supported set, if it is.
    pub fn buffer_size_warning(&self) -> Option<String> {
        let frames = self.buffer_size_frames;
        if !(MIN_BUFFER_SIZE_FRAMES..=MAX_BUFFER_SIZE_FRAMES).contains(&frames) {
            return Some(format!(
                "buffer size {} is outside [{}, {}]; blocks will use it unchanged",
                frames, MIN_BUFFER_SIZE_FRAMES, MAX_BUFFER_SIZE_FRAMES
            ));
        }
        if !frames.is_power_of_two() {
            return Some(format!(
                "buffer size {} is not a power of two; blocks will use it unchanged",
                frames
            ));
        }
        None
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            media_source: None,
            use_buffered_samples: false,
            buffer_size_frames: DEFAULT_BUFFER_SIZE_FRAMES,
            shared_context: None,
            allow_legacy_fallback: true,
        }
    }
}

impl fmt::Debug for CaptureConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfiguration")
            .field("media_source", &self.media_source)
            .field("use_buffered_samples", &self.use_buffered_samples)
            .field("buffer_size_frames", &self.buffer_size_frames)
            .field("shared_context", &self.shared_context.is_some())
            .field("allow_legacy_fallback", &self.allow_legacy_fallback)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CaptureConfiguration::default();
        assert_eq!(config.buffer_size_frames, 4096);
        assert!(config.allow_legacy_fallback);
        assert!(!config.use_buffered_samples);
        assert!(config.shared_context.is_none());
        assert!(config.buffer_size_warning().is_none());
    }

    #[test]
    fn from_json_fills_missing_fields_with_defaults() {
        let config =
            CaptureConfiguration::from_json(r#"{"bufferSizeFrames": 2048, "allowLegacyFallback": false}"#)
                .unwrap();
        assert_eq!(config.buffer_size_frames, 2048);
        assert!(!config.allow_legacy_fallback);
        assert!(!config.use_buffered_samples);
    }

    #[test]
    fn from_json_rejects_zero_buffer() {
        let err = CaptureConfiguration::from_json(r#"{"bufferSizeFrames": 0}"#).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(CaptureConfiguration::from_json("{ not json").is_err());
    }

    #[test]
    fn out_of_range_sizes_warn_but_validate() {
        for frames in [128, 32768, 3000] {
            let config = CaptureConfiguration {
                buffer_size_frames: frames,
                ..Default::default()
            };
            assert!(config.validate().is_ok());
            let warning = config.buffer_size_warning().unwrap();
            assert!(warning.contains(&frames.to_string()));
        }
    }
}
