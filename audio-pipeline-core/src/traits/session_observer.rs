use crate::models::audio_models::{FormatDescriptor, SampleBlock};
use crate::models::events::ErrorEvent;

/// Observer for capture session notifications.
///
/// Alternative to per-kind closures: register once with
/// `CaptureSession::add_observer` and override what you need.
/// Data callbacks fire on whatever task delivers blocks; marshal to a UI
/// thread if needed.
pub trait SessionObserver: Send + Sync {
    fn on_format(&self, _format: &FormatDescriptor) {}

    fn on_data(&self, _block: &SampleBlock) {}

    fn on_error(&self, _error: &ErrorEvent) {}

    /// Last notification a session ever sends.
    fn on_close(&self) {}
}
