/// One hardware track (for example a microphone channel) behind a media source.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;

    /// Release the underlying hardware. Must be idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;
}
