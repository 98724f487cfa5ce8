use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::traits::media_track::MediaTrack;

/// An already-resolved live media source handed to `attach_source`.
///
/// Acquiring the source (device selection, permission prompts) happens
/// outside the pipeline. The session only connects it and, on destroy,
/// stops its tracks.
#[derive(Clone)]
pub struct MediaSource {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
    length: Option<Duration>,
}

impl MediaSource {
    /// A hardware-backed source made of one or more live tracks.
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
            length: None,
        }
    }

    /// A trackless source for headless sessions.
    ///
    /// With `Some(length)` the synthetic backend stops after covering that
    /// much audio; with `None` it runs until detached.
    pub fn synthetic(length: Option<Duration>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks: Vec::new(),
            length,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn length(&self) -> Option<Duration> {
        self.length
    }

    /// Number of frames covered by a finite source at `sample_rate_hz`.
    pub fn length_frames(&self, sample_rate_hz: f64) -> Option<u64> {
        self.length
            .map(|length| (length.as_secs_f64() * sample_rate_hz).ceil() as u64)
    }

    /// Stop every track that is still live. Safe to call repeatedly.
    pub fn stop_tracks(&self) {
        for track in &self.tracks {
            if track.is_live() {
                log::debug!("Stopping media track {}", track.id());
                track.stop();
            }
        }
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSource")
            .field("id", &self.id)
            .field("tracks", &self.tracks.iter().map(|t| t.id()).collect::<Vec<_>>())
            .field("length", &self.length)
            .finish()
    }
}
