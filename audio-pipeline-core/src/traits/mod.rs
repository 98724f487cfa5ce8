pub mod audio_context;
pub mod media_track;
pub mod session_observer;
