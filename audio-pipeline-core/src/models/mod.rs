pub mod audio_models;
pub mod config;
pub mod error;
pub mod events;
pub mod media_source;
pub mod state;
