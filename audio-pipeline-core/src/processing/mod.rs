pub mod audio_buffer;
