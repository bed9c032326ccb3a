pub mod audio_host;
pub mod transcoder;
