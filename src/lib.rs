pub mod api;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod init;
pub mod overlay;
pub mod pipeline;
pub mod playlist;
pub mod publish;
pub mod schedule;
pub mod source;
pub mod visual;
