use thiserror::Error;

/// Failure taxonomy for a single pipeline run. Every stage maps its
/// failures onto one of these; the scheduler only ever sees a failed run,
/// never a dead process.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid required setting. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Audio listing/download/auth failure. Fatal for the run.
    #[error("audio source error: {0}")]
    Source(String),

    /// Creative-asset generation failure. Recoverable when a fallback
    /// provider is configured, otherwise fatal.
    #[error("generation error: {0}")]
    Generation(String),

    /// ffmpeg/ffprobe returned non-zero. Fatal; artifacts are kept on disk
    /// for inspection.
    #[error("media tool error: {0}")]
    MediaTool(String),

    /// Publish step failed. The run is marked failed but local artifacts
    /// are retained and the next scheduled run proceeds independently.
    #[error("upload error: {0}")]
    Upload(String),
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn media_tool(msg: impl Into<String>) -> Self {
        Self::MediaTool(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }
}
