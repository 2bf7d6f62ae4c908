use thiserror::Error;

/// Failures at the generative model boundary. None of these reach the pattern consumer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("model not ready")]
    NotReady,
    #[error("malformed model data: {0}")]
    Malformed(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid render request: {0}")]
    InvalidRequest(String),
    /// Peak stayed under the silence threshold.
    #[error("{path} render is silent (peak {peak:.6})")]
    Silent { path: &'static str, peak: f32 },
    #[error("offline render failed: {0}")]
    Offline(String),
    #[error("live capture failed: {0}")]
    Capture(String),
    #[error("wav encoding failed: {0}")]
    Encode(String),
    #[error("render failed (offline: {offline}; capture: {capture})")]
    Failed { offline: String, capture: String },
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output device available")]
    NoDevice,
    #[error("device init failed: {0}")]
    DeviceInit(String),
    #[error("failed to build output stream: {0}")]
    StreamCreate(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
