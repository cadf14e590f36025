use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("帧尺寸不一致: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),
    #[error("Analysis cancelled")]
    Cancelled,
}
