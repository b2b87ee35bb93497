use thiserror::Error;

use crate::types::FrameSize;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Frame size mismatch: expected {expected}, got {actual}")]
    FrameSizeMismatch { expected: FrameSize, actual: FrameSize },

    #[error("Landmark detector error: {0}")]
    Detector(String),

    #[error("Logging setup error: {0}")]
    Telemetry(String),

    #[error("Tracking worker is no longer running")]
    WorkerClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
