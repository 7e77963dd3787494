use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::domain::face_result::FaceResult;
use crate::shared::settings::{ConfigError, Settings};

/// Failure of a single detection call. Never fatal to a batch.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Response(String),
}

/// Failure while bringing an engine up. Fatal to the whole run.
#[derive(Error, Debug)]
pub enum EngineInitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load model {path}: {message}")]
    Model { path: PathBuf, message: String },
    #[error("model could not be resolved: {0}")]
    ModelResolve(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Domain interface for an initialized face-detection engine.
///
/// One instance is shared by every batch worker, hence `&self` and
/// `Sync`. Implementations wrapping a handle that is not safe for
/// concurrent use (an ONNX session, a native classifier) must serialize
/// calls internally; callers never do it for them.
pub trait FaceEngine: Send + Sync {
    /// Stable name used for output column headers.
    fn name(&self) -> &str;

    fn detect(&self, image_path: &Path) -> Result<FaceResult, DetectionError>;
}

/// An engine capability that has not been initialized yet.
pub trait EngineProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Setting keys that must be present before `initialize` is attempted.
    fn required_settings(&self) -> &[&'static str] {
        &[]
    }

    fn initialize(&self, settings: &Settings) -> Result<Box<dyn FaceEngine>, EngineInitError>;
}
