use std::path::Path;

use thiserror::Error;

use crate::detection::domain::face_engine::{DetectionError, FaceEngine};
use crate::detection::domain::face_result::FaceResult;

#[derive(Error, Debug)]
pub enum ImageDetectError {
    #[error("no face detection engine specified")]
    NoEngine,
    #[error("engine '{engine}' failed: {source}")]
    Detection {
        engine: String,
        #[source]
        source: DetectionError,
    },
    #[error("failed to serialize detection result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Single-image detection: every engine in turn, no concurrency.
///
/// Unlike batch mode, the first failing engine aborts the run.
pub struct DetectImageUseCase {
    engines: Vec<Box<dyn FaceEngine>>,
}

impl DetectImageUseCase {
    pub fn new(engines: Vec<Box<dyn FaceEngine>>) -> Self {
        Self { engines }
    }

    /// Runs each engine on `image_path`, handing every result to `on_result`
    /// as soon as it is available.
    pub fn execute<F>(&self, image_path: &Path, mut on_result: F) -> Result<usize, ImageDetectError>
    where
        F: FnMut(&FaceResult) -> Result<(), ImageDetectError>,
    {
        if self.engines.is_empty() {
            return Err(ImageDetectError::NoEngine);
        }
        for engine in &self.engines {
            let result = engine
                .detect(image_path)
                .map_err(|source| ImageDetectError::Detection {
                    engine: engine.name().to_string(),
                    source,
                })?;
            log::debug!("{}: {} face(s)", engine.name(), result.face_count());
            on_result(&result)?;
        }
        Ok(self.engines.len())
    }
}

/// `<engine>\t<count>\t<detail json>`
pub fn format_result_line(result: &FaceResult) -> Result<String, serde_json::Error> {
    Ok(format!(
        "{}\t{}\t{}",
        result.engine_name,
        result.face_count(),
        result.to_detail_json()?
    ))
}
