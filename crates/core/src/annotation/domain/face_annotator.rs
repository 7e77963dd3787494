use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::domain::face_result::FaceResult;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no detection results to draw for {0}")]
    NothingToDraw(PathBuf),
    #[error("annotated image for {0} would be too large")]
    TooLarge(PathBuf),
}

/// Renders detection results onto a copy of the source image.
pub trait FaceAnnotator: Send {
    /// Draws one panel per entry of `results` and writes the composite
    /// to `output`. The source image is never modified.
    fn annotate(
        &self,
        image_path: &Path,
        results: &[FaceResult],
        output: &Path,
    ) -> Result<(), AnnotateError>;
}
