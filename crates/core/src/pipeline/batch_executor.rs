use crate::detection::domain::face_engine::FaceEngine;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::result_row::{ImageDescriptor, ResultRow};

/// Runs every (image, engine) detection and assembles one row per image.
///
/// This is a port. Implementations decide how the work is scheduled but
/// must return exactly one row per input image, in input order, each with
/// one cell per engine in engine order. A failing detection call becomes
/// a failed cell; it never aborts the batch.
pub trait BatchExecutor: Send + Sync {
    fn execute(
        &self,
        images: &[ImageDescriptor],
        engines: &[Box<dyn FaceEngine>],
        logger: &mut dyn PipelineLogger,
    ) -> Vec<ResultRow>;
}
