use std::path::Path;

use thiserror::Error;

use crate::detection::domain::face_engine::FaceEngine;
use crate::pipeline::batch_executor::BatchExecutor;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::result_row::{header, ImageDescriptor};
use crate::shared::constants::{COUNT_COLUMN, PATH_COLUMN};
use crate::table::domain::table_error::TableError;
use crate::table::domain::table_reader::{Table, TableReader};
use crate::table::domain::table_writer::{check_fields, TableWriter};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("no face detection engine specified")]
    NoEngine,
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("failed to serialize detection result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Totals for a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub images: usize,
    pub failed_cells: usize,
}

/// Batch detection: read list → dispatch → write one row per image.
///
/// Only a missing engine set or an unreadable/unwritable table fails the
/// run. Per-call detection failures show up as empty cells.
pub struct DetectBatchUseCase {
    reader: Box<dyn TableReader>,
    writer: Box<dyn TableWriter>,
    executor: Box<dyn BatchExecutor>,
    engines: Vec<Box<dyn FaceEngine>>,
    logger: Box<dyn PipelineLogger>,
}

impl DetectBatchUseCase {
    pub fn new(
        reader: Box<dyn TableReader>,
        writer: Box<dyn TableWriter>,
        executor: Box<dyn BatchExecutor>,
        engines: Vec<Box<dyn FaceEngine>>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            writer,
            executor,
            engines,
            logger,
        }
    }

    pub fn execute(&mut self, input: &Path, output: &Path) -> Result<BatchReport, BatchError> {
        if self.engines.is_empty() {
            return Err(BatchError::NoEngine);
        }

        self.logger.info(&format!("Reading {}", input.display()));
        let table = self.reader.read(input)?;
        if table.is_empty() {
            log::warn!("{} lists no images", input.display());
        }
        let images = descriptors(&table, input)?;

        self.writer.open(output)?;

        let names: Vec<&str> = self.engines.iter().map(|e| e.name()).collect();
        self.logger.info(&format!(
            "Detecting faces in {} images with [{}]",
            images.len(),
            names.join(", ")
        ));

        let rows = self
            .executor
            .execute(&images, &self.engines, self.logger.as_mut());

        self.writer.write_row(&header(&names))?;
        let mut failed_cells = 0;
        for row in &rows {
            failed_cells += row.failed_cells();
            self.writer.write_row(&row.to_record()?)?;
        }
        self.writer.close()?;

        self.logger.info(&format!("Wrote {} rows to {}", rows.len(), output.display()));
        self.logger.summary();

        Ok(BatchReport {
            images: rows.len(),
            failed_cells,
        })
    }
}

/// Input rows in file order. `count` is optional and passed through.
///
/// Pass-through values are checked against the output format here, so a
/// path the output cannot hold fails the run before any detection work.
fn descriptors(table: &Table, input: &Path) -> Result<Vec<ImageDescriptor>, TableError> {
    if !table.has_column(PATH_COLUMN) {
        return Err(TableError::MissingColumn {
            path: input.to_path_buf(),
            column: PATH_COLUMN,
        });
    }
    let mut images = Vec::with_capacity(table.len());
    for (ordinal, record) in table.records.iter().enumerate() {
        let path = record.get(PATH_COLUMN).cloned().unwrap_or_default();
        let count = record.get(COUNT_COLUMN).cloned().unwrap_or_default();
        check_fields(&[path.clone(), count.clone()])?;
        images.push(ImageDescriptor::new(path, ordinal).with_count(count));
    }
    Ok(images)
}
