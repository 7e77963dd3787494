use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::annotation::domain::face_annotator::FaceAnnotator;
use crate::detection::domain::face_result::FaceResult;
use crate::shared::constants::{ANNOTATED_PREFIX, DETAIL_SUFFIX, PATH_COLUMN};
use crate::table::domain::table_error::TableError;
use crate::table::domain::table_reader::TableReader;

#[derive(Error, Debug)]
pub enum AnnotateRunError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("{0} has no '<engine>:detail' columns")]
    NoDetailColumns(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotateReport {
    pub annotated: usize,
    pub failed: usize,
}

/// Reads a detection output table and writes an annotated copy of every
/// listed image next to the source.
///
/// Engines are discovered from the `<engine>:detail` header columns. An
/// empty or unparsable detail cell still yields a panel, just without
/// boxes. A row whose image cannot be annotated is logged and skipped.
pub struct AnnotateUseCase {
    reader: Box<dyn TableReader>,
    annotator: Box<dyn FaceAnnotator>,
}

impl AnnotateUseCase {
    pub fn new(reader: Box<dyn TableReader>, annotator: Box<dyn FaceAnnotator>) -> Self {
        Self { reader, annotator }
    }

    pub fn execute(&self, input: &Path) -> Result<AnnotateReport, AnnotateRunError> {
        let table = self.reader.read(input)?;
        if !table.has_column(PATH_COLUMN) {
            return Err(TableError::MissingColumn {
                path: input.to_path_buf(),
                column: PATH_COLUMN,
            }
            .into());
        }

        let engines = detail_engines(&table.headers);
        if engines.is_empty() {
            return Err(AnnotateRunError::NoDetailColumns(input.to_path_buf()));
        }
        log::info!("Annotating with engines [{}]", engines.join(", "));

        let mut report = AnnotateReport::default();
        for record in &table.records {
            let Some(image_path) = record.get(PATH_COLUMN).filter(|p| !p.is_empty()) else {
                report.failed += 1;
                continue;
            };
            let image_path = Path::new(image_path);
            let results = row_results(record, &engines, image_path);
            let output = annotated_path(image_path);

            match self.annotator.annotate(image_path, &results, &output) {
                Ok(()) => {
                    log::debug!("Wrote {}", output.display());
                    report.annotated += 1;
                }
                Err(e) => {
                    log::error!("{}: {e}", image_path.display());
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Annotated {} images ({} failed)",
            report.annotated,
            report.failed
        );
        Ok(report)
    }
}

/// Engine names in header order, taken from `<engine>:detail` columns.
pub fn detail_engines(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .filter_map(|h| h.strip_suffix(DETAIL_SUFFIX))
        .map(str::to_string)
        .collect()
}

/// One result per engine; unusable cells become face-less results.
fn row_results(
    record: &HashMap<String, String>,
    engines: &[String],
    image_path: &Path,
) -> Vec<FaceResult> {
    engines
        .iter()
        .map(|engine| {
            let raw = record
                .get(&format!("{engine}{DETAIL_SUFFIX}"))
                .map_or("", String::as_str);
            if raw.is_empty() {
                return FaceResult::new(engine.as_str(), vec![]);
            }
            FaceResult::from_detail_json(raw).unwrap_or_else(|e| {
                log::warn!("{} [{engine}]: bad detail JSON: {e}", image_path.display());
                FaceResult::new(engine.as_str(), vec![])
            })
        })
        .collect()
}

/// `dir/file.jpg` → `dir/_annotated_file.jpg`
pub fn annotated_path(image_path: &Path) -> PathBuf {
    let file_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    image_path.with_file_name(format!("{ANNOTATED_PREFIX}{file_name}"))
}
