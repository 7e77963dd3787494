use std::path::Path;

use crate::detection::domain::face_result::FaceResult;
use crate::shared::constants::{COUNT_COLUMN, COUNT_SUFFIX, DETAIL_SUFFIX, PATH_COLUMN};

/// One input image. `ordinal` is its position in the input list and fixes
/// its row position in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub path: String,
    pub ordinal: usize,
    /// Passed through from the input `count` column; empty when absent.
    pub count: String,
}

impl ImageDescriptor {
    pub fn new(path: impl Into<String>, ordinal: usize) -> Self {
        Self {
            path: path.into(),
            ordinal,
            count: String::new(),
        }
    }

    pub fn with_count(mut self, count: impl Into<String>) -> Self {
        self.count = count.into();
        self
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }
}

/// Outcome of one engine for one image.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCell {
    Detected(FaceResult),
    /// The call failed; serialized as two empty cells.
    Failed(String),
}

impl EngineCell {
    pub fn face_count(&self) -> Option<usize> {
        match self {
            EngineCell::Detected(result) => Some(result.face_count()),
            EngineCell::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EngineCell::Failed(_))
    }

    /// `(count, detail)` cell pair.
    fn to_fields(&self) -> Result<(String, String), serde_json::Error> {
        match self {
            EngineCell::Detected(result) => {
                Ok((result.face_count().to_string(), result.to_detail_json()?))
            }
            EngineCell::Failed(_) => Ok((String::new(), String::new())),
        }
    }
}

/// All engine outcomes for one image, one cell per engine in engine order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub ordinal: usize,
    pub path: String,
    pub count: String,
    pub cells: Vec<EngineCell>,
}

impl ResultRow {
    pub fn new(image: &ImageDescriptor, cells: Vec<EngineCell>) -> Self {
        Self {
            ordinal: image.ordinal,
            path: image.path.clone(),
            count: image.count.clone(),
            cells,
        }
    }

    /// A row whose every engine cell failed with `reason`.
    pub fn failed(image: &ImageDescriptor, engine_count: usize, reason: &str) -> Self {
        Self::new(image, vec![EngineCell::Failed(reason.to_string()); engine_count])
    }

    pub fn failed_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_failed()).count()
    }

    /// Serialized fields: `path, count`, then `count, detail` per engine.
    pub fn to_record(&self) -> Result<Vec<String>, serde_json::Error> {
        let mut record = Vec::with_capacity(2 + 2 * self.cells.len());
        record.push(self.path.clone());
        record.push(self.count.clone());
        for cell in &self.cells {
            let (count, detail) = cell.to_fields()?;
            record.push(count);
            record.push(detail);
        }
        Ok(record)
    }
}

/// Output header for the given engine order.
pub fn header<S: AsRef<str>>(engine_names: &[S]) -> Vec<String> {
    let mut header = Vec::with_capacity(2 + 2 * engine_names.len());
    header.push(PATH_COLUMN.to_string());
    header.push(COUNT_COLUMN.to_string());
    for name in engine_names {
        let name = name.as_ref();
        header.push(format!("{name}{COUNT_SUFFIX}"));
        header.push(format!("{name}{DETAIL_SUFFIX}"));
    }
    header
}
