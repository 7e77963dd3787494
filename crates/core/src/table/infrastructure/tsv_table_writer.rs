use std::fs::File;
use std::path::Path;

use crate::table::domain::table_error::TableError;
use crate::table::domain::table_writer::{check_fields, TableWriter};

/// Tab-delimited writer with quoting disabled, so JSON detail cells are
/// stored exactly as serialized.
#[derive(Default)]
pub struct TsvTableWriter {
    writer: Option<csv::Writer<File>>,
}

impl TsvTableWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableWriter for TsvTableWriter {
    fn open(&mut self, path: &Path) -> Result<(), TableError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| TableError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .flexible(true)
            .from_path(path)
            .map_err(|source| TableError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        self.writer = Some(writer);
        Ok(())
    }

    fn write_row(&mut self, fields: &[String]) -> Result<(), TableError> {
        let writer = self.writer.as_mut().ok_or(TableError::NotOpen)?;
        check_fields(fields)?;
        writer.write_record(fields)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TableError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
