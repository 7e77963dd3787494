use std::path::Path;

use crate::table::domain::table_error::TableError;

/// Output tables are tab-delimited and unquoted, so a field holding a tab
/// or line break would split its row.
pub fn breaks_row(field: &str) -> bool {
    field.contains(['\t', '\r', '\n'])
}

/// Checks every field against [`breaks_row`].
pub fn check_fields(fields: &[String]) -> Result<(), TableError> {
    match fields.iter().find(|f| breaks_row(f)) {
        Some(field) => Err(TableError::UnwritableField {
            value: field.clone(),
        }),
        None => Ok(()),
    }
}

/// Writes rows of a delimited output file.
///
/// `open` creates the destination immediately, so an unwritable path is
/// reported before any rows have been produced.
pub trait TableWriter: Send {
    fn open(&mut self, path: &Path) -> Result<(), TableError>;

    /// Fails with [`TableError::UnwritableField`] instead of writing a
    /// field that would break the row.
    fn write_row(&mut self, fields: &[String]) -> Result<(), TableError>;

    fn close(&mut self) -> Result<(), TableError>;
}
