use std::collections::HashMap;
use std::path::Path;

use crate::table::domain::table_error::TableError;

/// A delimited file read as a header plus one `column → value` map per row.
///
/// Cells missing from a short row read as empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<HashMap<String, String>>,
}

impl Table {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub trait TableReader: Send {
    fn read(&self, path: &Path) -> Result<Table, TableError>;
}
