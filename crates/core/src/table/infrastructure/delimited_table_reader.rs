use std::collections::HashMap;
use std::path::Path;

use crate::table::domain::table_error::TableError;
use crate::table::domain::table_reader::{Table, TableReader};

/// Reads comma- or tab-delimited files with a header row via the `csv` crate.
///
/// `.csv` files are comma delimited with standard quoting. Everything else
/// is read as TSV with quoting disabled, so JSON cells written by
/// [`TsvTableWriter`](super::tsv_table_writer::TsvTableWriter) come back
/// verbatim.
#[derive(Debug, Clone, Default)]
pub struct DelimitedTableReader;

impl DelimitedTableReader {
    pub fn new() -> Self {
        Self
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

impl TableReader for DelimitedTableReader {
    fn read(&self, path: &Path) -> Result<Table, TableError> {
        let csv = is_csv(path);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(if csv { b',' } else { b'\t' })
            .quoting(csv)
            .flexible(true)
            .from_path(path)
            .map_err(|source| TableError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let read_err = |source| TableError::Read {
            path: path.to_path_buf(),
            source,
        };

        let headers: Vec<String> = reader
            .headers()
            .map_err(read_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result.map_err(read_err)?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            let row: HashMap<String, String> = headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), record.get(i).unwrap_or("").to_string()))
                .collect();
            records.push(row);
        }

        Ok(Table { headers, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_reads_csv_with_quoting() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "list.csv", "path,count\n\"/img/a, b.jpg\",2\n/img/c.jpg,\n");

        let table = DelimitedTableReader::new().read(&path).unwrap();

        assert_eq!(table.headers, vec!["path", "count"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0]["path"], "/img/a, b.jpg");
        assert_eq!(table.records[0]["count"], "2");
        assert_eq!(table.records[1]["count"], "");
    }

    #[test]
    fn test_reads_tsv_json_cells_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "output.tsv",
            "path\tcount\tyolo:count\tyolo:detail\n/a.jpg\t\t1\t{\"engine\":\"yolo\",\"faces\":[]}\n",
        );

        let table = DelimitedTableReader::new().read(&path).unwrap();

        assert_eq!(table.records[0]["yolo:detail"], r#"{"engine":"yolo","faces":[]}"#);
    }

    #[test]
    fn test_short_rows_fill_with_empty_cells() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "list.tsv", "path\tcount\n/a.jpg\n");

        let table = DelimitedTableReader::new().read(&path).unwrap();

        assert_eq!(table.records[0]["path"], "/a.jpg");
        assert_eq!(table.records[0]["count"], "");
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "list.tsv", "path\n");

        let table = DelimitedTableReader::new().read(&path).unwrap();

        assert!(table.is_empty());
        assert!(table.has_column("path"));
        assert!(!table.has_column("count"));
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let dir = TempDir::new().unwrap();
        let err = DelimitedTableReader::new()
            .read(&dir.path().join("absent.tsv"))
            .unwrap_err();
        assert!(matches!(err, TableError::Open { .. }));
    }
}
