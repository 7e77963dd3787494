use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::shared::constants::PATH_COLUMN;
use crate::table::domain::table_error::TableError;
use crate::table::domain::table_writer::TableWriter;

#[derive(Error, Debug)]
pub enum ListError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Which files the listing keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFilter {
    /// Lowercased extensions without the leading dot.
    Extensions(HashSet<String>),
    /// Every file whose name does not start with a dot.
    AllVisible,
}

impl FileFilter {
    /// Builds an extension filter from e.g. `"jpg, PNG"`. An empty list
    /// keeps every visible file.
    pub fn from_list(list: &str) -> Self {
        let extensions: HashSet<String> = list
            .split(',')
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if extensions.is_empty() {
            FileFilter::AllVisible
        } else {
            FileFilter::Extensions(extensions)
        }
    }

    pub fn extensions<S: AsRef<str>>(list: &[S]) -> Self {
        Self::from_list(
            &list
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    pub fn matches(&self, path: &Path) -> bool {
        match self {
            FileFilter::AllVisible => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.is_empty() && !n.starts_with('.')),
            FileFilter::Extensions(exts) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| exts.contains(&e.to_lowercase())),
        }
    }
}

/// Walks an image directory and writes a one-column `path` list for
/// batch detection.
pub struct ListImagesUseCase {
    writer: Box<dyn TableWriter>,
    filter: FileFilter,
    prefix: Option<PathBuf>,
}

impl ListImagesUseCase {
    pub fn new(writer: Box<dyn TableWriter>, filter: FileFilter, prefix: Option<PathBuf>) -> Self {
        Self {
            writer,
            filter,
            prefix,
        }
    }

    /// Returns the number of files listed.
    pub fn execute(&mut self, input_dir: &Path, output: &Path) -> Result<usize, ListError> {
        let paths = self.collect(input_dir)?;

        self.writer.open(output)?;
        self.writer.write_row(&[PATH_COLUMN.to_string()])?;
        for path in &paths {
            self.writer.write_row(&[path.to_string_lossy().into_owned()])?;
        }
        self.writer.close()?;

        log::info!("Listed {} files from {}", paths.len(), input_dir.display());
        Ok(paths.len())
    }

    /// Matching files under `input_dir`, sorted, with the prefix applied.
    pub fn collect(&self, input_dir: &Path) -> Result<Vec<PathBuf>, ListError> {
        if !input_dir.is_dir() {
            return Err(ListError::NotADirectory(input_dir.to_path_buf()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(input_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !self.filter.matches(entry.path()) {
                continue;
            }
            paths.push(match &self.prefix {
                Some(prefix) => join_prefix(prefix, entry.path()),
                None => entry.path().to_path_buf(),
            });
        }
        Ok(paths)
    }
}

/// Prepends `prefix` even when `path` is absolute.
fn join_prefix(prefix: &Path, path: &Path) -> PathBuf {
    let relative: PathBuf = path
        .components()
        .filter(|c| matches!(c, std::path::Component::Normal(_) | std::path::Component::ParentDir))
        .collect();
    prefix.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::infrastructure::tsv_table_writer::TsvTableWriter;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub").join("deeper")).unwrap();
        for name in [
            "b.jpg",
            "a.PNG",
            "notes.txt",
            ".hidden.jpg.swp",
            "sub/c.jpeg",
            "sub/deeper/d.gif",
            "sub/.dotfile",
        ] {
            fs::write(root.join(name), b"x").unwrap();
        }
        dir
    }

    fn names(paths: &[PathBuf], root: &Path) -> Vec<String> {
        paths
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    fn use_case(filter: FileFilter, prefix: Option<PathBuf>) -> ListImagesUseCase {
        ListImagesUseCase::new(Box::new(TsvTableWriter::new()), filter, prefix)
    }

    #[rstest]
    #[case("jpg,jpeg,png,gif", false)]
    #[case(" JPG , .png", false)]
    #[case("", true)]
    #[case(" , ", true)]
    fn test_filter_from_list(#[case] list: &str, #[case] all_visible: bool) {
        assert_eq!(FileFilter::from_list(list) == FileFilter::AllVisible, all_visible);
    }

    #[rstest]
    #[case("photo.JPG", true)]
    #[case("photo.png", true)]
    #[case("photo.txt", false)]
    #[case("noext", false)]
    fn test_extension_filter_is_case_insensitive(#[case] name: &str, #[case] expected: bool) {
        let filter = FileFilter::extensions(&["jpg", "png"]);
        assert_eq!(filter.matches(Path::new(name)), expected);
    }

    #[test]
    fn test_collect_filters_by_extension_recursively_and_sorts() {
        let dir = tree();
        let uc = use_case(FileFilter::from_list("jpg,jpeg,png,gif"), None);

        let paths = uc.collect(dir.path()).unwrap();

        assert_eq!(
            names(&paths, dir.path()),
            vec!["a.PNG", "b.jpg", "sub/c.jpeg", "sub/deeper/d.gif"]
        );
    }

    #[test]
    fn test_collect_all_skips_dotfiles() {
        let dir = tree();
        let uc = use_case(FileFilter::AllVisible, None);

        let paths = uc.collect(dir.path()).unwrap();

        let listed = names(&paths, dir.path());
        assert!(listed.contains(&"notes.txt".to_string()));
        assert!(!listed.iter().any(|n| n.rsplit('/').next().unwrap().starts_with('.')));
        assert_eq!(listed.len(), 5);
    }

    #[test]
    fn test_prefix_is_prepended() {
        let prefix = Path::new("/mnt/images");
        let joined = join_prefix(prefix, Path::new("/data/set/a.jpg"));
        assert_eq!(joined, PathBuf::from("/mnt/images/data/set/a.jpg"));
        let joined = join_prefix(prefix, Path::new("set/a.jpg"));
        assert_eq!(joined, PathBuf::from("/mnt/images/set/a.jpg"));
    }

    #[test]
    fn test_execute_writes_path_list() {
        let dir = tree();
        let output = dir.path().join("out").join("list.tsv");
        let mut uc = use_case(FileFilter::from_list("gif"), None);

        let listed = uc.execute(dir.path(), &output).unwrap();

        assert_eq!(listed, 1);
        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "path");
        assert!(lines[1].ends_with("d.gif"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let uc = use_case(FileFilter::AllVisible, None);
        let err = uc.collect(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, ListError::NotADirectory(_)));
    }
}
