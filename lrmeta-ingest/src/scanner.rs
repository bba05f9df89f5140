//! Metadata store scanner
//!
//! Discovers `<type>/<id>.yaml` record files below the record root. The
//! directory name decides the resource type.

use crate::error::{NormalizeError, NormalizeResult};
use crate::report::NormalizeReport;
use lrmeta_common::model::is_valid_resource_id;
use lrmeta_common::{ResourcePath, ResourceType};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// One record file found in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: ResourcePath,
    pub file: PathBuf,
}

/// Record file scanner
pub struct RecordScanner {
    root: PathBuf,
}

impl RecordScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File location of one record
    pub fn locate(&self, path: &ResourcePath) -> PathBuf {
        self.root
            .join(path.resource_type.as_str())
            .join(format!("{}.yaml", path.id))
    }

    /// Fail unless the record root is a readable directory
    pub fn check_store(&self) -> NormalizeResult<()> {
        let meta = std::fs::metadata(&self.root)
            .map_err(|e| NormalizeError::StoreUnavailable(self.root.clone(), e.to_string()))?;
        if !meta.is_dir() {
            return Err(NormalizeError::StoreUnavailable(
                self.root.clone(),
                "not a directory".to_string(),
            ));
        }
        std::fs::read_dir(&self.root)
            .map_err(|e| NormalizeError::StoreUnavailable(self.root.clone(), e.to_string()))?;
        Ok(())
    }

    /// Enumerate every record file, sorted by path
    ///
    /// Files outside a known type directory are reported and ignored.
    pub fn scan(&self, report: &mut NormalizeReport) -> NormalizeResult<Vec<SourceFile>> {
        self.check_store()?;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.warn(format!("Error accessing store entry: {}", e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(source) = self.classify(entry.path(), report) {
                files.push(source);
            }
        }

        tracing::debug!("Scan complete: {} record files under {}", files.len(), self.root.display());
        Ok(files)
    }

    fn classify(&self, file: &Path, report: &mut NormalizeReport) -> Option<SourceFile> {
        let relative = file.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .iter()
            .filter_map(|p| p.to_str())
            .collect();

        let [type_dir, file_name] = parts.as_slice() else {
            report.warn(format!(
                "Ignoring '{}': records must live at <type>/<id>.yaml",
                relative.display()
            ));
            return None;
        };

        let Some(resource_type) = ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == *type_dir)
        else {
            report.warn(format!(
                "Ignoring '{}': unknown resource type directory '{}'",
                relative.display(),
                type_dir
            ));
            return None;
        };

        let id = file_name.trim_end_matches(".yaml");
        if !is_valid_resource_id(id) {
            report.warn(format!(
                "Ignoring '{}': invalid resource ID '{}'",
                relative.display(),
                id
            ));
            return None;
        }

        Some(SourceFile {
            path: ResourcePath::new(resource_type, id),
            file: file.to_path_buf(),
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "name:\n  eng: x\n").unwrap();
    }

    #[test]
    fn test_scan_sorted_and_typed() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "lexicon/saldo.yaml");
        touch(temp.path(), "corpus/attasidor.yaml");
        touch(temp.path(), "corpus/README.md");
        touch(temp.path(), ".git/config.yaml");
        touch(temp.path(), "corpus/.hidden.yaml");

        let mut report = NormalizeReport::default();
        let files = RecordScanner::new(temp.path()).scan(&mut report).unwrap();

        let paths: Vec<String> = files.iter().map(|f| f.path.to_string()).collect();
        assert_eq!(paths, vec!["corpus/attasidor", "lexicon/saldo"]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_unknown_type_dir_is_warned() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "corpora/attasidor.yaml");
        touch(temp.path(), "stray.yaml");
        touch(temp.path(), "corpus/nested/deep.yaml");

        let mut report = NormalizeReport::default();
        let files = RecordScanner::new(temp.path()).scan(&mut report).unwrap();

        assert!(files.is_empty());
        assert_eq!(report.warnings.len(), 3);
    }

    #[test]
    fn test_missing_store_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut report = NormalizeReport::default();
        let result = RecordScanner::new(temp.path().join("nope")).scan(&mut report);
        assert!(matches!(result, Err(NormalizeError::StoreUnavailable(_, _))));
    }

    #[test]
    fn test_locate() {
        let scanner = RecordScanner::new("/store/yaml");
        let path: ResourcePath = "lexicon/saldo".parse().unwrap();
        assert_eq!(scanner.locate(&path), PathBuf::from("/store/yaml/lexicon/saldo.yaml"));
    }
}
