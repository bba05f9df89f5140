//! Swedish translations for enumerated record fields and language names
//!
//! Each `<field>.yaml` under the localizations directory maps an English term
//! to its Swedish translation. `languages.yaml` is special: it maps a language
//! code to its names, e.g. `swe: {eng: Swedish, swe: svenska}`.

use crate::report::NormalizeReport;
use lrmeta_common::Localized;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

const LANGUAGES_FILE: &str = "languages";

/// Loaded translation tables
#[derive(Debug, Clone, Default)]
pub struct Localizations {
    fields: BTreeMap<String, BTreeMap<String, String>>,
    languages: BTreeMap<String, Localized>,
}

impl Localizations {
    /// Load every table under `dir`; a missing directory yields empty tables
    pub fn load(dir: &Path, report: &mut NormalizeReport) -> Self {
        let mut tables = Self::default();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("No localizations read from {}: {}", dir.display(), e);
                return tables;
            }
        };

        let mut files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("yaml"))
            .collect();
        files.sort();

        for file in files {
            let Some(name) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let content = match std::fs::read_to_string(&file) {
                Ok(content) => content,
                Err(e) => {
                    report.warn(format!("Failed to read localization '{}': {}", file.display(), e));
                    continue;
                }
            };

            if name == LANGUAGES_FILE {
                match serde_yaml::from_str::<BTreeMap<String, Localized>>(&content) {
                    Ok(languages) => tables.languages = languages,
                    Err(e) => report.warn(format!("Invalid language table '{}': {}", file.display(), e)),
                }
            } else {
                match serde_yaml::from_str::<BTreeMap<String, String>>(&content) {
                    Ok(table) => {
                        tables.fields.insert(name, table);
                    }
                    Err(e) => report.warn(format!("Invalid localization '{}': {}", file.display(), e)),
                }
            }
        }
        tables
    }

    pub fn insert_field(&mut self, field: impl Into<String>, table: BTreeMap<String, String>) {
        self.fields.insert(field.into(), table);
    }

    pub fn insert_language(&mut self, code: impl Into<String>, names: Localized) {
        self.languages.insert(code.into(), names);
    }

    /// Expand string values of localized fields into `{eng, swe}` objects
    pub fn localize_fields(&self, record: &mut Map<String, Value>) {
        for (field, table) in &self.fields {
            let Some(english) = record.get(field).and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let swedish = table.get(&english).cloned().unwrap_or_default();
            record.insert(field.clone(), json!({ "eng": english, "swe": swedish }));
        }
    }

    /// Names of one language, if known
    pub fn language(&self, code: &str) -> Option<&Localized> {
        self.languages.get(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_tables() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("task.yaml"), "Tokenization: Tokenisering\n").unwrap();
        std::fs::write(
            temp.path().join("languages.yaml"),
            "swe:\n  eng: Swedish\n  swe: svenska\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("broken.yaml"), "- a list\n").unwrap();

        let mut report = NormalizeReport::default();
        let loc = Localizations::load(temp.path(), &mut report);

        assert_eq!(loc.language("swe").and_then(|l| l.get("swe")), Some("svenska"));
        assert!(loc.language("fin").is_none());
        assert_eq!(report.warnings.len(), 1);

        let mut record = Map::new();
        record.insert("task".into(), json!("Tokenization"));
        record.insert("other".into(), json!("Tokenization"));
        loc.localize_fields(&mut record);
        assert_eq!(record["task"], json!({"eng": "Tokenization", "swe": "Tokenisering"}));
        assert_eq!(record["other"], json!("Tokenization"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut report = NormalizeReport::default();
        let loc = Localizations::load(&temp.path().join("none"), &mut report);
        assert!(loc.language("swe").is_none());
        assert!(report.warnings.is_empty());
    }
}
