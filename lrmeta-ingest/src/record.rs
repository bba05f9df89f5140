//! Source records and the per-record parse step
//!
//! A record file is read as YAML, optionally validated against the JSON
//! schema, cleaned up (sizes, localized fields, languages) and turned into a
//! typed [`SourceRecord`]. Anything wrong with a single record is a warning.

use crate::localizations::Localizations;
use crate::report::NormalizeReport;
use crate::scanner::SourceFile;
use crate::schema::SchemaValidator;
use lrmeta_common::{Localized, ResourcePath, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Parsed record, fields the pipeline acts on are typed, the rest pass through
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default, skip_serializing_if = "Localized::is_empty")]
    pub name: Localized,

    #[serde(default, skip_serializing_if = "Localized::is_empty")]
    pub short_description: Localized,

    /// Inline long-form description, moved out of the published document
    #[serde(default, skip_serializing_if = "Localized::is_empty")]
    pub description: Localized,

    /// `type` as written in the file; the directory decides the real type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub size: BTreeMap<String, u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub language_codes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<Value>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unlisted: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub collection: bool,

    /// Member IDs, for collections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_collections: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successors: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A record after the parse step, as kept in the run snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedRecord {
    pub path: ResourcePath,
    /// File the record was read from, relative to the record root
    pub source: String,
    pub record: SourceRecord,
    /// Resolved long-form description
    #[serde(default, skip_serializing_if = "Localized::is_empty")]
    pub description: Localized,
}

impl PreparedRecord {
    pub fn id(&self) -> &str {
        &self.path.id
    }

    pub fn resource_type(&self) -> ResourceType {
        self.path.resource_type
    }

    pub fn is_collection(&self) -> bool {
        self.path.resource_type == ResourceType::Collection || self.record.collection
    }
}

/// Shared inputs of the parse step
pub struct RecordParser<'a> {
    pub localizations: &'a Localizations,
    pub validator: Option<&'a SchemaValidator>,
    pub debug: bool,
}

impl RecordParser<'_> {
    /// Parse one record file; `None` means the record was skipped
    pub fn parse(&self, source: &SourceFile, report: &mut NormalizeReport) -> Option<PreparedRecord> {
        let path = &source.path;
        if self.debug {
            tracing::debug!(resource = %path, "Processing record {}", source.file.display());
        }

        let content = match std::fs::read_to_string(&source.file) {
            Ok(content) => content,
            Err(e) => {
                report.warn(format!("Failed to read '{}': {}", path, e));
                return None;
            }
        };
        self.parse_str(path, &content, report)
    }

    /// Parse record text for `path`
    pub fn parse_str(
        &self,
        path: &ResourcePath,
        content: &str,
        report: &mut NormalizeReport,
    ) -> Option<PreparedRecord> {
        let raw: Value = match serde_yaml::from_str(content) {
            Ok(raw) => raw,
            Err(e) => {
                report.warn(format!("Malformed YAML in '{}': {}", path, e));
                return None;
            }
        };
        let Value::Object(mut fields) = raw else {
            report.warn(format!("Malformed record '{}': top level is not a mapping", path));
            return None;
        };

        if let Some(validator) = self.validator {
            let errors = validator.validate(&Value::Object(fields.clone()));
            if !errors.is_empty() {
                for error in errors {
                    report.warn(format!("Validation error for '{}': {}", path, error));
                }
                return None;
            }
        }

        sanitize_sizes(path, &mut fields, report);
        self.localizations.localize_fields(&mut fields);

        let mut record: SourceRecord = match serde_json::from_value(Value::Object(fields)) {
            Ok(record) => record,
            Err(e) => {
                report.warn(format!("Malformed record '{}': {}", path, e));
                return None;
            }
        };

        for (field, localized) in [
            ("name", &mut record.name),
            ("short_description", &mut record.short_description),
            ("description", &mut record.description),
        ] {
            for code in localized.retain_valid() {
                report.warn(format!(
                    "Dropping '{}.{}' of '{}': not a language code",
                    field, code, path
                ));
            }
        }

        if record.name.is_empty() {
            report.warn(format!("Skipping '{}': required field 'name' is missing", path));
            return None;
        }

        if let Some(declared) = &record.declared_type {
            if declared != path.resource_type.as_str() {
                report.warn(format!(
                    "Record '{}' declares type '{}', using directory type '{}'",
                    path, declared, path.resource_type
                ));
            }
        }
        record.declared_type = Some(path.resource_type.as_str().to_string());

        self.merge_languages(path, &mut record, report);

        Some(PreparedRecord {
            path: path.clone(),
            source: format!("{}/{}.yaml", path.resource_type, path.id),
            record,
            description: Localized::new(),
        })
    }

    /// Turn `language_codes` into full `languages` entries
    fn merge_languages(&self, path: &ResourcePath, record: &mut SourceRecord, report: &mut NormalizeReport) {
        let codes = std::mem::take(&mut record.language_codes);
        for code in codes {
            let present = record
                .languages
                .iter()
                .any(|l| l.get("code").and_then(Value::as_str) == Some(code.as_str()));
            if present {
                continue;
            }
            match self.localizations.language(&code) {
                Some(names) => record.languages.push(json!({ "code": code, "name": names })),
                None => {
                    report.warn(format!("Could not find language code '{}' (resource: '{}')", code, path.id));
                    record.languages.push(json!({ "code": code }));
                }
            }
        }
    }
}

/// Replace every size value that is not a non-negative integer with 0
pub fn sanitize_sizes(path: &ResourcePath, fields: &mut Map<String, Value>, report: &mut NormalizeReport) {
    match fields.get("size") {
        None => return,
        Some(Value::Object(_)) => {}
        Some(Value::Null) => {
            fields.remove("size");
            return;
        }
        Some(_) => {
            report.warn(format!("Ignoring 'size' of '{}': not a mapping", path));
            fields.remove("size");
            return;
        }
    }
    let Some(Value::Object(entries)) = fields.get_mut("size") else {
        return;
    };

    for (key, value) in entries.iter_mut() {
        let clean = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => s.parse().ok(),
            _ => None,
        };
        match clean {
            Some(n) => *value = json!(n),
            None => {
                report.warn(format!("Size '{}' of '{}' is not a number: {}", key, path, value));
                *value = json!(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> (Option<PreparedRecord>, NormalizeReport) {
        let localizations = Localizations::default();
        let parser = RecordParser {
            localizations: &localizations,
            validator: None,
            debug: false,
        };
        let mut report = NormalizeReport::default();
        let path: ResourcePath = "corpus/attasidor".parse().unwrap();
        (parser.parse_str(&path, content, &mut report), report)
    }

    #[test]
    fn test_parse_minimal_record() {
        let (record, report) = parse(
            "name:\n  swe: Åttasidor\n  eng: Attasidor\ntype: corpus\nsize:\n  tokens: \"1200\"\n  sentences: many\ncreated: 2019-02-01\n",
        );
        let record = record.unwrap();
        assert_eq!(record.record.name.get("swe"), Some("Åttasidor"));
        assert_eq!(record.record.size["tokens"], 1200);
        assert_eq!(record.record.size["sentences"], 0);
        assert_eq!(record.record.extra["created"], json!("2019-02-01"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_missing_name_is_skipped() {
        let (record, report) = parse("type: corpus\nshort_description:\n  eng: x\n");
        assert!(record.is_none());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_malformed_yaml_is_skipped() {
        let (record, report) = parse("name: [unclosed\n");
        assert!(record.is_none());
        assert!(report.warnings[0].contains("Malformed"));
    }

    #[test]
    fn test_type_conflict_is_warned() {
        let (record, report) = parse("name:\n  eng: A\ntype: lexicon\n");
        let record = record.unwrap();
        assert_eq!(record.record.declared_type.as_deref(), Some("corpus"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_language_codes_become_languages() {
        let mut localizations = Localizations::default();
        let names: Localized = serde_yaml::from_str("eng: Swedish\nswe: svenska").unwrap();
        localizations.insert_language("swe", names);
        let parser = RecordParser {
            localizations: &localizations,
            validator: None,
            debug: false,
        };
        let mut report = NormalizeReport::default();
        let path: ResourcePath = "lexicon/saldo".parse().unwrap();
        let record = parser
            .parse_str(&path, "name:\n  eng: SALDO\nlanguage_codes: [swe, xxq]\n", &mut report)
            .unwrap();

        assert!(record.record.language_codes.is_empty());
        assert_eq!(
            record.record.languages,
            vec![
                json!({"code": "swe", "name": {"eng": "Swedish", "swe": "svenska"}}),
                json!({"code": "xxq"}),
            ]
        );
        assert_eq!(report.warnings.len(), 1);
    }
}
