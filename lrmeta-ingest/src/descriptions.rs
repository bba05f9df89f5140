//! Long-form description resolution
//!
//! Sources in priority order: the inline `description` field, convention
//! files `<id>_<lang>.html` in the descriptions directory, and the explicit
//! mapping file (`id -> {lang -> [file, ...]}`). The first source that yields
//! anything wins.

use crate::report::NormalizeReport;
use lrmeta_common::Localized;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Languages looked up by file-name convention
pub const DESCRIPTION_LANGUAGES: [&str; 2] = ["swe", "eng"];

/// Description files on disk plus the explicit mapping
#[derive(Debug, Clone, Default)]
pub struct DescriptionSource {
    dir: PathBuf,
    mapping: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl DescriptionSource {
    /// Load the mapping file; a missing file means an empty mapping
    pub fn load(dir: &Path, mapping_file: &Path, report: &mut NormalizeReport) -> Self {
        let mapping = match std::fs::read_to_string(mapping_file) {
            Ok(content) => match serde_yaml::from_str::<BTreeMap<String, BTreeMap<String, Vec<String>>>>(&content) {
                Ok(raw) => raw
                    .into_iter()
                    .map(|(id, langs)| {
                        let langs = langs
                            .into_iter()
                            .map(|(lang, files)| (normalize_language(&lang), files))
                            .collect();
                        (id, langs)
                    })
                    .collect(),
                Err(e) => {
                    report.warn(format!(
                        "Invalid description mapping '{}': {}",
                        mapping_file.display(),
                        e
                    ));
                    BTreeMap::new()
                }
            },
            Err(e) => {
                tracing::debug!("No description mapping at {}: {}", mapping_file.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            dir: dir.to_path_buf(),
            mapping,
        }
    }

    /// Resolve the description of one resource
    pub fn resolve(&self, id: &str, inline: &Localized, report: &mut NormalizeReport) -> Localized {
        let mapped = self.mapping.contains_key(id);

        if !inline.is_empty() {
            if mapped {
                report.warn(format!(
                    "Description mapping for '{}' is shadowed by its inline description",
                    id
                ));
            }
            return inline.clone();
        }

        let by_convention = self.from_convention(id, report);
        if !by_convention.is_empty() {
            if mapped {
                report.warn(format!(
                    "Description mapping for '{}' is shadowed by {}_<lang>.html files",
                    id, id
                ));
            }
            return by_convention;
        }

        self.from_mapping(id, report)
    }

    fn from_convention(&self, id: &str, report: &mut NormalizeReport) -> Localized {
        let mut found = Localized::new();
        for lang in DESCRIPTION_LANGUAGES {
            let file = self.dir.join(format!("{}_{}.html", id, lang));
            if !file.is_file() {
                continue;
            }
            match std::fs::read_to_string(&file) {
                Ok(text) if !text.trim().is_empty() => found.insert(lang, text),
                Ok(_) => {}
                Err(e) => report.warn(format!("Failed to read description '{}': {}", file.display(), e)),
            }
        }
        found
    }

    fn from_mapping(&self, id: &str, report: &mut NormalizeReport) -> Localized {
        let mut found = Localized::new();
        let Some(langs) = self.mapping.get(id) else {
            return found;
        };

        for (lang, files) in langs {
            let mut parts = Vec::with_capacity(files.len());
            for name in files {
                let file = self.dir.join(name);
                match std::fs::read_to_string(&file) {
                    Ok(text) => parts.push(text),
                    Err(e) => report.warn(format!(
                        "Description file '{}' mapped for '{}' is unreadable: {}",
                        file.display(),
                        id,
                        e
                    )),
                }
            }
            let text = parts.join("\n");
            if !text.trim().is_empty() {
                found.insert(lang.clone(), text);
            }
        }
        found
    }
}

/// Map two-letter codes used in older mapping files to ISO 639-3
fn normalize_language(lang: &str) -> String {
    match lang {
        "sv" => "swe".to_string(),
        "en" => "eng".to_string(),
        other => other.to_string(),
    }
}
