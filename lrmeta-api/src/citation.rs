//! BibTeX `@misc` entries for published resources

use chrono::{Datelike, Utc};
use lrmeta_common::config::CitationConfig;
use serde_json::Value;

/// Build the citation of one resource document
///
/// Fails only when the document carries no usable name.
pub fn bibtex(document: &Value, config: &CitationConfig) -> Result<String, String> {
    let id = str_field(document, "id").ok_or("Resource has no ID")?;

    let title = ["eng", "swe"]
        .iter()
        .filter_map(|lang| document["name"].get(lang).and_then(Value::as_str))
        .find(|name| !name.trim().is_empty())
        .ok_or_else(|| format!("Resource '{}' has no name", id))?;

    let base_url = match str_field(document, "type") {
        Some("analysis") | Some("utility") => &config.analysis_url,
        _ => &config.resource_url,
    };

    let creators = string_list(document, "creators");
    let author = if creators.is_empty() {
        config.publisher.clone()
    } else {
        creators.join(" and ")
    };

    let mut keywords = vec![config.keyword.clone()];
    keywords.extend(string_list(document, "keywords"));

    let language = document["languages"]
        .as_array()
        .map(|languages| {
            languages
                .iter()
                .filter_map(|l| l.get("code").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    let year = ["updated", "created"]
        .iter()
        .filter_map(|field| str_field(document, field))
        .find_map(|date| date.get(..4))
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().year().to_string());

    Ok(format!(
        "@misc{{{id},\n  doi =  {{{doi}}},\n  url = {{{base_url}{id}}},\n  author = {{{author}}},\n  keywords = {{{keywords}}},\n  language = {{{language}}},\n  title = {{{title}}},\n  publisher = {{{publisher}}},\n  year = {{{year}}}\n}}",
        id = id,
        doi = str_field(document, "doi").unwrap_or_default(),
        base_url = base_url,
        author = author,
        keywords = keywords.join(", "),
        language = language,
        title = title,
        publisher = config.publisher,
        year = year,
    ))
}

fn str_field<'a>(document: &'a Value, field: &str) -> Option<&'a str> {
    document.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn string_list(document: &Value, field: &str) -> Vec<String> {
    document[field]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
