//! Resource model shared by the normalizer and the API
//!
//! Resource types, per-language strings, `type/id` resource paths and the
//! cache key naming scheme.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Resource type, one directory per type in the metadata store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Corpus,
    Lexicon,
    Model,
    Analysis,
    Utility,
    Collection,
}

impl ResourceType {
    /// All resource types, in output order
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Corpus,
        ResourceType::Lexicon,
        ResourceType::Model,
        ResourceType::Analysis,
        ResourceType::Utility,
        ResourceType::Collection,
    ];

    /// Singular name, also the store directory and aggregate file stem
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Corpus => "corpus",
            ResourceType::Lexicon => "lexicon",
            ResourceType::Model => "model",
            ResourceType::Analysis => "analysis",
            ResourceType::Utility => "utility",
            ResourceType::Collection => "collection",
        }
    }

    /// Plural name used by the legacy listing routes (`/corpora` etc.)
    pub fn legacy_name(&self) -> &'static str {
        match self {
            ResourceType::Corpus => "corpora",
            ResourceType::Lexicon => "lexicons",
            ResourceType::Model => "models",
            ResourceType::Analysis => "analyses",
            ResourceType::Utility => "utilities",
            ResourceType::Collection => "collections",
        }
    }

    /// Parse either the singular or the legacy plural name
    pub fn from_name(name: &str) -> Option<Self> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == name || t.legacy_name() == name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceType::from_name(s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown resource type: {}", s)))
    }
}

/// Check that a string is a three-letter lowercase ISO 639 code
pub fn is_language_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_lowercase())
}

/// Per-language strings, keyed by ISO 639-3 code (`eng`, `swe`, ...)
///
/// Null and blank values are dropped while deserializing, values are trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Option<String>>")]
pub struct Localized(BTreeMap<String, String>);

impl From<BTreeMap<String, Option<String>>> for Localized {
    fn from(raw: BTreeMap<String, Option<String>>) -> Self {
        let map = raw
            .into_iter()
            .filter_map(|(lang, value)| {
                let value = value?.trim().to_string();
                (!value.is_empty()).then_some((lang, value))
            })
            .collect();
        Localized(map)
    }
}

impl Localized {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0.get(lang).map(String::as_str)
    }

    pub fn insert(&mut self, lang: impl Into<String>, value: impl Into<String>) {
        self.0.insert(lang.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Drop entries whose key is not a language code, returning the dropped keys
    pub fn retain_valid(&mut self) -> Vec<String> {
        let invalid: Vec<String> = self
            .0
            .keys()
            .filter(|k| !is_language_code(k))
            .cloned()
            .collect();
        for key in &invalid {
            self.0.remove(key);
        }
        invalid
    }
}

impl FromIterator<(String, String)> for Localized {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Localized(iter.into_iter().collect())
    }
}

/// Check a resource ID: ASCII alphanumerics, `-`, `_` and `.`, never `..`
pub fn is_valid_resource_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 200
        && !id.contains("..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// A `type/id` pair naming one record in the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourcePath {
    pub resource_type: ResourceType,
    pub id: String,
}

impl ResourcePath {
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
        }
    }

    /// Parse a comma-separated list such as `corpus/attasidor,lexicon/saldo`
    pub fn parse_list(input: &str) -> Result<Vec<ResourcePath>> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for ResourcePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (type_name, id) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("Expected <type>/<id>, got '{}'", s)))?;
        let resource_type = ResourceType::from_str(type_name)?;
        if !is_valid_resource_id(id) {
            return Err(Error::InvalidInput(format!("Invalid resource ID: '{}'", id)));
        }
        Ok(ResourcePath::new(resource_type, id))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// Key naming for the cache layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// Aggregate listing of one resource type
    Aggregate(ResourceType),
    /// One resource document
    Resource(String),
    /// Long-form description of one resource
    Description(String),
    /// Sorted list of all resource IDs
    ResourceIds,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Aggregate(t) => write!(f, "aggregate:{}", t),
            CacheKey::Resource(id) => write!(f, "resource:{}", id),
            CacheKey::Description(id) => write!(f, "res_descr:{}", id),
            CacheKey::ResourceIds => f.write_str("resource-ids"),
        }
    }
}
