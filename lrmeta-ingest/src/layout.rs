//! File names of the normalizer output, shared with the API's disk reads

use lrmeta_common::{CacheKey, ResourceType};
use std::path::{Path, PathBuf};

pub const RESOURCES_DIR: &str = "resources";
pub const TEXTS_FILE: &str = "resource-texts.json";
pub const IDS_FILE: &str = "resource-ids.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const SNAPSHOT_FILE: &str = "records.json";

/// Locations of every output file below the static directory
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn aggregate(&self, resource_type: ResourceType) -> PathBuf {
        self.root.join(format!("{}.json", resource_type))
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.root.join(RESOURCES_DIR)
    }

    pub fn resource(&self, id: &str) -> PathBuf {
        self.resources_dir().join(format!("{}.json", id))
    }

    pub fn texts(&self) -> PathBuf {
        self.root.join(TEXTS_FILE)
    }

    pub fn ids(&self) -> PathBuf {
        self.root.join(IDS_FILE)
    }

    pub fn schema(&self) -> PathBuf {
        self.root.join(SCHEMA_FILE)
    }

    pub fn snapshot(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    /// File a cache key is loaded from; descriptions share one file
    pub fn file_for(&self, key: &CacheKey) -> PathBuf {
        match key {
            CacheKey::Aggregate(t) => self.aggregate(*t),
            CacheKey::Resource(id) => self.resource(id),
            CacheKey::Description(_) => self.texts(),
            CacheKey::ResourceIds => self.ids(),
        }
    }
}
