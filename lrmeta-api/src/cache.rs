//! In-process metadata cache
//!
//! Holds the normalizer's published JSON documents keyed by [`CacheKey`].
//! Renewals compute every new value before taking the write lock, so readers
//! see either the old or the new value of a key, never a mix.
//!
//! Once [`MetadataCache::reload_all`] has succeeded, memory holds the whole
//! published state and a miss is answered without touching the disk. Before
//! that, misses read through to the output directory.
//!
//! In no-cache mode nothing is held in memory and every lookup reads the
//! output directory.

use lrmeta_common::model::is_valid_resource_id;
use lrmeta_common::{CacheKey, Error, Result, ResourceType};
use lrmeta_ingest::{NormalizeReport, OutputLayout};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct MetadataCache {
    layout: OutputLayout,
    no_cache: bool,
    entries: RwLock<HashMap<CacheKey, Arc<Value>>>,
    /// Set once a full load has populated `entries`
    complete: AtomicBool,
}

impl MetadataCache {
    pub fn new(layout: OutputLayout, no_cache: bool) -> Self {
        Self {
            layout,
            no_cache,
            entries: RwLock::new(HashMap::new()),
            complete: AtomicBool::new(false),
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn is_disk_mode(&self) -> bool {
        self.no_cache
    }

    /// Number of keys currently held in memory
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Look up one key, reading through to disk on a miss
    ///
    /// `Ok(None)` means the normalizer never published the key.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Arc<Value>>> {
        if !self.no_cache {
            if let Some(value) = self.entries.read().await.get(key) {
                return Ok(Some(Arc::clone(value)));
            }
            if self.complete.load(Ordering::Acquire) {
                return Ok(None);
            }
        }

        let Some(value) = self.load(key).await? else {
            return Ok(None);
        };
        let value = Arc::new(value);
        if !self.no_cache {
            debug!(key = %key, "Cache miss, loaded from disk");
            self.entries
                .write()
                .await
                .insert(key.clone(), Arc::clone(&value));
        }
        Ok(Some(value))
    }

    /// Flush everything and repopulate from the output directory
    pub async fn reload_all(&self) -> Result<usize> {
        if self.no_cache {
            return Ok(0);
        }

        let mut fresh: HashMap<CacheKey, Arc<Value>> = HashMap::new();
        for resource_type in ResourceType::ALL {
            let key = CacheKey::Aggregate(resource_type);
            if let Some(value) = self.load(&key).await? {
                fresh.insert(key, Arc::new(value));
            }
        }
        if let Some(ids) = self.load(&CacheKey::ResourceIds).await? {
            fresh.insert(CacheKey::ResourceIds, Arc::new(ids));
        }

        for id in self.published_documents().await? {
            let key = CacheKey::Resource(id);
            if let Some(value) = self.load(&key).await? {
                fresh.insert(key, Arc::new(value));
            }
        }
        for (id, text) in self.load_texts().await? {
            fresh.insert(CacheKey::Description(id), Arc::new(text));
        }

        let count = fresh.len();
        *self.entries.write().await = fresh;
        self.complete.store(true, Ordering::Release);
        info!(keys = count, "Cache repopulated");
        Ok(count)
    }

    /// Bring the cache in line with a finished normalizer run
    ///
    /// A full run flushes and repopulates; a partial run touches only the
    /// keys the run changed or removed.
    pub async fn apply_report(&self, report: &NormalizeReport) -> Result<()> {
        if self.no_cache {
            return Ok(());
        }
        if report.full {
            self.reload_all().await?;
            return Ok(());
        }

        let texts = if report
            .changed
            .iter()
            .any(|k| matches!(k, CacheKey::Description(_)))
        {
            self.load_texts().await?
        } else {
            Map::new()
        };

        let mut updates: Vec<(CacheKey, Arc<Value>)> = Vec::new();
        let mut removals: Vec<CacheKey> = report.removed.iter().cloned().collect();
        for key in &report.changed {
            let value = match key {
                CacheKey::Description(id) => texts.get(id).cloned(),
                other => self.load(other).await?,
            };
            match value {
                Some(value) => updates.push((key.clone(), Arc::new(value))),
                None => removals.push(key.clone()),
            }
        }

        let mut entries = self.entries.write().await;
        for key in &removals {
            entries.remove(key);
        }
        let updated = updates.len();
        entries.extend(updates);
        drop(entries);

        info!(updated, removed = removals.len(), "Cache updated from partial renewal");
        Ok(())
    }

    async fn load(&self, key: &CacheKey) -> Result<Option<Value>> {
        match key {
            CacheKey::Resource(id) | CacheKey::Description(id) if !is_valid_resource_id(id) => {
                Ok(None)
            }
            CacheKey::Description(id) => Ok(self.load_texts().await?.remove(id)),
            other => read_json(&self.layout.file_for(other)).await,
        }
    }

    async fn load_texts(&self) -> Result<Map<String, Value>> {
        match read_json(&self.layout.texts()).await? {
            Some(Value::Object(texts)) => Ok(texts),
            Some(_) => Err(Error::Internal(format!(
                "{} is not a JSON object",
                self.layout.texts().display()
            ))),
            None => Ok(Map::new()),
        }
    }

    async fn published_documents(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(self.layout.resources_dir()).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }
}

async fn read_json(path: &Path) -> Result<Option<Value>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn publish(layout: &OutputLayout, path: &Path, value: Value) {
        std::fs::create_dir_all(layout.resources_dir()).unwrap();
        std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_read_through_and_missing_key() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        publish(&layout, &layout.resource("saldo"), json!({"id": "saldo"}));
        let cache = MetadataCache::new(layout, false);

        let saldo = cache.get(&CacheKey::Resource("saldo".into())).await.unwrap();
        assert_eq!(saldo.unwrap()["id"], "saldo");
        assert_eq!(cache.len().await, 1);

        let missing = cache.get(&CacheKey::Resource("nope".into())).await.unwrap();
        assert!(missing.is_none());
        let escaped = cache.get(&CacheKey::Resource("../ids".into())).await.unwrap();
        assert!(escaped.is_none());
    }

    #[tokio::test]
    async fn test_no_cache_reads_disk_every_time() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        let path = layout.resource("saldo");
        publish(&layout, &path, json!({"version": 1}));
        let cache = MetadataCache::new(layout.clone(), true);

        let key = CacheKey::Resource("saldo".into());
        assert_eq!(cache.get(&key).await.unwrap().unwrap()["version"], 1);
        publish(&layout, &path, json!({"version": 2}));
        assert_eq!(cache.get(&key).await.unwrap().unwrap()["version"], 2);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_partial_report_updates_only_its_keys() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        publish(&layout, &layout.resource("saldo"), json!({"v": 1}));
        publish(&layout, &layout.resource("attasidor"), json!({"v": 1}));
        publish(&layout, &layout.texts(), json!({"attasidor": {"swe": "text"}}));
        let cache = MetadataCache::new(layout.clone(), false);
        cache.reload_all().await.unwrap();

        publish(&layout, &layout.resource("saldo"), json!({"v": 2}));
        publish(&layout, &layout.resource("attasidor"), json!({"v": 2}));
        let mut report = NormalizeReport::new(false);
        report.changed.insert(CacheKey::Resource("attasidor".into()));
        report.removed.insert(CacheKey::Description("attasidor".into()));
        cache.apply_report(&report).await.unwrap();

        let saldo = cache.get(&CacheKey::Resource("saldo".into())).await.unwrap();
        assert_eq!(saldo.unwrap()["v"], 1);
        let attasidor = cache.get(&CacheKey::Resource("attasidor".into())).await.unwrap();
        assert_eq!(attasidor.unwrap()["v"], 2);
    }

    #[tokio::test]
    async fn test_loaded_cache_answers_misses_from_memory() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        publish(&layout, &layout.resource("saldo"), json!({"id": "saldo"}));
        publish(&layout, &layout.texts(), json!({"attasidor": {"swe": "text"}}));
        let cache = MetadataCache::new(layout.clone(), false);
        cache.reload_all().await.unwrap();

        // saldo has no description; a later file change must not be read
        publish(&layout, &layout.texts(), json!({"saldo": {"swe": "late"}}));
        let description = cache.get(&CacheKey::Description("saldo".into())).await.unwrap();
        assert!(description.is_none());
        let attasidor = cache.get(&CacheKey::Description("attasidor".into())).await.unwrap();
        assert_eq!(attasidor.unwrap()["swe"], "text");
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        std::fs::write(layout.ids(), b"not json").unwrap();
        let cache = MetadataCache::new(layout, false);
        assert!(cache.get(&CacheKey::ResourceIds).await.is_err());
    }
}
