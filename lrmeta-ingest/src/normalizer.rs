//! Normalizer run orchestration
//!
//! A full run re-reads the whole store. A partial run starts from the record
//! snapshot of the previous run, re-reads only the requested paths and then
//! derives and writes like a full run; the writer leaves every file whose
//! content did not change untouched.

use crate::blacklist::Blacklist;
use crate::descriptions::DescriptionSource;
use crate::documents::{derive, DerivedOutput};
use crate::downloads::DownloadProber;
use crate::error::NormalizeResult;
use crate::layout::OutputLayout;
use crate::localizations::Localizations;
use crate::record::{PreparedRecord, RecordParser};
use crate::report::NormalizeReport;
use crate::scanner::{RecordScanner, SourceFile};
use crate::schema::{adapt_schema, load_schema, SchemaValidator};
use crate::writer::{remove_output, write_json_if_changed};
use lrmeta_common::config::TomlConfig;
use lrmeta_common::{CacheKey, Localized, ResourcePath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Per-run switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Log every record as it is processed
    pub debug: bool,
    /// Skip HEAD requests for download metadata
    pub offline: bool,
    /// Validate records against the JSON schema
    pub validate: bool,
}

/// Parsed records of the last run, the starting point of partial runs
#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    records: BTreeMap<String, PreparedRecord>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    records: &'a BTreeMap<String, PreparedRecord>,
}

/// Lookup tables loaded once per run
struct RunContext {
    localizations: Localizations,
    descriptions: DescriptionSource,
    validator: Option<SchemaValidator>,
}

pub struct Normalizer {
    config: TomlConfig,
    options: NormalizeOptions,
    prober: DownloadProber,
}

impl Normalizer {
    pub fn new(config: TomlConfig, options: NormalizeOptions) -> Self {
        Self {
            config,
            options,
            prober: DownloadProber::new(),
        }
    }

    pub fn options(&self) -> NormalizeOptions {
        self.options
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.config.static_dir)
    }

    /// Run over the whole store (`scope == None`) or the given paths
    ///
    /// Only an unreadable store or unwritable output fails the run; problems
    /// with single records end up in the report.
    pub async fn run(&self, scope: Option<&[ResourcePath]>) -> NormalizeResult<NormalizeReport> {
        let scanner = RecordScanner::new(self.config.yaml_root());
        scanner.check_store()?;
        let layout = self.layout();

        let (mut report, records) = match scope {
            Some(paths) => match self.load_snapshot(&layout) {
                Some(snapshot) => {
                    let mut report = NormalizeReport::new(false);
                    let context = self.load_context(&mut report);
                    let records = self
                        .collect_partial(&scanner, &context, paths, snapshot.records, &mut report)
                        .await;
                    (report, records)
                }
                None => {
                    let mut report = NormalizeReport::new(true);
                    report.warn("No record snapshot from a previous run, running a full renewal instead");
                    let context = self.load_context(&mut report);
                    let records = self.collect_full(&scanner, &context, &mut report).await?;
                    (report, records)
                }
            },
            None => {
                let mut report = NormalizeReport::new(true);
                let context = self.load_context(&mut report);
                let records = self.collect_full(&scanner, &context, &mut report).await?;
                (report, records)
            }
        };

        let blacklist = Blacklist::from_config(&self.config);
        let output = derive(&records, &blacklist, &mut report)?;
        self.write_outputs(&layout, &records, &output, &mut report)?;

        info!(
            full = report.full,
            processed = report.processed,
            skipped = report.skipped,
            warnings = report.warnings.len(),
            changed = report.changed.len(),
            removed = report.removed.len(),
            "Normalizer run complete"
        );
        Ok(report)
    }

    fn load_context(&self, report: &mut NormalizeReport) -> RunContext {
        let validator = if self.options.validate || self.config.validate {
            SchemaValidator::load(&self.config.schema_path(), report)
        } else {
            None
        };
        RunContext {
            localizations: Localizations::load(&self.config.localizations_root(), report),
            descriptions: DescriptionSource::load(
                &self.config.descriptions_root(),
                &self.config.description_mapping_path(),
                report,
            ),
            validator,
        }
    }

    fn load_snapshot(&self, layout: &OutputLayout) -> Option<Snapshot> {
        let path = layout.snapshot();
        let content = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn collect_full(
        &self,
        scanner: &RecordScanner,
        context: &RunContext,
        report: &mut NormalizeReport,
    ) -> NormalizeResult<BTreeMap<String, PreparedRecord>> {
        let files = scanner.scan(report)?;
        let mut records: BTreeMap<String, PreparedRecord> = BTreeMap::new();

        for source in files {
            if let Some(existing) = records.get(&source.path.id) {
                report.warn(format!(
                    "Duplicate resource ID '{}' in '{}', already defined by '{}'",
                    source.path.id, source.path, existing.path
                ));
                report.skipped += 1;
                continue;
            }
            if let Some(prepared) = self.prepare(context, &source, report).await {
                records.insert(prepared.id().to_string(), prepared);
            }
        }
        Ok(records)
    }

    async fn collect_partial(
        &self,
        scanner: &RecordScanner,
        context: &RunContext,
        paths: &[ResourcePath],
        mut records: BTreeMap<String, PreparedRecord>,
        report: &mut NormalizeReport,
    ) -> BTreeMap<String, PreparedRecord> {
        let unique: BTreeSet<&ResourcePath> = paths.iter().collect();

        for path in unique {
            let file = scanner.locate(path);
            let owned_here = records.get(&path.id).map(|r| r.path == *path).unwrap_or(false);

            if !file.is_file() {
                if owned_here {
                    info!(resource = %path, "Source file removed, dropping record");
                    records.remove(&path.id);
                } else {
                    debug!(resource = %path, "No source file and no record, nothing to do");
                }
                continue;
            }

            if let Some(existing) = records.get(&path.id).filter(|r| r.path != *path) {
                if scanner.locate(&existing.path).is_file() {
                    let source_name = format!("{}/{}.yaml", path.resource_type, path.id);
                    if existing.source < source_name {
                        report.warn(format!(
                            "Duplicate resource ID '{}' in '{}', already defined by '{}'",
                            path.id, path, existing.path
                        ));
                        report.skipped += 1;
                        continue;
                    }
                    report.warn(format!(
                        "Duplicate resource ID '{}' in '{}', now defined by '{}'",
                        path.id, existing.path, path
                    ));
                }
            }

            let source = SourceFile {
                path: path.clone(),
                file,
            };
            match self.prepare(context, &source, report).await {
                Some(prepared) => {
                    records.insert(path.id.clone(), prepared);
                }
                None => {
                    if owned_here {
                        records.remove(&path.id);
                    }
                }
            }
        }
        records
    }

    /// Parse one record and resolve everything that needs the outside world
    async fn prepare(
        &self,
        context: &RunContext,
        source: &SourceFile,
        report: &mut NormalizeReport,
    ) -> Option<PreparedRecord> {
        let parser = RecordParser {
            localizations: &context.localizations,
            validator: context.validator.as_ref(),
            debug: self.options.debug,
        };
        let Some(mut prepared) = parser.parse(source, report) else {
            report.skipped += 1;
            return None;
        };
        report.processed += 1;

        let inline = std::mem::take(&mut prepared.record.description);
        prepared.description = context.descriptions.resolve(&source.path.id, &inline, report);

        if !self.options.offline {
            self.prober
                .fill_downloads(&source.path.id, &mut prepared.record.downloads, report)
                .await;
        }
        Some(prepared)
    }

    fn write_outputs(
        &self,
        layout: &OutputLayout,
        records: &BTreeMap<String, PreparedRecord>,
        output: &DerivedOutput,
        report: &mut NormalizeReport,
    ) -> NormalizeResult<()> {
        for (resource_type, aggregate) in &output.aggregates {
            if write_json_if_changed(&layout.aggregate(*resource_type), aggregate)? {
                report.mark_changed(CacheKey::Aggregate(*resource_type));
            }
        }

        for (id, document) in &output.documents {
            if write_json_if_changed(&layout.resource(id), document)? {
                report.mark_changed(CacheKey::Resource(id.clone()));
            }
        }
        self.remove_stale_documents(layout, output, report)?;

        let previous_texts: BTreeMap<String, Localized> = std::fs::read(layout.texts())
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        write_json_if_changed(&layout.texts(), &output.descriptions)?;
        let text_ids: BTreeSet<&String> = previous_texts.keys().chain(output.descriptions.keys()).collect();
        for id in text_ids {
            match (previous_texts.get(id), output.descriptions.get(id)) {
                (old, Some(new)) if old != Some(new) => {
                    report.mark_changed(CacheKey::Description(id.clone()))
                }
                (Some(_), None) => report.mark_removed(CacheKey::Description(id.clone())),
                _ => {}
            }
        }

        if write_json_if_changed(&layout.ids(), &output.ids)? {
            report.mark_changed(CacheKey::ResourceIds);
        }

        match load_schema(&self.config.schema_path()) {
            Ok(schema) => {
                write_json_if_changed(&layout.schema(), &adapt_schema(schema))?;
            }
            Err(e) => report.warn(format!("Schema not published: {}", e)),
        }

        write_json_if_changed(&layout.snapshot(), &SnapshotRef { records })?;
        Ok(())
    }

    fn remove_stale_documents(
        &self,
        layout: &OutputLayout,
        output: &DerivedOutput,
        report: &mut NormalizeReport,
    ) -> NormalizeResult<()> {
        let Ok(entries) = std::fs::read_dir(layout.resources_dir()) else {
            return Ok(());
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if output.documents.contains_key(&id) {
                continue;
            }
            if remove_output(&path)? {
                info!(resource = %id, "Removed stale resource document");
                report.mark_removed(CacheKey::Resource(id));
            }
        }
        Ok(())
    }
}
