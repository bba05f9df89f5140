//! Published documents derived from the prepared records
//!
//! Derivation always covers the whole record set; the writer decides which
//! files actually change.

use crate::blacklist::Blacklist;
use crate::collections::Membership;
use crate::error::NormalizeResult;
use crate::record::PreparedRecord;
use crate::report::NormalizeReport;
use lrmeta_common::{Localized, ResourceType};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Everything the normalizer publishes, keyed for writing
#[derive(Debug, Clone, Default)]
pub struct DerivedOutput {
    /// Individual resource documents, blacklisted records excluded
    pub documents: BTreeMap<String, Value>,
    /// One `{resource_type, hits, resources}` listing per type
    pub aggregates: BTreeMap<ResourceType, Value>,
    /// Long-form descriptions by resource ID
    pub descriptions: BTreeMap<String, Localized>,
    /// Sorted IDs of every published resource
    pub ids: Vec<String>,
}

/// Derive every published document from `records`
pub fn derive(
    records: &BTreeMap<String, PreparedRecord>,
    blacklist: &Blacklist,
    report: &mut NormalizeReport,
) -> NormalizeResult<DerivedOutput> {
    let hidden: BTreeSet<String> = records
        .values()
        .filter(|r| blacklist.contains(&r.path))
        .map(|r| r.id().to_string())
        .collect();
    let membership = Membership::reconcile(records, &hidden, report);

    let mut output = DerivedOutput::default();
    for (id, prepared) in records {
        if hidden.contains(id) {
            continue;
        }

        for successor in &prepared.record.successors {
            if !records.contains_key(successor) {
                report.warn(format!("Successor '{}' of '{}' is not a known resource", successor, id));
            }
        }

        let document = build_document(prepared, records, &membership, report)?;
        output.documents.insert(id.clone(), document);
        if !prepared.description.is_empty() {
            output.descriptions.insert(id.clone(), prepared.description.clone());
        }
        output.ids.push(id.clone());
    }

    for resource_type in ResourceType::ALL {
        let listed: Vec<&Value> = records
            .iter()
            .filter(|(id, r)| !hidden.contains(*id) && !r.record.unlisted)
            .filter(|(_, r)| match resource_type {
                ResourceType::Collection => r.is_collection(),
                other => r.resource_type() == other,
            })
            .filter_map(|(id, _)| output.documents.get(id))
            .collect();

        let aggregate = json!({
            "resource_type": resource_type.as_str(),
            "hits": listed.len(),
            "resources": listed,
        });
        output.aggregates.insert(resource_type, aggregate);
    }

    Ok(output)
}

fn build_document(
    prepared: &PreparedRecord,
    records: &BTreeMap<String, PreparedRecord>,
    membership: &Membership,
    report: &mut NormalizeReport,
) -> NormalizeResult<Value> {
    let id = prepared.id();
    let mut document = match serde_json::to_value(&prepared.record).map_err(lrmeta_common::Error::from)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    document.remove("description");
    document.insert("id".to_string(), json!(id));
    document.insert("type".to_string(), json!(prepared.resource_type().as_str()));
    document.insert("has_description".to_string(), json!(!prepared.description.is_empty()));

    match membership.collections_of(id) {
        Some(collections) if !collections.is_empty() => {
            document.insert("in_collections".to_string(), json!(collections));
        }
        _ => {
            document.remove("in_collections");
        }
    }

    if prepared.is_collection() {
        let members = membership.members_of(id).cloned().unwrap_or_default();

        let own_size = &prepared.record.size;
        let mut size: BTreeMap<String, u64> = own_size.clone();
        for member in &members {
            let Some(member_record) = records.get(member) else {
                continue;
            };
            for (key, value) in &member_record.record.size {
                if key == "resources" || own_size.contains_key(key) {
                    continue;
                }
                let total = size.entry(key.clone()).or_insert(0);
                *total = match total.checked_add(*value) {
                    Some(sum) => sum,
                    None => {
                        report.warn(format!(
                            "Size '{}' of collection '{}' overflows, capping at {}",
                            key,
                            id,
                            u64::MAX
                        ));
                        u64::MAX
                    }
                };
            }
        }
        size.insert("resources".to_string(), members.len() as u64);

        document.insert("collection".to_string(), json!(true));
        document.insert("resources".to_string(), json!(members));
        document.insert("size".to_string(), json!(size));
    }

    Ok(Value::Object(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceRecord;
    use lrmeta_common::config::TomlConfig;
    use lrmeta_common::ResourcePath;

    fn prepared(path: &str, edit: impl FnOnce(&mut SourceRecord)) -> (String, PreparedRecord) {
        let path: ResourcePath = path.parse().unwrap();
        let mut record = SourceRecord::default();
        record.name.insert("eng", path.id.clone());
        edit(&mut record);
        (
            path.id.clone(),
            PreparedRecord {
                source: format!("{}.yaml", path),
                path,
                record,
                description: Localized::new(),
            },
        )
    }

    #[test]
    fn test_unlisted_only_fetchable_individually() {
        let records: BTreeMap<_, _> = [
            prepared("corpus/public", |_| {}),
            prepared("corpus/hidden", |r| r.unlisted = true),
        ]
        .into();
        let mut report = NormalizeReport::default();
        let output = derive(&records, &Blacklist::default(), &mut report).unwrap();

        let corpora = &output.aggregates[&ResourceType::Corpus];
        assert_eq!(corpora["hits"], 1);
        assert_eq!(corpora["resources"][0]["id"], "public");
        assert!(output.documents.contains_key("hidden"));
        assert_eq!(output.ids, vec!["hidden", "public"]);
    }

    #[test]
    fn test_collection_size_aggregates_members() {
        let records: BTreeMap<_, _> = [
            prepared("collection/news", |r| {
                r.size.insert("sentences".into(), 7);
            }),
            prepared("corpus/gp2001", |r| {
                r.in_collections = vec!["news".into()];
                r.size.insert("tokens".into(), 100);
                r.size.insert("sentences".into(), 10);
            }),
            prepared("corpus/gp2002", |r| {
                r.in_collections = vec!["news".into()];
                r.size.insert("tokens".into(), 50);
            }),
        ]
        .into();
        let mut report = NormalizeReport::default();
        let output = derive(&records, &Blacklist::default(), &mut report).unwrap();

        let news = &output.documents["news"];
        assert_eq!(news["resources"], json!(["gp2001", "gp2002"]));
        assert_eq!(news["size"], json!({"resources": 2, "sentences": 7, "tokens": 150}));
        assert_eq!(news["collection"], json!(true));
        assert_eq!(output.documents["gp2001"]["in_collections"], json!(["news"]));
        assert_eq!(output.aggregates[&ResourceType::Collection]["hits"], 1);
    }

    #[test]
    fn test_collection_size_saturates_on_overflow() {
        let records: BTreeMap<_, _> = [
            prepared("collection/kids-corpora", |_| {}),
            prepared("corpus/huge", |r| {
                r.in_collections = vec!["kids-corpora".into()];
                r.size.insert("tokens".into(), u64::MAX);
            }),
            prepared("corpus/small", |r| {
                r.in_collections = vec!["kids-corpora".into()];
                r.size.insert("tokens".into(), 1);
            }),
        ]
        .into();
        let mut report = NormalizeReport::default();
        let output = derive(&records, &Blacklist::default(), &mut report).unwrap();

        let size = &output.documents["kids-corpora"]["size"];
        assert_eq!(size["tokens"], json!(u64::MAX));
        assert_eq!(size["resources"], 2);
        assert!(report.warnings.iter().any(|w| w.contains("overflows")));
    }

    #[test]
    fn test_blacklisted_records_are_not_published() {
        let records: BTreeMap<_, _> = [
            prepared("lexicon/blisschar", |_| {}),
            prepared("lexicon/saldo", |r| r.successors = vec!["blisschar".into(), "gone".into()]),
        ]
        .into();
        let blacklist = Blacklist::from_config(&TomlConfig::default());
        let mut report = NormalizeReport::default();
        let output = derive(&records, &blacklist, &mut report).unwrap();

        assert!(!output.documents.contains_key("blisschar"));
        assert_eq!(output.ids, vec!["saldo"]);
        assert_eq!(output.aggregates[&ResourceType::Lexicon]["hits"], 1);
        // only the unknown successor is reported
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_has_description_and_description_removed() {
        let records: BTreeMap<_, _> = [prepared("corpus/suc", |_| {})].into();
        let mut records = records;
        if let Some(suc) = records.get_mut("suc") {
            suc.description.insert("swe", "<p>SUC</p>");
        }
        let mut report = NormalizeReport::default();
        let output = derive(&records, &Blacklist::default(), &mut report).unwrap();

        assert_eq!(output.documents["suc"]["has_description"], json!(true));
        assert!(output.documents["suc"].get("description").is_none());
        assert_eq!(output.descriptions["suc"].get("swe"), Some("<p>SUC</p>"));
    }
}
