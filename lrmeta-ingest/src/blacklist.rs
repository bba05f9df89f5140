//! Records kept out of every published document

use lrmeta_common::config::TomlConfig;
use lrmeta_common::{ResourcePath, ResourceType};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: BTreeSet<ResourcePath>,
}

impl Blacklist {
    pub fn from_config(config: &TomlConfig) -> Self {
        let entries = ResourceType::ALL
            .into_iter()
            .flat_map(|t| {
                config
                    .blacklisted(t)
                    .iter()
                    .map(move |id| ResourcePath::new(t, id.clone()))
            })
            .collect();
        Self { entries }
    }

    pub fn contains(&self, path: &ResourcePath) -> bool {
        self.entries.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blacklist() {
        let blacklist = Blacklist::from_config(&TomlConfig::default());
        assert!(blacklist.contains(&"lexicon/blisschar".parse().unwrap()));
        assert!(blacklist.contains(&"lexicon/blissword".parse().unwrap()));
        assert!(!blacklist.contains(&"corpus/blisschar".parse().unwrap()));
        assert!(!blacklist.contains(&"lexicon/saldo".parse().unwrap()));
    }
}
