use serde::{Deserialize, Serialize};

use super::intent::Intent;
pub use crate::db::models::MetadataFilter;

/// Retrieval parameters derived from an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSpec {
    pub k: usize,
    #[serde(default, skip_serializing_if = "MetadataFilter::is_empty")]
    pub filter: MetadataFilter,
}

impl RetrievalSpec {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            filter: MetadataFilter::default(),
        }
    }

    /// Narrow this entry with caller overrides; the table entry is untouched.
    #[must_use]
    pub fn with_overrides(&self, k: Option<usize>, filter: &MetadataFilter) -> RetrievalSpec {
        RetrievalSpec {
            k: k.filter(|k| *k > 0).unwrap_or(self.k),
            filter: self.filter.merged(filter),
        }
    }
}

fn default_file() -> RetrievalSpec {
    RetrievalSpec::new(3)
}

fn default_how() -> RetrievalSpec {
    RetrievalSpec::new(6)
}

fn default_why() -> RetrievalSpec {
    RetrievalSpec::new(6)
}

fn default_explain() -> RetrievalSpec {
    RetrievalSpec::new(8)
}

fn default_default() -> RetrievalSpec {
    RetrievalSpec::new(5)
}

/// Intent → [`RetrievalSpec`] table. `file` favours precision; `how`, `why` and
/// `explain` favour coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalTable {
    #[serde(default = "default_file")]
    pub file: RetrievalSpec,

    #[serde(default = "default_how")]
    pub how: RetrievalSpec,

    #[serde(default = "default_why")]
    pub why: RetrievalSpec,

    #[serde(default = "default_explain")]
    pub explain: RetrievalSpec,

    #[serde(default = "default_default")]
    pub default: RetrievalSpec,
}

impl Default for RetrievalTable {
    fn default() -> Self {
        Self {
            file: default_file(),
            how: default_how(),
            why: default_why(),
            explain: default_explain(),
            default: default_default(),
        }
    }
}

impl RetrievalTable {
    pub fn get(&self, intent: Intent) -> &RetrievalSpec {
        match intent {
            Intent::File => &self.file,
            Intent::How => &self.how,
            Intent::Why => &self.why,
            Intent::Explain => &self.explain,
            Intent::Default => &self.default,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (Intent, &RetrievalSpec)> {
        Intent::ALL.into_iter().map(|intent| (intent, self.get(intent)))
    }
}

/// Pure lookup from intent to retrieval spec.
#[derive(Debug, Clone, Default)]
pub struct RetrievalTuner {
    table: RetrievalTable,
}

impl RetrievalTuner {
    pub fn new(table: RetrievalTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RetrievalTable {
        &self.table
    }

    pub fn tune(&self, intent: Intent) -> RetrievalSpec {
        self.table.get(intent).clone()
    }
}
