//! Concept catalog types.
//!
//! A catalog is the per-dataset map of root concepts published by the remote
//! service: `{"dataset1.icd": {"label": ..., "tables": [...], ...}, ...}`.
//! Only the fields used for construction, translation and label lookup are
//! modelled; unknown keys are ignored on deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{ConqueryId, DatasetRules};

/// Per-dataset map from root-concept identifier to its descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    concepts: BTreeMap<String, ConceptDescriptor>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a catalog from its JSON form.
    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Adds or replaces a root concept.
    pub fn insert(&mut self, root_concept_id: impl Into<String>, concept: ConceptDescriptor) {
        self.concepts.insert(root_concept_id.into(), concept);
    }

    /// Looks up a root concept by identifier.
    pub fn get(&self, root_concept_id: &ConqueryId) -> Option<&ConceptDescriptor> {
        self.concepts.get(&root_concept_id.to_string())
    }

    /// Returns true if the root concept is a key of this catalog.
    pub fn contains_concept(&self, root_concept_id: &ConqueryId) -> bool {
        self.concepts.contains_key(&root_concept_id.to_string())
    }

    /// The dataset named by the first key, if any.
    pub fn dataset(&self, rules: &DatasetRules) -> Option<String> {
        let first = self.concepts.keys().next()?;
        let id = ConqueryId::parse_with(first, rules).ok()?;
        id.dataset().map(str::to_string)
    }

    /// Keeps only entries flagged `active`.
    pub fn retain_active(&mut self) {
        self.concepts
            .retain(|_, concept| concept.active.unwrap_or(false));
    }

    /// Iterates over `(root_concept_id, descriptor)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConceptDescriptor)> {
        self.concepts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of root concepts.
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    /// Returns true if the catalog has no concepts.
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

impl FromIterator<(String, ConceptDescriptor)> for Catalog {
    fn from_iter<T: IntoIterator<Item = (String, ConceptDescriptor)>>(iter: T) -> Self {
        Self {
            concepts: iter.into_iter().collect(),
        }
    }
}

/// A root concept entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDescriptor {
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Whether the concept is selectable (structure nodes are inactive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// First-level child concept ids.
    #[serde(default)]
    pub children: Vec<String>,
    /// Tables (connectors) of the concept.
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,
    /// Concept-level selects.
    #[serde(default)]
    pub selects: Vec<SelectDescriptor>,
}

impl ConceptDescriptor {
    /// The table whose connector is the same id as `connector_id`.
    pub fn table(&self, connector_id: &ConqueryId) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|table| matches_id(&table.connector_id, connector_id))
    }

    /// Returns true if `id` is listed among the first-level children.
    pub fn has_child(&self, id: &ConqueryId) -> bool {
        self.children.iter().any(|child| matches_id(child, id))
    }

    /// The concept-level select with the same id, if any.
    pub fn select(&self, select_id: &ConqueryId) -> Option<&SelectDescriptor> {
        self.selects.iter().find(|s| matches_id(&s.id, select_id))
    }
}

/// A table (connector) of a concept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    /// Table id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Connector id used by query tables.
    pub connector_id: String,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Selectable validity-date columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_column: Option<DateColumnDescriptor>,
    /// Connector-level selects.
    #[serde(default)]
    pub selects: Vec<SelectDescriptor>,
    /// Filters.
    #[serde(default)]
    pub filters: Vec<FilterDescriptor>,
}

impl TableDescriptor {
    /// Parses the connector id, if well formed.
    pub fn connector(&self, rules: &DatasetRules) -> Option<ConqueryId> {
        ConqueryId::parse_with(&self.connector_id, rules).ok()
    }

    /// The connector-level select with the same id, if any.
    pub fn select(&self, select_id: &ConqueryId) -> Option<&SelectDescriptor> {
        self.selects.iter().find(|s| matches_id(&s.id, select_id))
    }

    /// The filter with the same id, if any.
    pub fn filter(&self, filter_id: &ConqueryId) -> Option<&FilterDescriptor> {
        self.filters.iter().find(|f| matches_id(&f.id, filter_id))
    }

    /// The date-column option with the same value, if any.
    pub fn date_option(&self, date_id: &ConqueryId) -> Option<&DateColumnOption> {
        self.date_column
            .as_ref()?
            .options
            .iter()
            .find(|o| matches_id(&o.value, date_id))
    }
}

/// Date-column choices of a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateColumnDescriptor {
    /// Preselected option value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Available options.
    #[serde(default)]
    pub options: Vec<DateColumnOption>,
}

/// One date-column option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateColumnOption {
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Date-column id.
    pub value: String,
}

/// A concept- or connector-level select.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectDescriptor {
    /// Select id.
    pub id: String,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A connector filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Filter id.
    pub id: String,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Filter kind, e.g. `INTEGER_RANGE` or `MULTI_SELECT`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
    /// Unit of the filtered value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// Catalog lookups happen after ids were moved to the catalog's dataset, so a
// dotted match is exact; a dataset-less id matches an entry one segment longer.
fn matches_id(raw: &str, id: &ConqueryId) -> bool {
    let dotted = id.to_string();
    if raw == dotted {
        return true;
    }
    if id.has_dataset_prefix() {
        return false;
    }
    raw.strip_suffix(dotted.as_str())
        .and_then(|head| head.strip_suffix('.'))
        .is_some_and(|dataset| !dataset.is_empty() && !dataset.contains('.'))
}
