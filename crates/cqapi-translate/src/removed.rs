//! Identifiers dropped during translation.
//!
//! Every id that has no counterpart in the target catalog is recorded with
//! the kind of element it named. The collection is a multiset: the same id
//! can be dropped from two branches of one tree and is then listed twice.

use std::collections::HashSet;
use std::fmt;

use cqapi_query::{Catalog, ConqueryId};
use serde::Serialize;
use tracing::debug;

use crate::error::{TranslateError, TranslateResult};

/// Kind of element a removed identifier named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovedKind {
    /// A concept or child concept id of a concept element.
    Concept,
    /// A concept-level select.
    ConceptSelect,
    /// A table, named by its connector.
    Connector,
    /// A connector-level select.
    ConnectorSelect,
    /// A filter clause.
    Filter,
    /// A validity-date column.
    Date,
}

impl RemovedKind {
    /// Snake-case name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovedKind::Concept => "concept",
            RemovedKind::ConceptSelect => "concept_select",
            RemovedKind::Connector => "connector",
            RemovedKind::ConnectorSelect => "connector_select",
            RemovedKind::Filter => "filter",
            RemovedKind::Date => "date",
        }
    }
}

impl fmt::Display for RemovedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dropped identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemovedIdentifier {
    /// The identifier as it appeared in the original tree.
    pub id: ConqueryId,
    /// What it named.
    pub kind: RemovedKind,
}

impl RemovedIdentifier {
    /// Creates a record.
    pub fn new(id: ConqueryId, kind: RemovedKind) -> Self {
        Self { id, kind }
    }

    /// Looks up display labels for this record in `catalog`.
    ///
    /// Fails with [`TranslateError::UnresolvableIdentifier`] if the root
    /// concept, the connector, or the select/filter/date entry is missing.
    pub fn resolve(&self, catalog: &Catalog) -> TranslateResult<ResolvedLabel> {
        let unresolvable = || TranslateError::UnresolvableIdentifier(self.id.to_string());

        let root = self.id.root_concept_id()?;
        let concept = catalog.get(&root).ok_or_else(unresolvable)?;
        let mut resolved = ResolvedLabel {
            kind: self.kind,
            concept: concept.label.clone().unwrap_or_else(|| root.to_string()),
            connector: None,
            label: None,
        };

        match self.kind {
            RemovedKind::Concept => {
                let below_root = self.id.path().get(1..).unwrap_or(&[]);
                if !below_root.is_empty() {
                    resolved.concept = format!("{} - {}", resolved.concept, below_root.join(" - "));
                }
            }
            RemovedKind::ConceptSelect => {
                let select = concept.select(&self.id).ok_or_else(unresolvable)?;
                resolved.label = select.label.clone();
            }
            RemovedKind::Connector => {
                let table = concept.table(&self.id).ok_or_else(unresolvable)?;
                resolved.connector = table.label.clone();
            }
            RemovedKind::ConnectorSelect | RemovedKind::Filter | RemovedKind::Date => {
                let table = concept
                    .table(&self.id.connector_id()?)
                    .ok_or_else(unresolvable)?;
                resolved.connector = table.label.clone();
                resolved.label = match self.kind {
                    RemovedKind::ConnectorSelect => {
                        table.select(&self.id).ok_or_else(unresolvable)?.label.clone()
                    }
                    RemovedKind::Filter => {
                        table.filter(&self.id).ok_or_else(unresolvable)?.label.clone()
                    }
                    _ => table.date_option(&self.id).ok_or_else(unresolvable)?.label.clone(),
                };
            }
        }

        Ok(resolved)
    }
}

/// Human-readable description of a removed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLabel {
    /// Kind of the removed element.
    pub kind: RemovedKind,
    /// Concept label; child concepts carry their path below the root.
    pub concept: String,
    /// Table label, for everything below a connector.
    pub connector: Option<String>,
    /// Label of the select, filter or date column itself.
    pub label: Option<String>,
}

/// Ordered multiset of removed identifiers.
///
/// Equality ignores order and multiplicity.
#[derive(Debug, Clone, Default)]
pub struct RemovedIdentifiers {
    records: Vec<RemovedIdentifier>,
}

impl RemovedIdentifiers {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dropped identifier.
    pub fn add(&mut self, id: ConqueryId, kind: RemovedKind) {
        debug!(id = %id, kind = kind.as_str(), "identifier removed");
        self.records.push(RemovedIdentifier::new(id, kind));
    }

    /// Appends every record of `other`.
    pub fn merge(&mut self, other: RemovedIdentifiers) {
        self.records.extend(other.records);
    }

    /// Number of records, duplicates included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RemovedIdentifier> {
        self.records.iter()
    }

    /// Ids recorded with the given kind, in insertion order.
    pub fn of_kind(&self, kind: RemovedKind) -> Vec<&ConqueryId> {
        self.records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| &r.id)
            .collect()
    }

    /// Returns true if `id` was recorded with `kind`.
    pub fn contains(&self, id: &ConqueryId, kind: RemovedKind) -> bool {
        self.records.iter().any(|r| r.kind == kind && &r.id == id)
    }

    /// Resolves every record against `catalog`.
    pub fn resolve_labels(&self, catalog: &Catalog) -> TranslateResult<Vec<ResolvedLabel>> {
        self.records.iter().map(|r| r.resolve(catalog)).collect()
    }
}

impl PartialEq for RemovedIdentifiers {
    fn eq(&self, other: &Self) -> bool {
        let ours: HashSet<&RemovedIdentifier> = self.records.iter().collect();
        let theirs: HashSet<&RemovedIdentifier> = other.records.iter().collect();
        ours == theirs
    }
}

impl Eq for RemovedIdentifiers {}

impl FromIterator<RemovedIdentifier> for RemovedIdentifiers {
    fn from_iter<T: IntoIterator<Item = RemovedIdentifier>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RemovedIdentifiers {
    type Item = &'a RemovedIdentifier;
    type IntoIter = std::slice::Iter<'a, RemovedIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> ConqueryId {
        ConqueryId::parse(s).unwrap()
    }

    fn catalog() -> Catalog {
        Catalog::from_json(json!({
            "dataset1.icd": {
                "label": "ICD",
                "selects": [{"id": "dataset1.icd.exists", "label": "ICD vorhanden"}],
                "tables": [{
                    "connectorId": "dataset1.icd.kh_diagnose_icd_code",
                    "label": "KH-Fall",
                    "dateColumn": {"options": [
                        {"label": "Entlassungsdatum",
                         "value": "dataset1.icd.kh_diagnose_icd_code.entlassungsdatum"}
                    ]},
                    "selects": [{"id": "dataset1.icd.kh_diagnose_icd_code.test", "label": "Test"}],
                    "filters": [{"id": "dataset1.icd.kh_diagnose_icd_code.diagnoseart",
                                 "label": "Diagnoseart"}]
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_multiset_with_set_equality() {
        let mut a = RemovedIdentifiers::new();
        a.add(id("dataset1.icd.exists"), RemovedKind::ConceptSelect);
        a.add(id("dataset1.icd.exists"), RemovedKind::ConceptSelect);
        a.add(id("dataset1.alter"), RemovedKind::Concept);

        let b: RemovedIdentifiers = vec![
            RemovedIdentifier::new(id("dataset1.alter"), RemovedKind::Concept),
            RemovedIdentifier::new(id("dataset1.icd.exists"), RemovedKind::ConceptSelect),
        ]
        .into_iter()
        .collect();

        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_kind_distinguishes_records() {
        let mut a = RemovedIdentifiers::new();
        a.add(id("dataset1.icd.au_fall"), RemovedKind::Connector);
        let mut b = RemovedIdentifiers::new();
        b.add(id("dataset1.icd.au_fall"), RemovedKind::Concept);
        assert_ne!(a, b);
    }

    #[test]
    fn test_merge_and_of_kind() {
        let mut a = RemovedIdentifiers::new();
        a.add(id("dataset1.icd.a"), RemovedKind::Concept);
        let mut b = RemovedIdentifiers::new();
        b.add(id("dataset1.icd.kh_diagnose_icd_code.test"), RemovedKind::ConnectorSelect);
        b.add(id("dataset1.icd.b"), RemovedKind::Concept);
        a.merge(b);

        assert_eq!(a.len(), 3);
        assert_eq!(
            a.of_kind(RemovedKind::Concept),
            vec![&id("dataset1.icd.a"), &id("dataset1.icd.b")]
        );
        assert!(a.contains(
            &id("dataset1.icd.kh_diagnose_icd_code.test"),
            RemovedKind::ConnectorSelect
        ));
    }

    #[test]
    fn test_resolve_labels() {
        let removed: RemovedIdentifiers = vec![
            RemovedIdentifier::new(id("dataset1.icd.c00-d48.c00"), RemovedKind::Concept),
            RemovedIdentifier::new(id("dataset1.icd.exists"), RemovedKind::ConceptSelect),
            RemovedIdentifier::new(id("dataset1.icd.kh_diagnose_icd_code"), RemovedKind::Connector),
            RemovedIdentifier::new(
                id("dataset1.icd.kh_diagnose_icd_code.test"),
                RemovedKind::ConnectorSelect,
            ),
            RemovedIdentifier::new(
                id("dataset1.icd.kh_diagnose_icd_code.diagnoseart"),
                RemovedKind::Filter,
            ),
            RemovedIdentifier::new(
                id("dataset1.icd.kh_diagnose_icd_code.entlassungsdatum"),
                RemovedKind::Date,
            ),
        ]
        .into_iter()
        .collect();

        let labels = removed.resolve_labels(&catalog()).unwrap();
        assert_eq!(labels[0].concept, "ICD - c00-d48 - c00");
        assert_eq!(labels[1].label.as_deref(), Some("ICD vorhanden"));
        assert_eq!(labels[2].connector.as_deref(), Some("KH-Fall"));
        assert_eq!(labels[2].label, None);
        assert_eq!(labels[3].label.as_deref(), Some("Test"));
        assert_eq!(labels[4].label.as_deref(), Some("Diagnoseart"));
        assert_eq!(
            labels[5],
            ResolvedLabel {
                kind: RemovedKind::Date,
                concept: "ICD".to_string(),
                connector: Some("KH-Fall".to_string()),
                label: Some("Entlassungsdatum".to_string()),
            }
        );
    }

    #[test]
    fn test_resolve_unknown_connector() {
        let mut removed = RemovedIdentifiers::new();
        removed.add(id("dataset1.icd.au_fall.sum"), RemovedKind::ConnectorSelect);
        let err = removed.resolve_labels(&catalog()).unwrap_err();
        assert!(matches!(err, TranslateError::UnresolvableIdentifier(ref s) if s == "dataset1.icd.au_fall.sum"));
    }

    #[test]
    fn test_resolve_unknown_concept() {
        let mut removed = RemovedIdentifiers::new();
        removed.add(id("dataset1.alter"), RemovedKind::Concept);
        assert!(removed.resolve_labels(&catalog()).is_err());
    }
}
