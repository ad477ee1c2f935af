//! Translation result types.

use std::time::Duration;

use cqapi_query::{ConqueryId, QueryNode};

use crate::removed::RemovedIdentifiers;

/// Result of translating one query tree.
///
/// `translated` carries the target dataset's ids, `residual` the part of
/// the original tree that survived, with its original ids. Both are `None`
/// when nothing exists in the target catalog.
///
/// # Example
///
/// ```ignore
/// let outcome = translator.translate(&query, &catalog)?;
///
/// match outcome.translated {
///     Some(tree) => submit(tree.to_wire()),
///     None => println!("{} identifiers removed", outcome.removed.len()),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    /// The tree rewritten to the target dataset.
    pub translated: Option<QueryNode>,
    /// The surviving part of the original tree.
    pub residual: Option<QueryNode>,
    /// Everything dropped along the way.
    pub removed: RemovedIdentifiers,
    /// Walk statistics.
    pub stats: TranslationStats,
}

impl TranslationOutcome {
    /// Returns true if part of the query survived.
    pub fn is_translated(&self) -> bool {
        self.translated.is_some()
    }

    /// Returns true if nothing had to be dropped.
    pub fn is_complete(&self) -> bool {
        self.translated.is_some() && self.removed.is_empty()
    }
}

/// Statistics of one translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationStats {
    /// Query nodes visited.
    pub nodes_visited: usize,
    /// Identifiers moved to the target dataset.
    pub ids_rewritten: usize,
    /// Concept listings fetched from the connection.
    pub listings_fetched: usize,
    /// Concept listings served from the cache.
    pub cache_hits: usize,
    /// Total duration, pre-pass included.
    pub duration: Duration,
}

impl TranslationStats {
    /// Adds the counters of `other` to these.
    pub fn accumulate(&mut self, other: &TranslationStats) {
        self.nodes_visited += other.nodes_visited;
        self.ids_rewritten += other.ids_rewritten;
        self.listings_fetched += other.listings_fetched;
        self.cache_hits += other.cache_hits;
        self.duration += other.duration;
    }
}

/// Result of translating several independent trees.
///
/// `translated[i]` and `residual[i]` come from the same input tree; inputs
/// with nothing left are skipped in both lists.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Rewritten trees.
    pub translated: Vec<QueryNode>,
    /// Surviving parts of the original trees.
    pub residual: Vec<QueryNode>,
    /// Removals of all trees.
    pub removed: RemovedIdentifiers,
    /// Summed statistics.
    pub stats: TranslationStats,
}

impl BatchOutcome {
    /// Folds one tree's outcome into the batch.
    pub fn push(&mut self, outcome: TranslationOutcome) {
        if let (Some(translated), Some(residual)) = (outcome.translated, outcome.residual) {
            self.translated.push(translated);
            self.residual.push(residual);
        }
        self.removed.merge(outcome.removed);
        self.stats.accumulate(&outcome.stats);
    }

    /// Number of trees that survived.
    pub fn len(&self) -> usize {
        self.translated.len()
    }

    /// Returns true if no tree survived.
    pub fn is_empty(&self) -> bool {
        self.translated.is_empty()
    }
}

/// Result of re-running a stored query on another dataset.
#[derive(Debug, Clone)]
pub struct StoredQueryTranslation {
    /// Id of the newly submitted query.
    pub query_id: ConqueryId,
    /// Everything dropped from the stored tree.
    pub removed: RemovedIdentifiers,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::removed::RemovedKind;
    use cqapi_query::{ConceptElement, ConceptTable};

    fn concept(raw: &str) -> QueryNode {
        let id = ConqueryId::parse(raw).unwrap();
        let connector = ConqueryId::parse(&format!("{raw}.table")).unwrap();
        ConceptElement::new(vec![id], vec![ConceptTable::new(connector)])
            .unwrap()
            .into()
    }

    fn outcome(translated: Option<QueryNode>, removed: &[&str]) -> TranslationOutcome {
        let mut collection = RemovedIdentifiers::new();
        for raw in removed {
            collection.add(ConqueryId::parse(raw).unwrap(), RemovedKind::Concept);
        }
        TranslationOutcome {
            residual: translated.clone(),
            translated,
            removed: collection,
            stats: TranslationStats {
                nodes_visited: 2,
                ids_rewritten: 3,
                duration: Duration::from_millis(5),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_outcome_flags() {
        assert!(outcome(Some(concept("dataset2.icd")), &[]).is_complete());
        let partial = outcome(Some(concept("dataset2.icd")), &["dataset1.alter"]);
        assert!(partial.is_translated());
        assert!(!partial.is_complete());
        assert!(!outcome(None, &["dataset1.alter"]).is_translated());
    }

    #[test]
    fn test_batch_push() {
        let mut batch = BatchOutcome::default();
        batch.push(outcome(Some(concept("dataset2.icd")), &[]));
        batch.push(outcome(None, &["dataset1.alter"]));

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.residual.len(), 1);
        assert_eq!(batch.removed.len(), 1);
        assert_eq!(batch.stats.nodes_visited, 4);
        assert_eq!(batch.stats.duration, Duration::from_millis(10));
    }
}
