//! Descendant pre-pass.
//!
//! The catalog lists root concepts and their first children only. Before a
//! tree with deeper concept ids is translated, the concept listing of each
//! affected root is fetched from the target dataset and the tree's deep ids
//! are checked against it. The resulting set feeds
//! [`find_concept_id`](crate::find_concept_id).

use std::collections::HashSet;

use cqapi_query::{Catalog, ConqueryId, DatasetRules, QueryNode};
use tracing::debug;

use crate::cache::ListingCache;
use crate::error::{TranslateError, TranslateResult};
use crate::result::TranslationStats;
use crate::traits::Connection;

/// Concept ids of a tree sharing one root concept, moved to the target
/// dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootGroup {
    /// Root concept in the target dataset.
    pub root: ConqueryId,
    /// Concept ids in the target dataset, in tree order.
    pub ids: Vec<ConqueryId>,
}

impl RootGroup {
    /// Returns true if any id lies below the first child level.
    pub fn needs_listing(&self) -> bool {
        self.ids.iter().any(|id| id.path().len() > 2)
    }
}

/// Which concept listings a translation needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescendantPlan {
    groups: Vec<RootGroup>,
}

impl DescendantPlan {
    /// Groups the tree's concept ids by root, skipping roots the target
    /// catalog does not have.
    pub fn build(
        query: &QueryNode,
        catalog: &Catalog,
        dataset: &str,
        rules: &DatasetRules,
    ) -> TranslateResult<Self> {
        let mut groups: Vec<RootGroup> = Vec::new();

        for id in query.concept_ids() {
            let rewritten = id.with_dataset(dataset, rules)?;
            let root = rewritten.root_concept_id()?;
            if !catalog.contains_concept(&root) {
                continue;
            }
            match groups.iter_mut().find(|group| group.root == root) {
                Some(group) => group.ids.push(rewritten),
                None => groups.push(RootGroup {
                    root,
                    ids: vec![rewritten],
                }),
            }
        }

        Ok(Self { groups })
    }

    /// The groups, in order of first appearance.
    pub fn groups(&self) -> &[RootGroup] {
        &self.groups
    }

    /// Returns true if any group needs a listing.
    pub fn needs_listings(&self) -> bool {
        self.groups.iter().any(RootGroup::needs_listing)
    }

    /// Fetches the needed listings and returns the ids found in them.
    pub fn resolve(
        &self,
        connection: &dyn Connection,
        cache: Option<&ListingCache>,
        stats: &mut TranslationStats,
    ) -> TranslateResult<HashSet<ConqueryId>> {
        let mut known = HashSet::new();

        for group in self.groups.iter().filter(|g| g.needs_listing()) {
            let key = group.root.to_string();
            let listed = match cache.and_then(|c| c.get(&key)) {
                Some(ids) => {
                    stats.cache_hits += 1;
                    ids
                }
                None => {
                    let entries = connection
                        .get_concept(&group.root)
                        .map_err(TranslateError::Connection)?;
                    stats.listings_fetched += 1;
                    let ids: HashSet<String> =
                        entries.into_iter().flat_map(|entry| entry.ids).collect();
                    if let Some(cache) = cache {
                        cache.set(key.clone(), ids.clone());
                    }
                    ids
                }
            };

            let before = known.len();
            known.extend(
                group
                    .ids
                    .iter()
                    .filter(|id| listed.contains(&id.to_string()))
                    .cloned(),
            );
            debug!(
                root = %key,
                listed = listed.len(),
                found = known.len() - before,
                "descendants resolved"
            );
        }

        Ok(known)
    }
}
