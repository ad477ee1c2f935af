//! The translation engine.
//!
//! A translation walks a query tree bottom-up against the catalog of a
//! target dataset. Every node yields a pair `(translated, residual)`:
//! the node rewritten to the target dataset and the same node with its
//! original ids, both restricted to what exists in the target catalog.
//! A node with nothing left yields `(None, None)`, which its parent then
//! drops. Stored queries and uploads stop the walk with an error.

use std::collections::HashSet;
use std::time::Instant;

use cqapi_query::{
    Catalog, ConceptElement, ConceptTable, ConqueryId, DatasetRules, Junction, QueryError,
    QueryNode, QueryResult, QueryType,
};
use tracing::{info, warn};

use crate::cache::ListingCache;
use crate::config::TranslatorConfig;
use crate::error::{TranslateError, TranslateResult};
use crate::lookup::find_concept_id;
use crate::planner::DescendantPlan;
use crate::removed::{RemovedIdentifiers, RemovedKind};
use crate::result::{BatchOutcome, StoredQueryTranslation, TranslationOutcome, TranslationStats};
use crate::traits::Connection;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Translated and residual result of one node.
type Pair<T> = (Option<T>, Option<T>);

// =============================================================================
// Translator
// =============================================================================

/// Translates query trees between datasets.
///
/// The translator reads concept listings and stored queries through a
/// [`Connection`]; the catalog of the target dataset is passed per call.
///
/// # Example
///
/// ```ignore
/// use cqapi_translate::Translator;
///
/// let translator = Translator::new(&connection);
/// let catalog = connection.get_concepts("dataset2")?;
/// let outcome = translator.translate(&query, &catalog)?;
///
/// for removed in outcome.removed.iter() {
///     println!("dropped {} ({})", removed.id, removed.kind);
/// }
/// ```
pub struct Translator<'a> {
    connection: &'a dyn Connection,
    config: TranslatorConfig,
    cache: Option<ListingCache>,
}

impl<'a> Translator<'a> {
    /// Creates a translator with default configuration.
    pub fn new(connection: &'a dyn Connection) -> Self {
        Self::with_config(connection, TranslatorConfig::default())
    }

    /// Creates a translator with custom configuration.
    pub fn with_config(connection: &'a dyn Connection, config: TranslatorConfig) -> Self {
        let cache = config.cache.clone().map(ListingCache::new);
        Self {
            connection,
            config,
            cache,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Returns the listing cache, if enabled.
    pub fn cache(&self) -> Option<&ListingCache> {
        self.cache.as_ref()
    }

    /// Runs the descendant pre-pass for `query` against `catalog`.
    ///
    /// The set is empty when no listing was needed, either because the tree
    /// has no ids below the first child level or because their roots are
    /// missing from `catalog`.
    pub fn known_descendants(
        &self,
        query: &QueryNode,
        catalog: &Catalog,
        stats: &mut TranslationStats,
    ) -> TranslateResult<HashSet<ConqueryId>> {
        let dataset = self.target_dataset(catalog)?;
        let plan = DescendantPlan::build(query, catalog, &dataset, &self.config.rules)?;
        if !plan.needs_listings() {
            return Ok(HashSet::new());
        }
        plan.resolve(self.connection, self.cache.as_ref(), stats)
    }

    /// Translates `query` to the dataset of `catalog`, fetching concept
    /// listings for deep concept ids first.
    pub fn translate(&self, query: &QueryNode, catalog: &Catalog) -> TranslateResult<TranslationOutcome> {
        let start = Instant::now();
        let mut stats = TranslationStats::default();
        let known = self.known_descendants(query, catalog, &mut stats)?;

        let mut outcome = self.translate_with(query, catalog, Some(&known))?;
        outcome.stats.listings_fetched += stats.listings_fetched;
        outcome.stats.cache_hits += stats.cache_hits;
        outcome.stats.duration = start.elapsed();
        Ok(outcome)
    }

    /// Translates `query` to the dataset of `catalog` with a caller-supplied
    /// set of known descendant ids.
    ///
    /// Never touches the connection. Concept ids below the first child
    /// level fail with [`TranslateError::MissingDescendantIds`] if
    /// `known_descendants` is `None`.
    pub fn translate_with(
        &self,
        query: &QueryNode,
        catalog: &Catalog,
        known_descendants: Option<&HashSet<ConqueryId>>,
    ) -> TranslateResult<TranslationOutcome> {
        let start = Instant::now();
        let dataset = self.target_dataset(catalog)?;

        let mut walk = TranslationWalk {
            catalog,
            dataset: &dataset,
            rules: &self.config.rules,
            known: known_descendants,
            removed: RemovedIdentifiers::new(),
            stats: TranslationStats::default(),
        };
        let (translated, residual) = walk.node(query)?;

        let mut stats = walk.stats;
        stats.duration = start.elapsed();
        info!(
            dataset = %dataset,
            survived = translated.is_some(),
            removed = walk.removed.len(),
            elapsed_us = stats.duration.as_micros() as u64,
            "query translated"
        );

        Ok(TranslationOutcome {
            translated,
            residual,
            removed: walk.removed,
            stats,
        })
    }

    /// Translates independent trees to the dataset of `catalog`.
    ///
    /// With the `parallel` feature and [`TranslatorConfig::parallel`] set,
    /// the trees are translated on the rayon thread pool. The first error
    /// aborts the batch.
    pub fn translate_all(&self, queries: &[QueryNode], catalog: &Catalog) -> TranslateResult<BatchOutcome> {
        let outcomes = self.translate_each(queries, catalog)?;

        let mut batch = BatchOutcome::default();
        for outcome in outcomes {
            batch.push(outcome);
        }
        Ok(batch)
    }

    #[cfg(feature = "parallel")]
    fn translate_each(&self, queries: &[QueryNode], catalog: &Catalog) -> TranslateResult<Vec<TranslationOutcome>> {
        if self.config.parallel {
            return queries
                .par_iter()
                .map(|query| self.translate(query, catalog))
                .collect();
        }
        queries.iter().map(|query| self.translate(query, catalog)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn translate_each(&self, queries: &[QueryNode], catalog: &Catalog) -> TranslateResult<Vec<TranslationOutcome>> {
        queries.iter().map(|query| self.translate(query, catalog)).collect()
    }

    /// Fetches a stored query, translates it to `new_dataset` and submits
    /// the result there.
    ///
    /// Fails with [`TranslateError::NothingTranslated`] if nothing of the
    /// stored tree exists in the new dataset.
    pub fn translate_and_execute_stored_query(
        &self,
        query_id: &ConqueryId,
        new_dataset: &str,
    ) -> TranslateResult<StoredQueryTranslation> {
        let wire = self
            .connection
            .get_query(query_id)
            .map_err(TranslateError::Connection)?;
        let query = QueryNode::from_wire_with(&wire, &self.config.rules)?;
        let catalog = self
            .connection
            .get_concepts(new_dataset)
            .map_err(TranslateError::Connection)?;

        let outcome = self.translate(&query, &catalog)?;
        let Some(translated) = outcome.translated else {
            warn!(query = %query_id, dataset = new_dataset, "nothing to execute");
            return Err(TranslateError::NothingTranslated(query_id.to_string()));
        };

        let new_id = self
            .connection
            .execute_query(new_dataset, &translated.to_wire(), None)
            .map_err(TranslateError::Connection)?;
        info!(from = %query_id, to = %new_id, removed = outcome.removed.len(), "stored query re-executed");

        Ok(StoredQueryTranslation {
            query_id: new_id,
            removed: outcome.removed,
        })
    }

    fn target_dataset(&self, catalog: &Catalog) -> TranslateResult<String> {
        if let Some(dataset) = catalog.dataset(&self.config.rules) {
            return Ok(dataset);
        }
        match catalog.iter().next() {
            Some((key, _)) => Err(QueryError::InvalidDataset(key.to_string()).into()),
            None => Err(TranslateError::EmptyCatalog),
        }
    }
}

impl std::fmt::Debug for Translator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

// =============================================================================
// Tree walk
// =============================================================================

struct TranslationWalk<'c> {
    catalog: &'c Catalog,
    dataset: &'c str,
    rules: &'c DatasetRules,
    known: Option<&'c HashSet<ConqueryId>>,
    removed: RemovedIdentifiers,
    stats: TranslationStats,
}

impl TranslationWalk<'_> {
    fn rewrite(&mut self, id: &ConqueryId) -> TranslateResult<ConqueryId> {
        self.stats.ids_rewritten += 1;
        Ok(id.with_dataset(self.dataset, self.rules)?)
    }

    fn node(&mut self, node: &QueryNode) -> TranslateResult<Pair<QueryNode>> {
        self.stats.nodes_visited += 1;
        match node {
            QueryNode::Concept(element) => {
                let (translated, residual) = self.concept(element)?;
                Ok((translated.map(QueryNode::Concept), residual.map(QueryNode::Concept)))
            }
            QueryNode::DateRestriction(restriction) => self.wrapper(restriction.child(), |child| {
                restriction.with_child(child).map(QueryNode::DateRestriction)
            }),
            QueryNode::Negation(negation) => self.wrapper(negation.child(), |child| {
                negation.with_child(child).map(QueryNode::Negation)
            }),
            QueryNode::And(junction) => self.junction(junction, QueryType::And),
            QueryNode::Or(junction) => self.junction(junction, QueryType::Or),
            QueryNode::ConceptQuery(query) => {
                self.wrapper(query.root(), |root| query.with_root(root).map(QueryNode::ConceptQuery))
            }
            // The secondary id is carried over as is.
            QueryNode::SecondaryIdQuery(query) => self.wrapper(query.root(), |root| {
                query.with_root(root).map(QueryNode::SecondaryIdQuery)
            }),
            QueryNode::SavedQuery(_) => Err(TranslateError::SavedQueryTranslation),
            QueryNode::External(_) => Err(TranslateError::ExternalQueryTranslation),
            QueryNode::ExportForm(_) | QueryNode::FullExportForm(_) => {
                Err(TranslateError::UnsupportedNode(node.query_type().as_str()))
            }
        }
    }

    fn wrapper<F>(&mut self, child: &QueryNode, rebuild: F) -> TranslateResult<Pair<QueryNode>>
    where
        F: Fn(QueryNode) -> QueryResult<QueryNode>,
    {
        let (translated, residual) = self.node(child)?;
        Ok((
            translated.map(&rebuild).transpose()?,
            residual.map(&rebuild).transpose()?,
        ))
    }

    fn junction(&mut self, junction: &Junction, kind: QueryType) -> TranslateResult<Pair<QueryNode>> {
        let mut translated = Vec::new();
        let mut residual = Vec::new();
        for child in junction.children() {
            let (t, r) = self.node(child)?;
            translated.extend(t);
            residual.extend(r);
        }

        let rebuild = |children: Vec<QueryNode>| -> TranslateResult<Option<QueryNode>> {
            if children.is_empty() {
                return Ok(None);
            }
            let rebuilt = junction.with_children(children, kind)?;
            Ok(Some(match kind {
                QueryType::Or => QueryNode::Or(rebuilt),
                _ => QueryNode::And(rebuilt),
            }))
        };
        Ok((rebuild(translated)?, rebuild(residual)?))
    }

    fn concept(&mut self, element: &ConceptElement) -> TranslateResult<Pair<ConceptElement>> {
        let mut ids = Vec::new();
        let mut new_ids = Vec::new();
        for id in element.ids() {
            let new_id = self.rewrite(id)?;
            if find_concept_id(&new_id, self.catalog, self.known)? {
                ids.push(id.clone());
                new_ids.push(new_id);
            } else {
                self.removed.add(id.clone(), RemovedKind::Concept);
            }
        }
        if new_ids.is_empty() {
            return Ok((None, None));
        }

        let mut selects = Vec::new();
        let mut new_selects = Vec::new();
        for select in element.concept_selects() {
            let new_select = self.rewrite(select)?;
            let root = new_select.root_concept_id()?;
            let exists = self
                .catalog
                .get(&root)
                .and_then(|concept| concept.select(&new_select))
                .is_some();
            if exists {
                selects.push(select.clone());
                new_selects.push(new_select);
            } else {
                self.removed.add(select.clone(), RemovedKind::ConceptSelect);
            }
        }

        let mut tables = Vec::new();
        let mut new_tables = Vec::new();
        for table in element.tables() {
            if let (Some(new_table), Some(old_table)) = self.table(table)? {
                new_tables.push(new_table);
                tables.push(old_table);
            }
        }
        if new_tables.is_empty() {
            return Ok((None, None));
        }

        let translated = ConceptElement::new(new_ids, new_tables)?
            .with_concept_selects(new_selects)
            .with_metadata_of(element);
        let residual = ConceptElement::new(ids, tables)?
            .with_concept_selects(selects)
            .with_metadata_of(element);
        Ok((Some(translated), Some(residual)))
    }

    fn table(&mut self, table: &ConceptTable) -> TranslateResult<Pair<ConceptTable>> {
        let connector = self.rewrite(&table.connector_id)?;
        let root = connector.root_concept_id()?;
        let catalog = self.catalog;
        let Some(descriptor) = catalog.get(&root).and_then(|concept| concept.table(&connector)) else {
            self.removed.add(table.connector_id.clone(), RemovedKind::Connector);
            return Ok((None, None));
        };

        let mut translated = ConceptTable::new(connector);
        let mut residual = ConceptTable::new(table.connector_id.clone());

        if let Some(date_column) = &table.date_column_id {
            let new_date_column = self.rewrite(date_column)?;
            if descriptor.date_option(&new_date_column).is_some() {
                translated.date_column_id = Some(new_date_column);
                residual.date_column_id = Some(date_column.clone());
            } else {
                self.removed.add(date_column.clone(), RemovedKind::Date);
            }
        }

        for select in &table.selects {
            let new_select = self.rewrite(select)?;
            if descriptor.select(&new_select).is_some() {
                translated.selects.push(new_select);
                residual.selects.push(select.clone());
            } else {
                self.removed.add(select.clone(), RemovedKind::ConnectorSelect);
            }
        }

        for clause in &table.filters {
            let new_filter = self.rewrite(&clause.filter)?;
            if descriptor.filter(&new_filter).is_some() {
                translated.filters.push(clause.with_filter(new_filter));
                residual.filters.push(clause.clone());
            } else {
                self.removed.add(clause.filter.clone(), RemovedKind::Filter);
            }
        }

        Ok((Some(translated), Some(residual)))
    }
}
