//! Construction of concept elements from catalog entries.

use crate::ast::{ConceptElement, ConceptTable, FilterClause};
use crate::catalog::ConceptDescriptor;
use crate::error::{QueryError, QueryResult};
use crate::id::{ConqueryId, DatasetRules};

/// Which parts of a catalog entry to put into a new element.
#[derive(Debug, Clone, Default)]
pub struct CatalogSelection {
    /// Restrict tables to these connectors; `None` keeps all.
    pub connector_ids: Option<Vec<ConqueryId>>,
    /// Concept-level selects.
    pub concept_selects: Vec<ConqueryId>,
    /// Connector-level selects, distributed onto their tables.
    pub connector_selects: Vec<ConqueryId>,
    /// Filter clauses, distributed onto their tables.
    pub filters: Vec<FilterClause>,
}

impl CatalogSelection {
    /// Selection keeping every table and nothing else.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given connectors.
    pub fn with_connectors(mut self, connector_ids: Vec<ConqueryId>) -> Self {
        self.connector_ids = Some(connector_ids);
        self
    }

    /// Add concept-level selects.
    pub fn with_concept_selects(mut self, select_ids: Vec<ConqueryId>) -> Self {
        self.concept_selects.extend(select_ids);
        self
    }

    /// Add connector-level selects.
    pub fn with_connector_selects(mut self, select_ids: Vec<ConqueryId>) -> Self {
        self.connector_selects.extend(select_ids);
        self
    }

    /// Add filter clauses.
    pub fn with_filters(mut self, filters: Vec<FilterClause>) -> Self {
        self.filters.extend(filters);
        self
    }
}

impl ConceptElement {
    /// Builds an element over `ids` with one table per catalog table of
    /// `concept`, narrowed and populated per `selection`.
    ///
    /// Fails with [`QueryError::NoConnectorFound`] if no table remains.
    pub fn from_catalog(
        ids: Vec<ConqueryId>,
        concept: &ConceptDescriptor,
        selection: &CatalogSelection,
        rules: &DatasetRules,
    ) -> QueryResult<Self> {
        let first = ids.first().ok_or(QueryError::EmptyCollection("ids"))?;
        let root = first.root_concept_id()?;

        let mut tables = Vec::new();
        for descriptor in &concept.tables {
            let connector = ConqueryId::parse_with(&descriptor.connector_id, rules)?;
            if let Some(wanted) = &selection.connector_ids {
                if !connector.in_id_list(wanted) {
                    continue;
                }
            }
            let mut table = ConceptTable::new(connector);
            table.selects = selection
                .connector_selects
                .iter()
                .filter(|s| table.owns(s))
                .cloned()
                .collect();
            table.filters = selection
                .filters
                .iter()
                .filter(|f| table.owns(&f.filter))
                .cloned()
                .collect();
            tables.push(table);
        }
        if tables.is_empty() {
            return Err(QueryError::NoConnectorFound(root.to_string()));
        }

        let mut element = ConceptElement::new(ids, tables)?;
        for select in &selection.concept_selects {
            element.add_concept_select(select);
        }
        Ok(element)
    }
}
