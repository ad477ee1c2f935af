//! Query tree node types.
//!
//! A query is a tree of [`QueryNode`]s. Leaf-shaped nodes (concepts, saved
//! queries, externals and the wrappers/collections built from them) nest
//! freely; root-shaped nodes ("query descriptions": concept queries,
//! secondary-id queries and export forms) only ever sit at the top.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::forms::{ExportForm, FullExportForm};
use crate::id::{ConqueryId, DatasetRules};

// =============================================================================
// Discriminator
// =============================================================================

/// Wire discriminator of a query node (`"type"` key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// `CONCEPT`
    Concept,
    /// `CONCEPT_QUERY`
    ConceptQuery,
    /// `SECONDARY_ID_QUERY`
    SecondaryIdQuery,
    /// `DATE_RESTRICTION`
    DateRestriction,
    /// `NEGATION`
    Negation,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `SAVED_QUERY`
    SavedQuery,
    /// `EXTERNAL`
    External,
    /// `EXPORT_FORM`
    ExportForm,
    /// `FULL_EXPORT_FORM`
    FullExportForm,
}

impl QueryType {
    /// Every known discriminator.
    pub const ALL: [QueryType; 11] = [
        QueryType::Concept,
        QueryType::ConceptQuery,
        QueryType::SecondaryIdQuery,
        QueryType::DateRestriction,
        QueryType::Negation,
        QueryType::And,
        QueryType::Or,
        QueryType::SavedQuery,
        QueryType::External,
        QueryType::ExportForm,
        QueryType::FullExportForm,
    ];

    /// The wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Concept => "CONCEPT",
            QueryType::ConceptQuery => "CONCEPT_QUERY",
            QueryType::SecondaryIdQuery => "SECONDARY_ID_QUERY",
            QueryType::DateRestriction => "DATE_RESTRICTION",
            QueryType::Negation => "NEGATION",
            QueryType::And => "AND",
            QueryType::Or => "OR",
            QueryType::SavedQuery => "SAVED_QUERY",
            QueryType::External => "EXTERNAL",
            QueryType::ExportForm => "EXPORT_FORM",
            QueryType::FullExportForm => "FULL_EXPORT_FORM",
        }
    }

    /// Looks up a wire tag.
    pub fn from_tag(tag: &str) -> QueryResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| QueryError::UnknownQueryType(tag.to_string()))
    }

    /// Returns true for root-shaped nodes that may not be nested.
    pub fn is_query_description(&self) -> bool {
        matches!(
            self,
            QueryType::ConceptQuery
                | QueryType::SecondaryIdQuery
                | QueryType::ExportForm
                | QueryType::FullExportForm
        )
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the date sets of children are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateAggregationMode {
    /// Union of the child date sets.
    Merge,
    /// Intersection of the child date sets.
    Intersect,
    /// Complement of the child date set.
    Negate,
    /// Drop dates entirely.
    Block,
}

impl DateAggregationMode {
    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DateAggregationMode::Merge => "MERGE",
            DateAggregationMode::Intersect => "INTERSECT",
            DateAggregationMode::Negate => "NEGATE",
            DateAggregationMode::Block => "BLOCK",
        }
    }
}

// =============================================================================
// Dates
// =============================================================================

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> QueryResult<NaiveDate> {
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(QueryError::InvalidDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| QueryError::InvalidDate(raw.to_string()))
}

/// Formats a date the way the wire format expects.
pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Optional lower and upper date bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DateRange {
    /// Inclusive start.
    pub min: Option<NaiveDate>,
    /// Inclusive end.
    pub max: Option<NaiveDate>,
}

impl DateRange {
    /// Builds a range from optional `YYYY-MM-DD` strings.
    pub fn parse(min: Option<&str>, max: Option<&str>) -> QueryResult<Self> {
        Ok(Self {
            min: min.map(parse_date).transpose()?,
            max: max.map(parse_date).transpose()?,
        })
    }

    /// Returns true if neither bound is set.
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

// =============================================================================
// Concept tables
// =============================================================================

/// A filter applied to a table: the filter id plus an operator payload that is
/// kept verbatim (`type`, `value` and anything else the service accepts).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// Filter identifier.
    pub filter: ConqueryId,
    /// Everything except the `filter` key.
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl FilterClause {
    /// Creates a clause with the usual `type`/`value` payload.
    pub fn new(filter: ConqueryId, filter_type: &str, value: serde_json::Value) -> Self {
        let mut payload = serde_json::Map::new();
        payload.insert("type".to_string(), serde_json::Value::from(filter_type));
        payload.insert("value".to_string(), value);
        Self { filter, payload }
    }

    /// Returns a copy pointing at another filter id, keeping the payload.
    pub fn with_filter(&self, filter: ConqueryId) -> Self {
        Self {
            filter,
            payload: self.payload.clone(),
        }
    }

    fn connector_matches(&self, connector: &ConqueryId) -> bool {
        self.filter
            .connector_id()
            .map(|c| c.same_id(connector, true))
            .unwrap_or(false)
    }
}

/// One table (connector) of a concept element.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptTable {
    /// Connector identifier.
    pub connector_id: ConqueryId,
    /// Validity-date column.
    pub date_column_id: Option<ConqueryId>,
    /// Connector-level selects.
    pub selects: Vec<ConqueryId>,
    /// Filters.
    pub filters: Vec<FilterClause>,
}

impl ConceptTable {
    /// Creates a table with no selects, filters or date column.
    pub fn new(connector_id: ConqueryId) -> Self {
        Self {
            connector_id,
            date_column_id: None,
            selects: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Sets the date column if it belongs to this table's connector.
    pub fn set_date_column(&mut self, date_column_id: &ConqueryId) -> bool {
        if self.owns(date_column_id) {
            self.date_column_id = Some(date_column_id.clone());
            true
        } else {
            false
        }
    }

    /// Removes the given selects, or all of them with `None`.
    pub fn remove_selects(&mut self, select_ids: Option<&[ConqueryId]>) {
        match select_ids {
            None => self.selects.clear(),
            Some(ids) => self.selects.retain(|s| !s.in_id_list(ids)),
        }
    }

    /// Removes clauses for the given filters, or all of them with `None`.
    pub fn remove_filters(&mut self, filter_ids: Option<&[ConqueryId]>) {
        match filter_ids {
            None => self.filters.clear(),
            Some(ids) => self.filters.retain(|f| !f.filter.in_id_list(ids)),
        }
    }

    /// Returns true if `id` lives under this table's connector.
    pub fn owns(&self, id: &ConqueryId) -> bool {
        id.connector_id()
            .map(|c| c.same_id(&self.connector_id, true))
            .unwrap_or(false)
    }
}

// =============================================================================
// Leaf and wrapper nodes
// =============================================================================

/// A concept filter: one or more concept ids with their tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptElement {
    ids: Vec<ConqueryId>,
    concept_selects: Vec<ConqueryId>,
    tables: Vec<ConceptTable>,
    /// `excludeFromSecondaryIdQuery`
    pub exclude_from_secondary_id: Option<bool>,
    /// `excludeFromTimeAggregation`
    pub exclude_from_time_aggregation: Option<bool>,
    /// Display label.
    pub label: Option<String>,
    /// Output-row tag.
    pub row_prefix: Option<String>,
}

impl ConceptElement {
    /// Creates an element; `ids` must not be empty.
    pub fn new(ids: Vec<ConqueryId>, tables: Vec<ConceptTable>) -> QueryResult<Self> {
        if ids.is_empty() {
            return Err(QueryError::EmptyCollection("ids"));
        }
        Ok(Self {
            ids,
            concept_selects: Vec::new(),
            tables,
            exclude_from_secondary_id: None,
            exclude_from_time_aggregation: None,
            label: None,
            row_prefix: None,
        })
    }

    /// Replaces the concept-level selects.
    pub fn with_concept_selects(mut self, selects: Vec<ConqueryId>) -> Self {
        self.concept_selects = selects;
        self
    }

    /// Copies label, row prefix and flags from `other`.
    pub fn with_metadata_of(mut self, other: &ConceptElement) -> Self {
        self.exclude_from_secondary_id = other.exclude_from_secondary_id;
        self.exclude_from_time_aggregation = other.exclude_from_time_aggregation;
        self.label = other.label.clone();
        self.row_prefix = other.row_prefix.clone();
        self
    }

    /// Concept ids.
    pub fn ids(&self) -> &[ConqueryId] {
        &self.ids
    }

    /// Concept-level selects.
    pub fn concept_selects(&self) -> &[ConqueryId] {
        &self.concept_selects
    }

    /// Tables.
    pub fn tables(&self) -> &[ConceptTable] {
        &self.tables
    }

    /// Adds a table unless one with the same connector exists.
    pub fn add_table(&mut self, table: ConceptTable) {
        if !self
            .tables
            .iter()
            .any(|t| t.connector_id.same_id(&table.connector_id, true))
        {
            self.tables.push(table);
        }
    }

    /// Appends a concept-level select if its root concept is one of ours.
    pub fn add_concept_select(&mut self, select_id: &ConqueryId) {
        let Ok(select_root) = select_id.root_concept_id() else {
            return;
        };
        let accepted = self.ids.iter().any(|id| {
            id.root_concept_id()
                .map(|root| root.same_id(&select_root, true))
                .unwrap_or(false)
        });
        if accepted {
            self.concept_selects.push(select_id.clone());
        }
    }

    /// Appends a connector-level select onto the table it belongs to.
    pub fn add_connector_select(&mut self, select_id: &ConqueryId) {
        for table in self.tables.iter_mut().filter(|t| t.owns(select_id)) {
            table.selects.push(select_id.clone());
        }
    }

    /// Removes the given concept-level selects, or all with `None`.
    pub fn remove_concept_selects(&mut self, select_ids: Option<&[ConqueryId]>) {
        match select_ids {
            None => self.concept_selects.clear(),
            Some(ids) => self.concept_selects.retain(|s| !s.in_id_list(ids)),
        }
    }

    /// Removes the given connector-level selects from every table, or all with `None`.
    pub fn remove_connector_selects(&mut self, select_ids: Option<&[ConqueryId]>) {
        for table in &mut self.tables {
            table.remove_selects(select_ids);
        }
    }

    /// Adds a filter clause to the table its filter belongs to.
    pub fn add_filter(&mut self, clause: &FilterClause) {
        for table in &mut self.tables {
            if clause.connector_matches(&table.connector_id) {
                table.filters.push(clause.clone());
            }
        }
    }

    /// Removes the given filters from every table, or all with `None`.
    pub fn remove_filters(&mut self, filter_ids: Option<&[ConqueryId]>) {
        for table in &mut self.tables {
            table.remove_filters(filter_ids);
        }
    }

    /// Sets the date column on the table whose connector matches.
    pub fn set_validity_date(&mut self, date_column_id: &ConqueryId) {
        for table in &mut self.tables {
            table.set_date_column(date_column_id);
        }
    }

    /// Keeps only tables whose connector is listed. An element left without
    /// tables is not a valid query; callers check [`tables`](Self::tables).
    pub fn remove_all_tables_but(&mut self, connector_ids: &[ConqueryId]) {
        self.tables
            .retain(|t| t.connector_id.in_id_list(connector_ids));
    }

    /// Removes the table with the given connector.
    pub fn remove_table(&mut self, connector_id: &ConqueryId) {
        self.tables
            .retain(|t| !t.connector_id.same_id(connector_id, true));
    }

    /// Sets `excludeFromSecondaryIdQuery`.
    pub fn exclude_from_secondary_id(&mut self) {
        self.exclude_from_secondary_id = Some(true);
    }

    /// Sets `excludeFromTimeAggregation`.
    pub fn exclude_from_time_aggregation(&mut self) {
        self.exclude_from_time_aggregation = Some(true);
    }
}

/// Restricts its child to a date range.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRestriction {
    child: Box<QueryNode>,
    /// Date bounds.
    pub date_range: DateRange,
    /// Display label.
    pub label: Option<String>,
    /// Output-row tag.
    pub row_prefix: Option<String>,
}

impl DateRestriction {
    /// Wraps `child`, which must be leaf-shaped.
    pub fn new(child: QueryNode, date_range: DateRange) -> QueryResult<Self> {
        child.ensure_nestable(QueryType::DateRestriction)?;
        Ok(Self {
            child: Box::new(child),
            date_range,
            label: None,
            row_prefix: None,
        })
    }

    /// The wrapped node.
    pub fn child(&self) -> &QueryNode {
        &self.child
    }

    /// A copy of this wrapper around another child.
    pub fn with_child(&self, child: QueryNode) -> QueryResult<Self> {
        let mut wrapped = Self::new(child, self.date_range)?;
        wrapped.label = self.label.clone();
        wrapped.row_prefix = self.row_prefix.clone();
        Ok(wrapped)
    }
}

/// Negates its child.
#[derive(Debug, Clone, PartialEq)]
pub struct Negation {
    child: Box<QueryNode>,
    /// Display label.
    pub label: Option<String>,
    /// Output-row tag.
    pub row_prefix: Option<String>,
}

impl Negation {
    /// Wraps `child`, which must be leaf-shaped.
    pub fn new(child: QueryNode) -> QueryResult<Self> {
        child.ensure_nestable(QueryType::Negation)?;
        Ok(Self {
            child: Box::new(child),
            label: None,
            row_prefix: None,
        })
    }

    /// The wrapped node.
    pub fn child(&self) -> &QueryNode {
        &self.child
    }

    /// A copy of this wrapper around another child.
    pub fn with_child(&self, child: QueryNode) -> QueryResult<Self> {
        let mut wrapped = Self::new(child)?;
        wrapped.label = self.label.clone();
        wrapped.row_prefix = self.row_prefix.clone();
        Ok(wrapped)
    }
}

/// Children of an `AND` or `OR` node.
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    children: Vec<QueryNode>,
    /// `createExists`
    pub create_exists: Option<bool>,
    /// `dateAction`
    pub date_action: Option<DateAggregationMode>,
    /// Display label.
    pub label: Option<String>,
    /// Output-row tag.
    pub row_prefix: Option<String>,
}

impl Junction {
    pub(crate) fn build(children: Vec<QueryNode>, parent: QueryType) -> QueryResult<Self> {
        if children.is_empty() {
            return Err(QueryError::EmptyCollection("children"));
        }
        for child in &children {
            child.ensure_nestable(parent)?;
        }
        Ok(Self {
            children,
            create_exists: None,
            date_action: None,
            label: None,
            row_prefix: None,
        })
    }

    /// The combined nodes.
    pub fn children(&self) -> &[QueryNode] {
        &self.children
    }

    /// A copy of this junction with other children, keeping local fields.
    pub fn with_children(&self, children: Vec<QueryNode>, kind: QueryType) -> QueryResult<Self> {
        let mut junction = Self::build(children, kind)?;
        junction.create_exists = self.create_exists;
        junction.date_action = self.date_action;
        junction.label = self.label.clone();
        junction.row_prefix = self.row_prefix.clone();
        Ok(junction)
    }
}

/// Root wrapper of a plain cohort query.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptQuery {
    root: Box<QueryNode>,
    /// `dateAggregationMode`
    pub date_aggregation_mode: Option<DateAggregationMode>,
}

impl ConceptQuery {
    /// Wraps `root`, which must be leaf-shaped.
    pub fn new(root: QueryNode) -> QueryResult<Self> {
        root.ensure_nestable(QueryType::ConceptQuery)?;
        Ok(Self {
            root: Box::new(root),
            date_aggregation_mode: None,
        })
    }

    /// The wrapped node.
    pub fn root(&self) -> &QueryNode {
        &self.root
    }

    /// A copy of this query around another root.
    pub fn with_root(&self, root: QueryNode) -> QueryResult<Self> {
        let mut query = Self::new(root)?;
        query.date_aggregation_mode = self.date_aggregation_mode;
        Ok(query)
    }
}

/// Root wrapper grouping results by a secondary id.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryIdQuery {
    root: Box<QueryNode>,
    /// Secondary id to group by.
    pub secondary_id: ConqueryId,
    /// `dateAggregationMode`
    pub date_aggregation_mode: Option<DateAggregationMode>,
}

impl SecondaryIdQuery {
    /// Wraps `root`, which must be leaf-shaped.
    pub fn new(root: QueryNode, secondary_id: ConqueryId) -> QueryResult<Self> {
        root.ensure_nestable(QueryType::SecondaryIdQuery)?;
        Ok(Self {
            root: Box::new(root),
            secondary_id,
            date_aggregation_mode: None,
        })
    }

    /// The wrapped node.
    pub fn root(&self) -> &QueryNode {
        &self.root
    }

    /// A copy of this query around another root, with the same secondary id.
    pub fn with_root(&self, root: QueryNode) -> QueryResult<Self> {
        let mut query = Self::new(root, self.secondary_id.clone())?;
        query.date_aggregation_mode = self.date_aggregation_mode;
        Ok(query)
    }
}

/// Reference to a query stored on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedQuery {
    /// Stored query id.
    pub query_id: ConqueryId,
    /// Written as `excludeFromSecondaryId`.
    pub exclude_from_secondary_id: Option<bool>,
    /// Display label.
    pub label: Option<String>,
    /// Output-row tag.
    pub row_prefix: Option<String>,
}

impl SavedQuery {
    /// Creates a reference to a stored query.
    pub fn new(query_id: ConqueryId) -> Self {
        Self {
            query_id,
            exclude_from_secondary_id: None,
            label: None,
            row_prefix: None,
        }
    }
}

/// An uploaded entity list.
#[derive(Debug, Clone, PartialEq)]
pub struct External {
    /// Column formats, e.g. `ID`, `START_DATE`.
    pub format: Vec<String>,
    /// Rows of values.
    pub values: Vec<Vec<String>>,
    /// Display label.
    pub label: Option<String>,
    /// Output-row tag.
    pub row_prefix: Option<String>,
}

impl External {
    /// Creates an upload from its column formats and rows.
    pub fn new(format: Vec<String>, values: Vec<Vec<String>>) -> Self {
        Self {
            format,
            values,
            label: None,
            row_prefix: None,
        }
    }
}

// =============================================================================
// QueryNode
// =============================================================================

/// A node of a query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// `CONCEPT`
    Concept(ConceptElement),
    /// `DATE_RESTRICTION`
    DateRestriction(DateRestriction),
    /// `NEGATION`
    Negation(Negation),
    /// `AND`
    And(Junction),
    /// `OR`
    Or(Junction),
    /// `CONCEPT_QUERY`
    ConceptQuery(ConceptQuery),
    /// `SECONDARY_ID_QUERY`
    SecondaryIdQuery(SecondaryIdQuery),
    /// `SAVED_QUERY`
    SavedQuery(SavedQuery),
    /// `EXTERNAL`
    External(External),
    /// `EXPORT_FORM`
    ExportForm(ExportForm),
    /// `FULL_EXPORT_FORM`
    FullExportForm(FullExportForm),
}

impl QueryNode {
    /// Builds an `AND` node over leaf-shaped children.
    pub fn and(children: Vec<QueryNode>) -> QueryResult<Self> {
        Junction::build(children, QueryType::And).map(QueryNode::And)
    }

    /// Builds an `OR` node over leaf-shaped children.
    pub fn or(children: Vec<QueryNode>) -> QueryResult<Self> {
        Junction::build(children, QueryType::Or).map(QueryNode::Or)
    }

    /// The node's discriminator.
    pub fn query_type(&self) -> QueryType {
        match self {
            QueryNode::Concept(_) => QueryType::Concept,
            QueryNode::DateRestriction(_) => QueryType::DateRestriction,
            QueryNode::Negation(_) => QueryType::Negation,
            QueryNode::And(_) => QueryType::And,
            QueryNode::Or(_) => QueryType::Or,
            QueryNode::ConceptQuery(_) => QueryType::ConceptQuery,
            QueryNode::SecondaryIdQuery(_) => QueryType::SecondaryIdQuery,
            QueryNode::SavedQuery(_) => QueryType::SavedQuery,
            QueryNode::External(_) => QueryType::External,
            QueryNode::ExportForm(_) => QueryType::ExportForm,
            QueryNode::FullExportForm(_) => QueryType::FullExportForm,
        }
    }

    /// Returns true for root-shaped nodes.
    pub fn is_query_description(&self) -> bool {
        self.query_type().is_query_description()
    }

    /// Fails with [`QueryError::InvalidNesting`] if this node may not sit
    /// below `parent`.
    pub fn ensure_nestable(&self, parent: QueryType) -> QueryResult<()> {
        if self.is_query_description() {
            return Err(QueryError::InvalidNesting {
                parent: parent.as_str(),
                child: self.query_type().as_str(),
            });
        }
        Ok(())
    }

    /// The node's label, if the variant carries one.
    pub fn label(&self) -> Option<&str> {
        match self {
            QueryNode::Concept(n) => n.label.as_deref(),
            QueryNode::DateRestriction(n) => n.label.as_deref(),
            QueryNode::Negation(n) => n.label.as_deref(),
            QueryNode::And(n) | QueryNode::Or(n) => n.label.as_deref(),
            QueryNode::SavedQuery(n) => n.label.as_deref(),
            QueryNode::External(n) => n.label.as_deref(),
            _ => None,
        }
    }

    /// Sets the label. Root-shaped nodes carry none.
    pub fn set_label(&mut self, label: impl Into<String>) -> QueryResult<()> {
        let label = Some(label.into());
        match self {
            QueryNode::Concept(n) => n.label = label,
            QueryNode::DateRestriction(n) => n.label = label,
            QueryNode::Negation(n) => n.label = label,
            QueryNode::And(n) | QueryNode::Or(n) => n.label = label,
            QueryNode::SavedQuery(n) => n.label = label,
            QueryNode::External(n) => n.label = label,
            other => {
                return Err(QueryError::invalid_field(
                    "label",
                    format!("{} has no label", other.query_type()),
                ))
            }
        }
        Ok(())
    }

    /// Unwraps a concept or secondary-id query to its root; other nodes are
    /// returned unchanged.
    pub fn unwrap_root(self) -> QueryNode {
        match self {
            QueryNode::ConceptQuery(q) => *q.root,
            QueryNode::SecondaryIdQuery(q) => *q.root,
            other => other,
        }
    }

    /// Wraps this node in a negation.
    pub fn negate(self) -> QueryResult<QueryNode> {
        Negation::new(self).map(QueryNode::Negation)
    }

    /// Combines with `other` under `AND`, extending an existing `AND`.
    pub fn and_with(self, other: QueryNode) -> QueryResult<QueryNode> {
        match self {
            QueryNode::And(mut junction) => {
                other.ensure_nestable(QueryType::And)?;
                junction.children.push(other);
                Ok(QueryNode::And(junction))
            }
            node => QueryNode::and(vec![node, other]),
        }
    }

    /// Combines with `other` under `OR`, extending an existing `OR`.
    pub fn or_with(self, other: QueryNode) -> QueryResult<QueryNode> {
        match self {
            QueryNode::Or(mut junction) => {
                other.ensure_nestable(QueryType::Or)?;
                junction.children.push(other);
                Ok(QueryNode::Or(junction))
            }
            node => QueryNode::or(vec![node, other]),
        }
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// Every concept element in the subtree, depth first. Export forms
    /// contribute their features, outcomes and tables.
    pub fn concept_elements(&self) -> Vec<&ConceptElement> {
        let mut out = Vec::new();
        self.collect_concepts(&mut out);
        out
    }

    fn collect_concepts<'a>(&'a self, out: &mut Vec<&'a ConceptElement>) {
        match self {
            QueryNode::Concept(c) => out.push(c),
            QueryNode::DateRestriction(n) => n.child.collect_concepts(out),
            QueryNode::Negation(n) => n.child.collect_concepts(out),
            QueryNode::And(j) | QueryNode::Or(j) => {
                for child in &j.children {
                    child.collect_concepts(out);
                }
            }
            QueryNode::ConceptQuery(q) => q.root.collect_concepts(out),
            QueryNode::SecondaryIdQuery(q) => q.root.collect_concepts(out),
            QueryNode::ExportForm(form) => {
                for node in form.features().iter().chain(form.outcomes()) {
                    node.collect_concepts(out);
                }
            }
            QueryNode::FullExportForm(form) => out.extend(form.tables()),
            QueryNode::SavedQuery(_) | QueryNode::External(_) => {}
        }
    }

    /// Every concept id referenced in the subtree, first occurrence order.
    pub fn concept_ids(&self) -> Vec<ConqueryId> {
        let mut ids: Vec<ConqueryId> = Vec::new();
        for element in self.concept_elements() {
            for id in element.ids() {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }

    /// Visits every node of the cohort tree mutably, parents first. Export
    /// forms are visited but not descended into.
    fn visit_mut(&mut self, f: &mut dyn FnMut(&mut QueryNode)) {
        f(self);
        match self {
            QueryNode::DateRestriction(n) => n.child.visit_mut(f),
            QueryNode::Negation(n) => n.child.visit_mut(f),
            QueryNode::And(j) | QueryNode::Or(j) => {
                for child in &mut j.children {
                    child.visit_mut(f);
                }
            }
            QueryNode::ConceptQuery(q) => q.root.visit_mut(f),
            QueryNode::SecondaryIdQuery(q) => q.root.visit_mut(f),
            _ => {}
        }
    }

    fn for_each_concept_mut(&mut self, mut f: impl FnMut(&mut ConceptElement)) {
        self.visit_mut(&mut |node| {
            if let QueryNode::Concept(c) = node {
                f(c);
            }
        });
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Adds a concept-level select to every element of the matching concept.
    pub fn add_concept_select(&mut self, select_id: &ConqueryId) {
        self.for_each_concept_mut(|c| c.add_concept_select(select_id));
    }

    /// Adds a connector-level select to every table of the matching connector.
    pub fn add_connector_select(&mut self, select_id: &ConqueryId) {
        self.for_each_concept_mut(|c| c.add_connector_select(select_id));
    }

    /// Removes concept-level selects (all with `None`).
    pub fn remove_concept_selects(&mut self, select_ids: Option<&[ConqueryId]>) {
        self.for_each_concept_mut(|c| c.remove_concept_selects(select_ids));
    }

    /// Removes connector-level selects (all with `None`).
    pub fn remove_connector_selects(&mut self, select_ids: Option<&[ConqueryId]>) {
        self.for_each_concept_mut(|c| c.remove_connector_selects(select_ids));
    }

    /// Adds a filter clause to every table of the matching connector.
    pub fn add_filter(&mut self, clause: &FilterClause) {
        self.for_each_concept_mut(|c| c.add_filter(clause));
    }

    /// Removes filter clauses (all with `None`).
    pub fn remove_filters(&mut self, filter_ids: Option<&[ConqueryId]>) {
        self.for_each_concept_mut(|c| c.remove_filters(filter_ids));
    }

    /// Sets the validity date on every table of the matching connector.
    pub fn set_validity_date(&mut self, date_column_id: &ConqueryId) {
        self.for_each_concept_mut(|c| c.set_validity_date(date_column_id));
    }

    /// Prunes every element's tables to the given connectors.
    pub fn remove_all_tables_but(&mut self, connector_ids: &[ConqueryId]) {
        self.for_each_concept_mut(|c| c.remove_all_tables_but(connector_ids));
    }

    /// Flags every element as excluded from time aggregation.
    pub fn exclude_from_time_aggregation(&mut self) {
        self.for_each_concept_mut(ConceptElement::exclude_from_time_aggregation);
    }

    /// Flags every element and saved query as excluded from secondary-id
    /// grouping.
    pub fn exclude_from_secondary_id(&mut self) {
        self.visit_mut(&mut |node| match node {
            QueryNode::Concept(c) => c.exclude_from_secondary_id(),
            QueryNode::SavedQuery(q) => q.exclude_from_secondary_id = Some(true),
            _ => {}
        });
    }

    /// The dataset the tree is built against, if it names one.
    pub fn dataset(&self, rules: &DatasetRules) -> Option<String> {
        let from_id = |id: &ConqueryId| {
            ConqueryId::parse_with(&id.to_string(), rules)
                .ok()
                .and_then(|parsed| parsed.dataset().map(str::to_string))
        };
        match self {
            QueryNode::Concept(c) => c.ids.first().and_then(from_id),
            QueryNode::DateRestriction(n) => n.child.dataset(rules),
            QueryNode::Negation(n) => n.child.dataset(rules),
            QueryNode::And(j) | QueryNode::Or(j) => {
                j.children.first().and_then(|c| c.dataset(rules))
            }
            QueryNode::ConceptQuery(q) => q.root.dataset(rules),
            QueryNode::SecondaryIdQuery(q) => from_id(&q.secondary_id),
            QueryNode::SavedQuery(q) => from_id(&q.query_id),
            QueryNode::External(_) => None,
            QueryNode::ExportForm(form) => from_id(form.query_group()),
            QueryNode::FullExportForm(form) => from_id(form.query_group()),
        }
    }
}

impl From<ConceptElement> for QueryNode {
    fn from(element: ConceptElement) -> Self {
        QueryNode::Concept(element)
    }
}
