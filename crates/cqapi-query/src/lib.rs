//! # cqapi-query
//!
//! Query object model for a remote cohort-query service.
//!
//! This crate provides:
//! - **Identifiers**: dotted hierarchical ids with dataset substitution and
//!   depth-tolerant comparison ([`ConqueryId`], [`DatasetRules`])
//! - **Catalog types**: the per-dataset concept listing ([`Catalog`])
//! - **Query tree**: a closed set of node variants ([`QueryNode`]) with a
//!   mutation API that routes every change through the nodes themselves
//! - **Wire codec**: `to_wire`/`from_wire` JSON encoding with null pruning
//! - **Export forms**: report descriptions over a stored cohort
//!
//! ## Usage
//!
//! ```rust
//! use cqapi_query::{ConqueryId, QueryNode};
//! use serde_json::json;
//!
//! let query = QueryNode::from_wire(&json!({
//!     "type": "CONCEPT_QUERY",
//!     "root": {
//!         "type": "CONCEPT",
//!         "ids": ["dataset1.icd.a"],
//!         "tables": [{"id": "dataset1.icd.au_fall"}]
//!     }
//! }))
//! .unwrap();
//!
//! let mut query = query;
//! query.add_connector_select(&ConqueryId::parse("dataset1.icd.au_fall.sum").unwrap());
//! assert_eq!(query.concept_ids(), vec![ConqueryId::parse("dataset1.icd.a").unwrap()]);
//! ```
//!
//! ## Node shapes
//!
//! | Tag | Kind | Children |
//! |-----|------|----------|
//! | `CONCEPT` | leaf | tables |
//! | `SAVED_QUERY`, `EXTERNAL` | opaque leaf | none |
//! | `DATE_RESTRICTION`, `NEGATION` | wrapper | `child` |
//! | `AND`, `OR` | collection | `children` |
//! | `CONCEPT_QUERY`, `SECONDARY_ID_QUERY` | root | `root` |
//! | `EXPORT_FORM`, `FULL_EXPORT_FORM` | root | features / tables |
//!
//! Root-shaped nodes never nest inside another node.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod ast;
mod builder;
mod catalog;
mod error;
mod forms;
mod id;
mod wire;

pub use ast::{
    format_date, parse_date, ConceptElement, ConceptQuery, ConceptTable, DateAggregationMode,
    DateRange, DateRestriction, External, FilterClause, Junction, Negation, QueryNode, QueryType,
    SavedQuery, SecondaryIdQuery,
};
pub use builder::CatalogSelection;
pub use catalog::{
    Catalog, ConceptDescriptor, DateColumnDescriptor, DateColumnOption, FilterDescriptor,
    SelectDescriptor, TableDescriptor,
};
pub use error::{QueryError, QueryResult};
pub use forms::{
    ExportForm, FullExportForm, IndexPlacement, IndexSelector, Resolution, TimeMode, TimeUnit,
};
pub use id::{ConqueryId, DatasetRules, DatasetRulesBuilder, IdRole, DEFAULT_DATASET_PREFIXES};
