//! The collaborator trait translation talks to.
//!
//! This module defines the [`Connection`] trait that must be implemented
//! by anything able to serve catalogs, concept listings and stored queries.
//!
//! # Architecture Note
//!
//! This crate intentionally does NOT depend on the HTTP client crate. The
//! trait is defined here and implemented there, so translation can run
//! against an in-memory fixture as well as against the live service.
//!
//! # Example: implementing Connection over fixtures
//!
//! ```rust
//! use cqapi_query::{Catalog, ConqueryId};
//! use cqapi_translate::{ConceptListingEntry, Connection, ConnectionError};
//! use serde_json::Value;
//!
//! struct Fixtures {
//!     catalog: Catalog,
//! }
//!
//! impl Connection for Fixtures {
//!     fn get_concepts(&self, _dataset: &str) -> Result<Catalog, ConnectionError> {
//!         Ok(self.catalog.clone())
//!     }
//!
//!     fn get_concept(&self, _root: &ConqueryId) -> Result<Vec<ConceptListingEntry>, ConnectionError> {
//!         Ok(Vec::new())
//!     }
//!
//!     fn execute_query(
//!         &self,
//!         dataset: &str,
//!         _query: &Value,
//!         _label: Option<&str>,
//!     ) -> Result<ConqueryId, ConnectionError> {
//!         Ok(ConqueryId::parse(&format!("{dataset}.query1"))?)
//!     }
//!
//!     fn get_query(&self, query_id: &ConqueryId) -> Result<Value, ConnectionError> {
//!         Err(format!("no stored query {query_id}").into())
//!     }
//! }
//! ```

use cqapi_query::{Catalog, ConqueryId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boxed error returned by [`Connection`] implementations.
pub type ConnectionError = Box<dyn std::error::Error + Send + Sync>;

/// One entry of a concept's full listing.
///
/// A listing covers every node below a root concept, which the catalog
/// itself only does for the first child level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptListingEntry {
    /// Full ids of the node.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ConceptListingEntry {
    /// Creates an entry for a single id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            ids: vec![id.into()],
            label: None,
        }
    }
}

/// Access to the remote query service.
///
/// Implementations must be `Send + Sync` so batch translation can share
/// one connection across threads.
pub trait Connection: Send + Sync {
    /// Returns the catalog of a dataset.
    fn get_concepts(&self, dataset: &str) -> Result<Catalog, ConnectionError>;

    /// Returns the full listing below a root concept.
    fn get_concept(&self, root_concept_id: &ConqueryId)
        -> Result<Vec<ConceptListingEntry>, ConnectionError>;

    /// Submits a wire-encoded query to a dataset and returns its id.
    fn execute_query(
        &self,
        dataset: &str,
        query: &Value,
        label: Option<&str>,
    ) -> Result<ConqueryId, ConnectionError>;

    /// Fetches the wire-encoded tree of a stored query.
    fn get_query(&self, query_id: &ConqueryId) -> Result<Value, ConnectionError>;
}
