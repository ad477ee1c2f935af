//! Error types for query translation.

use cqapi_query::QueryError;
use thiserror::Error;

use crate::traits::ConnectionError;

/// Errors that can occur while translating a query to another dataset.
///
/// Identifiers missing from the target catalog are not errors; they are
/// dropped and recorded in the [`RemovedIdentifiers`](crate::RemovedIdentifiers)
/// of the outcome. The variants here stop a translation outright.
#[derive(Error, Debug)]
pub enum TranslateError {
    /// The tree references a stored query, which has no counterpart in
    /// another dataset.
    #[error("Saved queries can not be translated")]
    SavedQueryTranslation,

    /// The tree contains an uploaded entity list.
    #[error("External queries can not be translated")]
    ExternalQueryTranslation,

    /// A concept id below the first child level was checked without a set
    /// of known descendant ids.
    #[error("Known descendant ids required to resolve {0}")]
    MissingDescendantIds(String),

    /// A removed identifier could not be found in the catalog while
    /// resolving labels.
    #[error("Identifier not found in catalog: {0}")]
    UnresolvableIdentifier(String),

    /// The target catalog has no entries, so no dataset can be derived.
    #[error("Target catalog is empty")]
    EmptyCatalog,

    /// Nothing of the query survived translation.
    #[error("Nothing of query {0} exists in the target dataset")]
    NothingTranslated(String),

    /// The node kind has no translation.
    #[error("Unsupported node for translation: {0}")]
    UnsupportedNode(&'static str),

    /// Error from the connection collaborator.
    #[error("Connection error: {0}")]
    Connection(#[source] ConnectionError),

    /// Error from the query model.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Result type for translation operations.
pub type TranslateResult<T> = std::result::Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_saved_query() {
        let err = TranslateError::SavedQueryTranslation;
        assert_eq!(err.to_string(), "Saved queries can not be translated");
    }

    #[test]
    fn test_error_display_missing_descendants() {
        let err = TranslateError::MissingDescendantIds("dataset2.icd.a00-b99.a00".to_string());
        assert_eq!(
            err.to_string(),
            "Known descendant ids required to resolve dataset2.icd.a00-b99.a00"
        );
    }

    #[test]
    fn test_error_display_unsupported_node() {
        let err = TranslateError::UnsupportedNode("EXPORT_FORM");
        assert_eq!(err.to_string(), "Unsupported node for translation: EXPORT_FORM");
    }

    #[test]
    fn test_error_display_connection() {
        let err = TranslateError::Connection("connection refused".into());
        assert_eq!(err.to_string(), "Connection error: connection refused");
    }

    #[test]
    fn test_error_from_query_error() {
        let err: TranslateError = QueryError::MissingRootConcept("dataset1".to_string()).into();
        assert!(matches!(err, TranslateError::Query(QueryError::MissingRootConcept(_))));
        assert_eq!(err.to_string(), "identifier 'dataset1' has no root concept");
    }
}
