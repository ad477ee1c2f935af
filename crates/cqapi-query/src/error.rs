//! Error types for building and decoding query trees.

use thiserror::Error;

/// Errors that can occur while building, decoding or mutating a query tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A root-shaped node was placed where only a leaf-shaped node may go.
    #[error("a {child} node cannot be nested inside {parent}")]
    InvalidNesting {
        /// Wire tag of the node that rejected the child.
        parent: &'static str,
        /// Wire tag of the rejected child.
        child: &'static str,
    },

    /// A collection or identifier list that must be non-empty was empty.
    #[error("{0} must not be empty")]
    EmptyCollection(&'static str),

    /// No table of the concept matched the requested connectors.
    #[error("no connector found for concept {0}")]
    NoConnectorFound(String),

    /// The wire map's discriminator did not match the decoded variant.
    #[error("expected query type {expected}, found {found}")]
    QueryTypeMismatch {
        /// Tag the decoder expected.
        expected: &'static str,
        /// Tag found in the map.
        found: String,
    },

    /// The wire map's discriminator is not one of the known tags.
    #[error("unknown query type: {0}")]
    UnknownQueryType(String),

    /// A required wire field was absent or null.
    #[error("{query_type} is missing required field '{field}'")]
    MissingField {
        /// Wire tag of the node being decoded.
        query_type: &'static str,
        /// Name of the missing key.
        field: &'static str,
    },

    /// A wire field had the wrong shape or an unsupported value.
    #[error("invalid value for '{field}': {message}")]
    InvalidField {
        /// Name of the offending key.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// An identifier string could not be parsed.
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// An identifier has too few segments to derive a root concept.
    #[error("identifier '{0}' has no root concept")]
    MissingRootConcept(String),

    /// A value expected to be a dataset name does not look like one.
    #[error("'{0}' is not a valid dataset id")]
    InvalidDataset(String),

    /// A date string was not a `YYYY-MM-DD` calendar date.
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    /// An export-form feature was a query description that cannot be unwrapped.
    #[error("export form feature of type {0} cannot be used")]
    InvalidFeature(&'static str),
}

impl QueryError {
    pub(crate) fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }
}

/// Result type for query model operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_nesting() {
        let err = QueryError::InvalidNesting {
            parent: "AND",
            child: "CONCEPT_QUERY",
        };
        assert_eq!(
            err.to_string(),
            "a CONCEPT_QUERY node cannot be nested inside AND"
        );
    }

    #[test]
    fn test_error_display_type_mismatch() {
        let err = QueryError::QueryTypeMismatch {
            expected: "CONCEPT",
            found: "OR".to_string(),
        };
        assert_eq!(err.to_string(), "expected query type CONCEPT, found OR");
    }

    #[test]
    fn test_error_display_missing_field() {
        let err = QueryError::MissingField {
            query_type: "NEGATION",
            field: "child",
        };
        assert_eq!(
            err.to_string(),
            "NEGATION is missing required field 'child'"
        );
    }

    #[test]
    fn test_invalid_field_helper() {
        let err = QueryError::invalid_field("timeCountBefore", "must be non-negative");
        assert_eq!(
            err.to_string(),
            "invalid value for 'timeCountBefore': must be non-negative"
        );
    }
}
