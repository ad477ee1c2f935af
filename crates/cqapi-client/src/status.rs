//! Response payloads of the query endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Execution state of a stored query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    /// Stored but never executed.
    New,
    /// Executing.
    Running,
    /// Finished with results.
    Done,
    /// Execution failed.
    Failed,
    /// Any state this client does not know.
    #[serde(other)]
    Unknown,
}

impl QueryStatus {
    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::New => "NEW",
            QueryStatus::Running => "RUNNING",
            QueryStatus::Done => "DONE",
            QueryStatus::Failed => "FAILED",
            QueryStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution info for one stored query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInfo {
    /// Query identifier.
    pub id: String,
    /// User label.
    #[serde(default)]
    pub label: Option<String>,
    /// Execution state.
    pub status: QueryStatus,
    /// Result row count once done.
    #[serde(default)]
    pub number_of_results: Option<u64>,
    /// Download urls, one per result format.
    #[serde(default)]
    pub result_urls: Vec<String>,
    /// The stored query tree in wire form.
    #[serde(default)]
    pub query: Option<Value>,
}

impl QueryInfo {
    /// The result url whose path ends in `.{extension}`.
    pub fn result_url(&self, extension: &str) -> Option<&str> {
        let suffix = format!(".{}", extension);
        self.result_urls
            .iter()
            .map(String::as_str)
            .find(|url| url.split('?').next().unwrap_or(url).ends_with(&suffix))
    }
}

/// Entry of the stored-query listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQuerySummary {
    /// Query identifier.
    pub id: String,
    /// User label.
    #[serde(default)]
    pub label: Option<String>,
    /// Query type tag, e.g. `CONCEPT_QUERY`.
    #[serde(default)]
    pub query_type: Option<String>,
    /// Creation timestamp as sent by the service.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A dataset visible to the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Dataset name.
    pub id: String,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
}

/// A secondary id a dataset can group by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIdDescription {
    /// Secondary id identifier.
    pub id: String,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Description text.
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_query_info() {
        let info: QueryInfo = serde_json::from_value(json!({
            "id": "dataset1.q1",
            "label": "Diabetes",
            "status": "DONE",
            "numberOfResults": 42,
            "resultUrls": [
                "http://localhost:8080/result/dataset1.q1.xlsx",
                "http://localhost:8080/result/dataset1.q1.csv"
            ],
            "owner": "user.admin"
        }))
        .unwrap();

        assert_eq!(info.status, QueryStatus::Done);
        assert_eq!(info.number_of_results, Some(42));
        assert_eq!(
            info.result_url("csv"),
            Some("http://localhost:8080/result/dataset1.q1.csv")
        );
        assert_eq!(info.result_url("arrow"), None);
    }

    #[test]
    fn test_unknown_status() {
        let info: QueryInfo =
            serde_json::from_value(json!({"id": "dataset1.q1", "status": "CANCELED"})).unwrap();
        assert_eq!(info.status, QueryStatus::Unknown);
        assert!(info.result_urls.is_empty());
    }

    #[test]
    fn test_result_url_ignores_query_string() {
        let info = QueryInfo {
            id: "dataset1.q1".to_string(),
            label: None,
            status: QueryStatus::Done,
            number_of_results: None,
            result_urls: vec!["http://h/result/q1.csv?charset=UTF-8".to_string()],
            query: None,
        };
        assert_eq!(info.result_url("csv"), Some("http://h/result/q1.csv?charset=UTF-8"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(QueryStatus::Running.to_string(), "RUNNING");
    }
}
