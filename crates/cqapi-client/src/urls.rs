//! Endpoint url construction.

/// Builds endpoint urls below one service base url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiUrls {
    base: String,
}

impl ApiUrls {
    /// Creates url builder; trailing slashes on `base` are dropped.
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// The base url.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// `{base}/api/datasets`
    pub fn datasets(&self) -> String {
        format!("{}/api/datasets", self.base)
    }

    fn dataset(&self, dataset: &str) -> String {
        format!("{}/{}", self.datasets(), dataset)
    }

    /// `{base}/api/datasets/{dataset}/concepts`
    pub fn concepts(&self, dataset: &str) -> String {
        format!("{}/concepts", self.dataset(dataset))
    }

    /// `{base}/api/datasets/{dataset}/concepts/{concept_id}`
    pub fn concept(&self, dataset: &str, concept_id: &str) -> String {
        format!("{}/{}", self.concepts(dataset), concept_id)
    }

    /// `{base}/api/datasets/{dataset}/queries`
    pub fn queries(&self, dataset: &str) -> String {
        format!("{}/queries", self.dataset(dataset))
    }

    /// `{base}/api/datasets/{dataset}/queries/{query_id}`
    pub fn query(&self, dataset: &str, query_id: &str) -> String {
        format!("{}/{}", self.queries(dataset), query_id)
    }

    /// `{base}/api/datasets/{dataset}/queries/{query_id}/reexecute`
    pub fn reexecute(&self, dataset: &str, query_id: &str) -> String {
        format!("{}/reexecute", self.query(dataset, query_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_dropped() {
        let urls = ApiUrls::new("http://localhost:8080//");
        assert_eq!(urls.base(), "http://localhost:8080");
        assert_eq!(urls.datasets(), "http://localhost:8080/api/datasets");
    }

    #[test]
    fn test_dataset_urls() {
        let urls = ApiUrls::new("https://cq.example.org");
        assert_eq!(
            urls.concepts("dataset1"),
            "https://cq.example.org/api/datasets/dataset1/concepts"
        );
        assert_eq!(
            urls.concept("dataset1", "dataset1.icd"),
            "https://cq.example.org/api/datasets/dataset1/concepts/dataset1.icd"
        );
        assert_eq!(
            urls.reexecute("dataset1", "dataset1.q1"),
            "https://cq.example.org/api/datasets/dataset1/queries/dataset1.q1/reexecute"
        );
    }
}
