//! Blocking client for the query service REST API.

use std::thread;

use cqapi_query::{Catalog, ConqueryId};
use cqapi_translate::{ConceptListingEntry, Connection, ConnectionError};
use parking_lot::RwLock;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, ConfigError};
use crate::status::{
    DatasetInfo, QueryInfo, QueryStatus, SecondaryIdDescription, StoredQuerySummary,
};
use crate::urls::ApiUrls;

/// Blocking HTTP client authenticated with a bearer token.
///
/// The token can be swapped at runtime with [`update_token`](Self::update_token);
/// all other settings are fixed at construction.
pub struct ConqueryClient {
    http: Client,
    urls: ApiUrls,
    token: RwLock<String>,
    config: ClientConfig,
}

impl std::fmt::Debug for ConqueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConqueryClient")
            .field("url", &self.urls.base())
            .field("dataset", &self.config.dataset)
            .finish_non_exhaustive()
    }
}

impl ConqueryClient {
    /// Creates a client from a configuration.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            urls: ApiUrls::new(&config.url),
            token: RwLock::new(config.token.clone()),
            config,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Url builder for this client's service.
    pub fn urls(&self) -> &ApiUrls {
        &self.urls
    }

    /// Replaces the bearer token used for subsequent requests.
    pub fn update_token(&self, token: impl Into<String>) {
        *self.token.write() = token.into();
        debug!("token updated");
    }

    /// Picks `dataset` or falls back to the configured default.
    pub fn resolve_dataset<'a>(&'a self, dataset: Option<&'a str>) -> ClientResult<&'a str> {
        dataset
            .or(self.config.dataset.as_deref())
            .ok_or(ClientError::Config(ConfigError::MissingSetting("dataset")))
    }

    // =========================================================================
    // Datasets and concepts
    // =========================================================================

    /// Lists the datasets visible to the token.
    pub fn get_datasets(&self) -> ClientResult<Vec<DatasetInfo>> {
        self.get_json(&self.urls.datasets())
    }

    /// Returns the active root concepts of a dataset.
    pub fn get_concepts(&self, dataset: &str) -> ClientResult<Catalog> {
        let mut response: Map<String, Value> = self.get_json(&self.urls.concepts(dataset))?;
        let concepts = response.remove("concepts").ok_or_else(|| {
            ClientError::UnexpectedResponse(format!("no concepts listed for dataset {}", dataset))
        })?;
        let mut catalog = Catalog::from_json(concepts)?;
        catalog.retain_active();
        debug!(dataset, concepts = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Returns the secondary ids a dataset can group by.
    pub fn get_secondary_ids(&self, dataset: &str) -> ClientResult<Vec<SecondaryIdDescription>> {
        let mut response: Map<String, Value> = self.get_json(&self.urls.concepts(dataset))?;
        match response.remove("secondaryIds") {
            Some(ids) => Ok(serde_json::from_value(ids)?),
            None => Ok(Vec::new()),
        }
    }

    /// Returns every node below a root concept.
    pub fn get_concept(&self, root_concept_id: &ConqueryId) -> ClientResult<Vec<ConceptListingEntry>> {
        let dataset = dataset_of(root_concept_id)?;
        let url = self.urls.concept(dataset, &root_concept_id.to_string());
        let response: Map<String, Value> = self.get_json(&url)?;

        Ok(response
            .into_iter()
            .map(|(id, attributes)| ConceptListingEntry {
                ids: vec![id],
                label: attributes
                    .get("label")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect())
    }

    // =========================================================================
    // Stored queries
    // =========================================================================

    /// Lists the stored queries of a dataset.
    pub fn get_stored_queries(&self, dataset: &str) -> ClientResult<Vec<StoredQuerySummary>> {
        self.get_json(&self.urls.queries(dataset))
    }

    /// Returns the execution info of a stored query.
    pub fn get_query_info(&self, query_id: &ConqueryId) -> ClientResult<QueryInfo> {
        let url = self.urls.query(dataset_of(query_id)?, &query_id.to_string());
        self.get_json(&url)
    }

    /// Returns the wire-encoded tree of a stored query.
    pub fn get_query(&self, query_id: &ConqueryId) -> ClientResult<Value> {
        let url = self.urls.query(dataset_of(query_id)?, &query_id.to_string());
        let mut response: Map<String, Value> = self.get_json(&url)?;
        response.remove("query").ok_or_else(|| {
            ClientError::UnexpectedResponse(format!("stored query {} has no query", query_id))
        })
    }

    /// Returns the result row count, if the query has finished.
    pub fn get_number_of_results(&self, query_id: &ConqueryId) -> ClientResult<Option<u64>> {
        Ok(self.get_query_info(query_id)?.number_of_results)
    }

    /// Submits a query to a dataset and returns its id.
    ///
    /// A label, if given, is set with a second request.
    pub fn execute_query(
        &self,
        dataset: &str,
        query: &Value,
        label: Option<&str>,
    ) -> ClientResult<ConqueryId> {
        let url = self.urls.queries(dataset);
        debug!(method = "POST", url = %url, "request");
        let response: Map<String, Value> = decode(self.send(self.http.post(&url).json(query), &url)?)?;

        let id = match response.get("id").and_then(Value::as_str) {
            Some(id) => ConqueryId::parse(id)?,
            None => {
                let message = response
                    .get("message")
                    .or_else(|| response.get("details"))
                    .map(|value| value.as_str().map_or_else(|| value.to_string(), str::to_string))
                    .unwrap_or_else(|| Value::Object(response.clone()).to_string());
                return Err(ClientError::UnexpectedResponse(message));
            }
        };

        if let Some(label) = label {
            let query_url = self.urls.query(dataset, &id.to_string());
            debug!(method = "PATCH", url = %query_url, "request");
            self.send(self.http.patch(&query_url).json(&json!({ "label": label })), &query_url)?;
        }

        info!(dataset, query = %id, "query submitted");
        Ok(id)
    }

    /// Runs a stored query again.
    pub fn reexecute_query(&self, query_id: &ConqueryId) -> ClientResult<()> {
        let url = self.urls.reexecute(dataset_of(query_id)?, &query_id.to_string());
        debug!(method = "POST", url = %url, "request");
        self.send(self.http.post(&url), &url)?;
        info!(query = %query_id, "query re-executed");
        Ok(())
    }

    /// Deletes a stored query.
    pub fn delete_stored_query(&self, query_id: &ConqueryId) -> ClientResult<()> {
        let url = self.urls.query(dataset_of(query_id)?, &query_id.to_string());
        debug!(method = "DELETE", url = %url, "request");
        self.send(self.http.delete(&url), &url)?;
        info!(query = %query_id, "stored query deleted");
        Ok(())
    }

    // =========================================================================
    // Execution state and results
    // =========================================================================

    /// Polls until the query leaves `RUNNING`.
    ///
    /// Returns the final info when `DONE`. `NEW`, `FAILED` and unknown states
    /// are errors, as is still running after `max_polls` polls.
    pub fn wait_for_query_to_finish(&self, query_id: &ConqueryId) -> ClientResult<QueryInfo> {
        for poll in 1..=self.config.max_polls {
            let info = self.get_query_info(query_id)?;
            match info.status {
                QueryStatus::Done => return Ok(info),
                QueryStatus::Running => {
                    debug!(query = %query_id, poll, "query running");
                    thread::sleep(self.config.poll_interval);
                }
                QueryStatus::New => return Err(ClientError::QueryStillNew(query_id.to_string())),
                QueryStatus::Failed => {
                    warn!(query = %query_id, "query failed");
                    return Err(ClientError::QueryFailed(query_id.to_string()));
                }
                QueryStatus::Unknown => {
                    return Err(ClientError::UnexpectedResponse(format!(
                        "query {} is in an unknown state",
                        query_id
                    )))
                }
            }
        }
        Err(ClientError::PollLimitReached {
            query_id: query_id.to_string(),
            polls: self.config.max_polls,
        })
    }

    /// Waits for the query and downloads its CSV result.
    ///
    /// A query still in `NEW` is re-executed once.
    pub fn get_query_result_csv(&self, query_id: &ConqueryId) -> ClientResult<String> {
        let info = match self.wait_for_query_to_finish(query_id) {
            Err(ClientError::QueryStillNew(_)) => {
                info!(query = %query_id, "query never ran, re-executing");
                self.reexecute_query(query_id)?;
                thread::sleep(self.config.poll_interval);
                self.wait_for_query_to_finish(query_id)?
            }
            other => other?,
        };

        let url = info.result_url("csv").ok_or_else(|| {
            ClientError::UnexpectedResponse(format!("query {} has no csv result", query_id))
        })?;
        debug!(method = "GET", url, "request");
        let response = self.send(self.http.get(url).query(&[("pretty", "false")]), url)?;
        Ok(response.text()?)
    }

    // =========================================================================
    // Transport
    // =========================================================================

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> ClientResult<T> {
        debug!(method = "GET", url, "request");
        decode(self.send(self.http.get(url), url)?)
    }

    fn send(&self, request: RequestBuilder, url: &str) -> ClientResult<Response> {
        let token = self.token.read().clone();
        let response = request.bearer_auth(token).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        warn!(status = status.as_u16(), url, "request rejected");
        Err(ClientError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        })
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let text = response.text()?;
    Ok(serde_json::from_str(&text)?)
}

/// The dataset segment every service identifier starts with.
fn dataset_of(id: &ConqueryId) -> ClientResult<&str> {
    id.segments()
        .first()
        .map(String::as_str)
        .ok_or_else(|| ClientError::UnexpectedResponse(format!("identifier {} names no dataset", id)))
}

impl Connection for ConqueryClient {
    fn get_concepts(&self, dataset: &str) -> Result<Catalog, ConnectionError> {
        ConqueryClient::get_concepts(self, dataset).map_err(Into::into)
    }

    fn get_concept(&self, root_concept_id: &ConqueryId) -> Result<Vec<ConceptListingEntry>, ConnectionError> {
        ConqueryClient::get_concept(self, root_concept_id).map_err(Into::into)
    }

    fn execute_query(
        &self,
        dataset: &str,
        query: &Value,
        label: Option<&str>,
    ) -> Result<ConqueryId, ConnectionError> {
        ConqueryClient::execute_query(self, dataset, query, label).map_err(Into::into)
    }

    fn get_query(&self, query_id: &ConqueryId) -> Result<Value, ConnectionError> {
        ConqueryClient::get_query(self, query_id).map_err(Into::into)
    }
}
