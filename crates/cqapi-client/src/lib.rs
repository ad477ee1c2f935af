//! # cqapi-client
//!
//! Blocking HTTP client for the query service REST API.
//!
//! The client lists datasets and concept catalogs, submits and labels
//! queries, polls their execution state and downloads CSV results. It
//! implements [`cqapi_translate::Connection`], so a [`ConqueryClient`] can
//! drive cross-dataset translation directly.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cqapi_client::{ClientConfig, ConqueryClient};
//! use cqapi_translate::Translator;
//!
//! let client = ConqueryClient::new(ClientConfig::load("cqapi.yaml")?)?;
//!
//! let query_id = client.execute_query("dataset1", &query.to_wire(), Some("Diabetes"))?;
//! let csv = client.get_query_result_csv(&query_id)?;
//!
//! let translator = Translator::new(&client);
//! let moved = translator.translate_and_execute_stored_query(&query_id, "dataset2")?;
//! ```
//!
//! ## Configuration
//!
//! See [`ClientConfig`] for the YAML keys and the `CQAPI_*` environment
//! variables that override them.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod client;
mod config;
mod error;
mod status;
mod urls;

pub use client::ConqueryClient;
pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};
pub use error::{ClientError, ClientResult, ConfigError};
pub use status::{DatasetInfo, QueryInfo, QueryStatus, SecondaryIdDescription, StoredQuerySummary};
pub use urls::ApiUrls;
