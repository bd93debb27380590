//! The connection facade every higher-level algorithm is written against.

use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::request::RequestBuilder;
use crate::response::Response;

/// An authenticated Salesforce session able to send requests.
///
/// Implementations attach credentials, resolve relative URLs against the
/// instance, and turn non-2xx responses into errors. Everything else
/// (query paging, collections, bulk jobs) is built on top of [`send`].
/// Methods take `&self`, so a single connection can be shared by many
/// in-flight requests.
///
/// [`send`]: Connection::send
pub trait Connection: Send + Sync {
    /// Base URL of the org, without a trailing slash.
    fn instance_url(&self) -> &str;

    /// API version such as `"62.0"`.
    fn api_version(&self) -> &str;

    /// Send a request and return the buffered response.
    fn send(&self, request: RequestBuilder) -> impl Future<Output = Result<Response>> + Send;

    /// Resolve a path against the instance URL. Absolute URLs pass through.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.instance_url(), path)
        } else {
            format!("{}/{}", self.instance_url(), path)
        }
    }

    /// `rest_url("sobjects/Account")` -> `{instance}/services/data/v62.0/sobjects/Account`
    fn rest_url(&self, path: &str) -> String {
        format!(
            "{}/services/data/v{}/{}",
            self.instance_url(),
            self.api_version(),
            path.trim_start_matches('/')
        )
    }

    /// `tooling_url("query")` -> `{instance}/services/data/v62.0/tooling/query`
    fn tooling_url(&self, path: &str) -> String {
        self.rest_url(&format!("tooling/{}", path.trim_start_matches('/')))
    }

    /// `bulk_url("ingest")` -> `{instance}/services/data/v62.0/jobs/ingest`
    fn bulk_url(&self, path: &str) -> String {
        self.rest_url(&format!("jobs/{}", path.trim_start_matches('/')))
    }

    /// GET a URL or path and deserialize the JSON body.
    fn get_json<T: DeserializeOwned + Send>(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<T>> + Send {
        let request = RequestBuilder::get(self.url(url));
        async move { self.send(request).await?.json() }
    }

    /// Execute a SOQL query and return the first page of raw rows.
    fn query(
        &self,
        soql: &str,
        tooling: bool,
    ) -> impl Future<Output = Result<QueryResult<serde_json::Value>>> + Send {
        let endpoint = if tooling {
            self.tooling_url("query")
        } else {
            self.rest_url("query")
        };
        debug!(tooling, soql, "Executing query");
        let request = RequestBuilder::get(endpoint).query("q", soql);
        async move { self.send(request).await?.json() }
    }

    /// Fetch the page behind a `nextRecordsUrl`.
    fn query_more(
        &self,
        next_records_url: &str,
    ) -> impl Future<Output = Result<QueryResult<serde_json::Value>>> + Send {
        self.get_json(next_records_url)
    }
}

impl<C: Connection> Connection for Arc<C> {
    fn instance_url(&self) -> &str {
        (**self).instance_url()
    }

    fn api_version(&self) -> &str {
        (**self).api_version()
    }

    fn send(&self, request: RequestBuilder) -> impl Future<Output = Result<Response>> + Send {
        (**self).send(request)
    }
}

/// One page of a SOQL query.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct QueryResult<T> {
    /// Total number of records matching the query.
    #[serde(rename = "totalSize")]
    pub total_size: u64,

    /// Whether this is the last page.
    pub done: bool,

    /// URL to fetch the next page.
    #[serde(rename = "nextRecordsUrl", default, skip_serializing_if = "Option::is_none")]
    pub next_records_url: Option<String>,

    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}
