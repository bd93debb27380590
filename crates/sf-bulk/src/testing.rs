//! In-memory connection for unit tests.

use serde_json::{json, Value};
use std::sync::Mutex;

use sf_toolkit_client::{Connection, RequestBuilder, Response};

type Handler = dyn Fn(&RequestBuilder) -> sf_toolkit_client::Result<Response> + Send + Sync;

/// Records every request and answers it from a handler closure.
pub(crate) struct MockConnection {
    handler: Box<Handler>,
    requests: Mutex<Vec<RequestBuilder>>,
}

impl std::fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl MockConnection {
    pub(crate) fn new(
        handler: impl Fn(&RequestBuilder) -> sf_toolkit_client::Result<Response> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<RequestBuilder> {
        self.requests.lock().unwrap().clone()
    }
}

impl Connection for MockConnection {
    fn instance_url(&self) -> &str {
        "https://test.my.salesforce.com"
    }

    fn api_version(&self) -> &str {
        "62.0"
    }

    async fn send(&self, request: RequestBuilder) -> sf_toolkit_client::Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}

/// A job info body as the Bulk API returns it.
pub(crate) fn job_body(id: &str, operation: &str, state: &str) -> Value {
    json!({
        "id": id,
        "operation": operation,
        "object": "Contact",
        "createdDate": "2024-05-01T12:30:00.000+0000",
        "state": state,
        "concurrencyMode": "Parallel",
        "contentType": "CSV",
        "apiVersion": 62.0,
        "lineEnding": "LF",
        "columnDelimiter": "COMMA",
        "contentUrl": format!("services/data/v62.0/jobs/ingest/{id}/batches"),
        "numberRecordsProcessed": 0,
        "numberRecordsFailed": 0
    })
}
