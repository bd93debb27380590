//! In-memory connection for unit tests.

use serde_json::json;
use std::sync::Mutex;

use sf_toolkit_client::{Connection, RequestBuilder, Response};

type Handler = dyn Fn(&RequestBuilder) -> sf_toolkit_client::Result<Response> + Send + Sync;

/// Records every request and answers it from a handler closure.
pub(crate) struct MockConnection {
    handler: Box<Handler>,
    requests: Mutex<Vec<RequestBuilder>>,
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

/// A handler serving `total` Contact rows in pages of `page_size`.
pub(crate) fn paged_query(
    total: usize,
    page_size: usize,
) -> impl Fn(&RequestBuilder) -> sf_toolkit_client::Result<Response> + Send + Sync + 'static {
    move |request| {
        let offset = request
            .url()
            .rsplit_once("01gMOCK-")
            .and_then(|(_, offset)| offset.parse::<usize>().ok())
            .unwrap_or(0);
        let end = (offset + page_size).min(total);
        let records: Vec<_> = (offset..end)
            .map(|i| {
                json!({
                    "attributes": {"type": "Contact"},
                    "Id": format!("003{i:012}AAA"),
                    "LastName": format!("Contact {i}")
                })
            })
            .collect();
        let mut page = json!({
            "totalSize": total,
            "done": end >= total,
            "records": records
        });
        if end < total {
            page["nextRecordsUrl"] = json!(format!("/services/data/v62.0/query/01gMOCK-{end}"));
        }
        Ok(Response::json_body(200, &page))
    }
}
