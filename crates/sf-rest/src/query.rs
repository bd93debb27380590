//! Lazy SOQL result streams.
//!
//! Pages are fetched on demand: the first request is sent when the stream
//! is first polled, and each `nextRecordsUrl` is followed only once the
//! previous page has been consumed. Dropping the stream stops fetching.

use futures::stream::{self, Stream, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

use sf_toolkit_client::Connection;
use sf_toolkit_records::{decode_json_rows, Record, SObjectSchema};

use crate::error::{Error, Result};

pub use sf_toolkit_client::QueryResult;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Stream raw pages of a query.
pub fn query_pages<'a, C: Connection>(
    connection: &'a C,
    soql: String,
    tooling: bool,
) -> impl Stream<Item = Result<QueryResult<serde_json::Value>>> + 'a {
    stream::try_unfold(Cursor::Start, move |cursor| {
        let soql = soql.clone();
        async move { next_page(connection, &soql, tooling, cursor).await }
    })
}

async fn next_page<C: Connection>(
    connection: &C,
    soql: &str,
    tooling: bool,
    cursor: Cursor,
) -> Result<Option<(QueryResult<serde_json::Value>, Cursor)>> {
    let page = match cursor {
        Cursor::Start => connection.query(soql, tooling).await?,
        Cursor::Next(url) => connection.query_more(&url).await?,
        Cursor::Done => return Ok(None),
    };
    debug!(
        records = page.records.len(),
        total_size = page.total_size,
        done = page.done,
        "Fetched query page"
    );
    let next = match (&page.next_records_url, page.done) {
        (Some(url), false) => Cursor::Next(url.clone()),
        _ => Cursor::Done,
    };
    Ok(Some((page, next)))
}

/// Stream raw rows of a query.
pub fn query_rows<'a, C: Connection>(
    connection: &'a C,
    soql: String,
    tooling: bool,
) -> impl Stream<Item = Result<serde_json::Value>> + 'a {
    query_pages(connection, soql, tooling)
        .map_ok(|page| stream::iter(page.records.into_iter().map(Ok::<_, Error>)))
        .try_flatten()
}

/// Stream rows decoded into records of `schema`.
pub fn query_records<'a, C: Connection>(
    connection: &'a C,
    soql: String,
    tooling: bool,
    schema: Arc<SObjectSchema>,
) -> impl Stream<Item = Result<Record>> + 'a {
    query_pages(connection, soql, tooling)
        .and_then(move |page| {
            let decoded = decode_json_rows(&schema, &page.records).map_err(Error::from);
            async move { decoded }
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, Error>)))
        .try_flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{paged_query, MockConnection};
    use futures::StreamExt;
    use sf_toolkit_client::BlockingRuntime;
    use sf_toolkit_records::{FieldSchema, FieldType};

    fn contact() -> Arc<SObjectSchema> {
        Arc::new(
            SObjectSchema::new(
                "Contact",
                vec![
                    FieldSchema::new("Id", FieldType::Id).readonly(),
                    FieldSchema::new("LastName", FieldType::Text),
                ],
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_pages_follow_next_records_url() {
        let connection = MockConnection::new(paged_query(120, 50));
        let pages: Vec<_> = query_pages(&connection, "SELECT Id FROM Contact".into(), false)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].records.len(), 20);
        assert!(pages[2].done);
        assert_eq!(connection.calls(), 3);
        assert_eq!(
            connection.requests()[0].query_param("q"),
            Some("SELECT Id FROM Contact")
        );
    }

    #[tokio::test]
    async fn test_stopping_early_fetches_only_needed_pages() {
        let connection = MockConnection::new(paged_query(1000, 50));
        let first: Vec<Record> = query_records(
            &connection,
            "SELECT Id, LastName FROM Contact".into(),
            false,
            contact(),
        )
        .take(100)
        .try_collect()
        .await
        .unwrap();

        assert_eq!(first.len(), 100);
        assert_eq!(connection.calls(), 2);
        assert_eq!(first[99].id(), Some("003000000000099AAA"));
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let connection = MockConnection::new(paged_query(10, 5));
        let stream = query_rows(&connection, "SELECT Id FROM Contact".into(), false);
        assert_eq!(connection.calls(), 0);
        drop(stream);
        assert_eq!(connection.calls(), 0);
    }

    #[tokio::test]
    async fn test_tooling_endpoint() {
        let connection = MockConnection::new(paged_query(1, 5));
        let rows: Vec<_> = query_rows(&connection, "SELECT Id FROM ApexClass".into(), true)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(connection.requests()[0].url().ends_with("/tooling/query"));
    }

    #[test]
    fn test_blocking_iteration() {
        let runtime = BlockingRuntime::new().unwrap();
        let connection = MockConnection::new(paged_query(7, 3));
        let names: Vec<String> = runtime
            .iter(query_records(
                &connection,
                "SELECT Id, LastName FROM Contact".into(),
                false,
                contact(),
            ))
            .map(|record| {
                record
                    .unwrap()
                    .get("LastName")
                    .and_then(|v| v.as_str())
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(names.len(), 7);
        assert_eq!(names[6], "Contact 6");
        assert_eq!(connection.calls(), 3);
    }
}
