//! Bulk API 2.0 integration tests.

use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use sf_toolkit::bulk::{
    execute_ingest, BulkOperation, BulkQueryJob, CreateIngestJobRequest, JobState,
    QueryJobOptions,
};
use sf_toolkit::rest::QueryBuilder;
use sf_toolkit::Record;

use super::common::{require_connection, rest_client, unique_name, TEST_PREFIX};

const TIMEOUT: Duration = Duration::from_secs(600);

#[tokio::test]
async fn test_bulk_insert_then_delete() {
    let Some(connection) = require_connection() else {
        return;
    };
    let connection = Arc::new(connection);
    let account = rest_client(&connection)
        .describe("Account")
        .await
        .expect("describe Account");

    let records: Vec<Record> = (0..5)
        .map(|i| {
            Record::new(account.clone())
                .with("Name", unique_name(&format!("Bulk {i}")))
                .expect("Name is writable")
        })
        .collect();

    let inserted = execute_ingest(
        connection.clone(),
        CreateIngestJobRequest::new("Account", BulkOperation::Insert),
        &records,
        TIMEOUT,
    )
    .await
    .expect("bulk insert");
    assert_eq!(inserted.job.state, JobState::JobComplete);
    assert!(inserted.is_success(), "{:?}", inserted.outcomes);

    let created: Vec<Record> = inserted
        .outcomes
        .iter()
        .filter_map(|o| o.id())
        .map(|id| {
            let mut record = Record::new(account.clone());
            record.assign_id(id);
            record
        })
        .collect();
    assert_eq!(created.len(), records.len());

    let deleted = execute_ingest(
        connection,
        CreateIngestJobRequest::new("Account", BulkOperation::Delete),
        &created,
        TIMEOUT,
    )
    .await
    .expect("bulk delete");
    assert!(deleted.is_success());
}

#[tokio::test]
async fn test_bulk_query_streams_records() {
    let Some(connection) = require_connection() else {
        return;
    };

    let query = QueryBuilder::new("Account")
        .expect("query for Account")
        .select(["Id", "Name"])
        .expect("valid fields")
        .where_like("Name", &format!("{TEST_PREFIX}%"))
        .expect("valid filter");

    let mut job = BulkQueryJob::init_job(connection, &query, QueryJobOptions::default())
        .await
        .expect("create query job")
        .with_max_records(1000);
    let state = job.monitor_until_complete(TIMEOUT).await.expect("query job");
    assert_eq!(state, JobState::JobComplete);

    let results = job.into_results().expect("results available");
    let records: Vec<Record> = results.records().try_collect().await.expect("stream rows");
    assert!(records.iter().all(|r| r.sobject() == "Account"));
}
