//! REST query and sObject Collections tests.

use super::common::{require_connection, rest_client, unique_name};
use sf_toolkit::rest::{FetchOptions, QueryBuilder, SaveOptions};
use sf_toolkit::{FieldValue, Record};

#[tokio::test]
async fn test_describe_and_query_accounts() {
    let Some(connection) = require_connection() else {
        return;
    };
    let client = rest_client(&connection);

    let account = client.describe("Account").await.expect("describe Account");
    assert!(account.field("Name").is_some());

    let query = QueryBuilder::for_schema(account)
        .expect("query for Account")
        .select(["Id", "Name"])
        .expect("known fields")
        .limit(5);
    let records = client.fetch_all(&query).await.expect("fetch accounts");
    assert!(records.len() <= 5);
    assert!(records.iter().all(|r| r.id().is_some()));
}

#[tokio::test]
async fn test_collections_round_trip() {
    let Some(connection) = require_connection() else {
        return;
    };
    let client = rest_client(&connection);
    let account = client.describe("Account").await.expect("describe Account");

    let mut records: Vec<Record> = (0..3)
        .map(|i| {
            Record::new(account.clone())
                .with("Name", unique_name(&format!("Collections {i}")))
                .expect("Name is writable")
        })
        .collect();

    let options = SaveOptions::default().with_batch_size(2);
    let outcomes = client
        .save_insert(&mut records, &options)
        .await
        .expect("insert accounts");
    assert!(outcomes.iter().all(|o| o.is_success()), "{outcomes:?}");
    assert!(records.iter().all(|r| r.id().is_some() && !r.is_dirty()));

    records[1].set("Description", "updated").expect("Description is writable");
    let updated = client
        .save_update(&mut records, &options.clone().with_only_changes(true))
        .await
        .expect("update accounts");
    assert!(updated.iter().all(|o| o.is_success()));

    let ids: Vec<&str> = records.iter().filter_map(Record::id).collect();
    let fetched = client
        .fetch_list(&account, &ids, &FetchOptions::default())
        .await
        .expect("fetch by ids");
    assert_eq!(
        fetched[1]
            .as_ref()
            .ok()
            .and_then(Option::as_ref)
            .and_then(|r| r.get("Description")),
        Some(&FieldValue::from("updated"))
    );

    let deleted = client
        .delete(&mut records, true, &options)
        .await
        .expect("delete accounts");
    assert!(deleted.iter().all(|o| o.is_success()));
    assert!(records.iter().all(|r| r.id().is_none()));
}
