//! # sf-toolkit-rest
//!
//! Typed SOQL construction and concurrent record operations over the
//! Salesforce REST API.
//!
//! ## Features
//!
//! - **Query Builder** - Compose SOQL with escaped literals and validated field names
//! - **Streaming Queries** - Lazily follow `nextRecordsUrl` pages as rows are consumed
//! - **Describe** - Build and register sObject schemas from describe metadata
//! - **SObject Collections** - Insert, update, upsert, delete and fetch lists of
//!   records with bounded concurrency and per-record outcomes
//!
//! ## Example
//!
//! ```rust,ignore
//! use sf_toolkit_rest::{Filter, QueryBuilder, SalesforceRestClient, SaveOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sf_toolkit_rest::Error> {
//!     let client = SalesforceRestClient::new(
//!         "https://myorg.my.salesforce.com",
//!         "access_token_here",
//!     )?;
//!
//!     let contact = client.describe("Contact").await?;
//!     let query = QueryBuilder::for_schema(contact)?
//!         .filter(Filter::eq("MailingState", "CA").or(Filter::eq("MailingState", "WA")))
//!         .limit(500);
//!
//!     let mut contacts = client.fetch_all(&query).await?;
//!     for contact in &mut contacts {
//!         contact.set("Description", "West coast")?;
//!     }
//!
//!     let options = SaveOptions::default().with_concurrency(4).with_only_changes(true);
//!     let outcomes = client.save_update(&mut contacts, &options).await?;
//!     println!("{} failed", outcomes.iter().filter(|o| !o.is_success()).count());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod collections;
mod dispatch;
mod error;
mod filter;
mod query;
mod query_builder;

#[cfg(test)]
mod testing;

// Main client
pub use client::SalesforceRestClient;

// Collection operations
pub use collections::{
    CollectionRequest, CollectionResult, FetchOptions, FetchResult, RetrieveRequest,
    SalesforceError, SaveOptions, SaveOutcome,
};

// Concurrency
pub use dispatch::{Dispatcher, Progress, MAX_COLLECTION_BATCH, MAX_FETCH_BATCH};

// Error types
pub use error::{Error, ErrorKind, Result};

// Query construction
pub use filter::{parse_keyword, Filter, Operator, SoqlValue};
pub use query_builder::{OrderDirection, QueryBuilder};

// Query execution
pub use query::{query_pages, query_records, query_rows, QueryResult};
