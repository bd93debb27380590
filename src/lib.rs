//! # sf-toolkit
//!
//! Typed Salesforce records over the REST and Bulk API 2.0.
//!
//! Records are described by a schema registry, built with a SOQL query
//! builder, saved in concurrent sObject Collections batches, and moved in
//! bulk through Bulk API 2.0 ingest and query jobs.
//!
//! ## Security
//!
//! - Access tokens are redacted in Debug output
//! - Tracing/logging skips credential parameters
//! - Error messages sanitize any credential data
//!
//! ## Crates
//!
//! - **sf-toolkit-client** - Connection facade: HTTP transport with retry, connection registry, blocking adapter
//! - **sf-toolkit-records** - Schema registry, typed records with dirty tracking, JSON and CSV codecs
//! - **sf-toolkit-rest** - SOQL query builder, query streams, sObject Collections list operations
//! - **sf-toolkit-bulk** - Bulk API 2.0 ingest and query jobs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sf_toolkit::rest::{QueryBuilder, SalesforceRestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SalesforceRestClient::new(
//!         "https://myorg.my.salesforce.com",
//!         "access_token",
//!     )?;
//!
//!     let account = client.describe("Account").await?;
//!     let query = QueryBuilder::for_schema(account)?.limit(10);
//!
//!     for record in client.fetch_all(&query).await? {
//!         println!("{:?}", record.get("Name"));
//!     }
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "bulk")]
pub use sf_toolkit_bulk as bulk;
#[cfg(feature = "client")]
pub use sf_toolkit_client as client;
#[cfg(feature = "records")]
pub use sf_toolkit_records as records;
#[cfg(feature = "rest")]
pub use sf_toolkit_rest as rest;

#[cfg(feature = "bulk")]
pub use sf_toolkit_bulk::{BulkIngestJob, BulkQueryJob};
#[cfg(feature = "client")]
pub use sf_toolkit_client::{ClientConfig, Connection, ConnectionRegistry, SalesforceClient};
#[cfg(feature = "records")]
pub use sf_toolkit_records::{FieldValue, Record, SObjectSchema, SchemaRegistry};
#[cfg(feature = "rest")]
pub use sf_toolkit_rest::{Filter, QueryBuilder, SalesforceRestClient};
