//! # sf-toolkit-bulk
//!
//! Salesforce Bulk API 2.0 jobs driven by typed records.
//!
//! ## Features
//!
//! - **Ingest Jobs** - Insert, Update, Upsert, Delete, Hard Delete with uploads
//!   split under the request size limit
//! - **Per-record Outcomes** - Result files mapped back to input positions
//! - **Query Jobs** - Query and QueryAll from a [`QueryBuilder`], with bulk-incompatible
//!   clauses rejected before any request
//! - **Job Monitoring** - Refresh, poll with capped backoff, resume by id, abort
//! - **Lazy Results** - Query result pages fetched as the stream is consumed
//!
//! ## Example - Bulk Query
//!
//! ```rust,ignore
//! use sf_toolkit_bulk::{BulkQueryJob, QueryBuilder, QueryJobOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sf_toolkit_bulk::Error> {
//!     let client = sf_toolkit_client::SalesforceClient::new(
//!         "https://myorg.my.salesforce.com",
//!         "access_token",
//!     )?;
//!
//!     let query = QueryBuilder::new("Account")?
//!         .select(["Id", "Name", "Industry"])?
//!         .where_eq("Industry", "Technology")?;
//!
//!     let mut job = BulkQueryJob::init_job(client, &query, QueryJobOptions::default()).await?;
//!     job.monitor_until_complete(Duration::from_secs(600)).await?;
//!
//!     let accounts = job.into_results()?.as_list().await?;
//!     println!("Retrieved {} records", accounts.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Example - Bulk Insert
//!
//! ```rust,ignore
//! use sf_toolkit_bulk::{execute_ingest, BulkOperation, CreateIngestJobRequest};
//! use std::time::Duration;
//!
//! let result = execute_ingest(
//!     client,
//!     CreateIngestJobRequest::new("Account", BulkOperation::Insert),
//!     &accounts,
//!     Duration::from_secs(600),
//! )
//! .await?;
//!
//! println!("{:.0}% succeeded", result.success_rate() * 100.0);
//! ```

mod error;
mod ingest;
mod monitor;
mod query;
mod types;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind, Result};
pub use ingest::{execute_ingest, BulkIngestJob};
pub use monitor::PollConfig;
pub use query::{BulkQueryJob, BulkQueryResult, ResultPage};
pub use types::*;

// Re-export QueryBuilder for convenient access
pub use sf_toolkit_rest::{Filter, OrderDirection, QueryBuilder};
