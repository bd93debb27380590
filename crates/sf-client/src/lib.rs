//! # sf-toolkit-client
//!
//! Connection facade for Salesforce APIs.
//!
//! Everything above this crate (queries, collections, bulk jobs) talks to
//! Salesforce through the [`Connection`] trait. This crate provides:
//! - [`SalesforceClient`], the reqwest-backed implementation with retry,
//!   compression and rate-limit handling
//! - [`ConnectionRegistry`], a named, process-wide lookup of connections
//! - [`BlockingRuntime`], which drives the async algorithms from plain
//!   synchronous code
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        sf-toolkit-rest / sf-toolkit-bulk (algorithms)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  Connection trait
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   SalesforceClient                          │
//! │  - Holds instance URL, token and API version                │
//! │  - Builds REST / Tooling / Bulk URLs                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SfHttpClient                             │
//! │  - Raw HTTP with retry, compression, rate limiting          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sf_toolkit_client::{Connection, SalesforceClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sf_toolkit_client::Error> {
//!     let client = SalesforceClient::new("https://na1.salesforce.com", "00D...")?;
//!
//!     let page = client.query("SELECT Id FROM Account LIMIT 5", false).await?;
//!     println!("{} accounts", page.total_size);
//!     Ok(())
//! }
//! ```

mod blocking;
mod client;
mod config;
mod connection;
mod error;
mod registry;
mod request;
mod response;
mod retry;
mod salesforce_client;
pub mod security;

pub use blocking::{BlockingIter, BlockingRuntime};
pub use client::SfHttpClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use connection::{Connection, QueryResult};
pub use error::{Error, ErrorKind, Result};
pub use registry::{ConnectionRegistry, RegistrationGuard, DEFAULT_CONNECTION_NAME};
pub use request::{RequestBody, RequestBuilder, RequestMethod};
pub use response::{ApiUsage, Response};
pub use retry::{Backoff, BackoffStrategy, RetryConfig, RetryPolicy};
pub use salesforce_client::SalesforceClient;

/// Default Salesforce API version
pub const DEFAULT_API_VERSION: &str = "62.0";

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("sf-toolkit/", env!("CARGO_PKG_VERSION"));
