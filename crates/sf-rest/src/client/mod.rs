//! Salesforce REST API client.
//!
//! This client wraps any [`Connection`] (by default the reqwest-backed
//! `SalesforceClient` from `sf-toolkit-client`) and provides typed methods
//! for queries, describe and the sObject Collections list operations.

use std::sync::Arc;

use sf_toolkit_client::{ClientConfig, Connection, SalesforceClient};
use sf_toolkit_records::SchemaRegistry;

use crate::error::Result;

mod collections;
mod describe;
mod query;

/// Salesforce REST API client.
///
/// Provides typed methods for:
/// - SOQL queries, eager or as lazy streams
/// - Describe, registering the resulting schema
/// - Concurrent sObject Collections saves, deletes and fetches
///
/// # Example
///
/// ```rust,ignore
/// use sf_toolkit_rest::{QueryBuilder, SalesforceRestClient, SaveOptions};
///
/// let client = SalesforceRestClient::new(
///     "https://myorg.my.salesforce.com",
///     "access_token_here",
/// )?;
///
/// let account = client.describe("Account").await?;
/// let query = QueryBuilder::for_schema(account)?.where_eq("Industry", "Technology")?;
/// let mut accounts = client.fetch_all(&query).await?;
///
/// for account in &mut accounts {
///     account.set("Rating", "Hot")?;
/// }
/// let outcomes = client
///     .save_update(&mut accounts, &SaveOptions::default().with_only_changes(true))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct SalesforceRestClient<C = SalesforceClient> {
    connection: C,
    schemas: Option<Arc<SchemaRegistry>>,
}

impl SalesforceRestClient<SalesforceClient> {
    /// Create a new REST client with the given instance URL and access token.
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let client = SalesforceClient::new(instance_url, access_token)?;
        Ok(Self::from_connection(client))
    }

    /// Create a new REST client with custom HTTP configuration.
    pub fn with_config(
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let client = SalesforceClient::with_config(instance_url, access_token, config)?;
        Ok(Self::from_connection(client))
    }

    /// Use a connection registered with [`SalesforceClient::register`];
    /// `None` selects the default name.
    pub fn named(name: Option<&str>) -> Result<Self> {
        let client = SalesforceClient::named(name)?;
        Ok(Self::from_connection(client))
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.connection = self.connection.with_api_version(version);
        self
    }
}

impl<C: Connection> SalesforceRestClient<C> {
    /// Wrap an existing connection.
    pub fn from_connection(connection: C) -> Self {
        Self {
            connection,
            schemas: None,
        }
    }

    /// Resolve and register schemas in `registry` instead of the global one.
    pub fn with_schemas(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.schemas = Some(registry);
        self
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        match &self.schemas {
            Some(registry) => registry,
            None => SchemaRegistry::global(),
        }
    }

    pub fn instance_url(&self) -> &str {
        self.connection.instance_url()
    }

    pub fn api_version(&self) -> &str {
        self.connection.api_version()
    }
}
