use futures::stream::{Stream, TryStreamExt};
use std::sync::Arc;
use tracing::instrument;

use sf_toolkit_client::Connection;
use sf_toolkit_records::{Record, SObjectSchema};

use crate::error::Result;
use crate::query::{query_records, query_rows, QueryResult};
use crate::query_builder::QueryBuilder;

impl<C: Connection> super::SalesforceRestClient<C> {
    /// Execute a SOQL query.
    ///
    /// Returns the first page of results. Use `query_all` for automatic pagination.
    ///
    /// # Security
    ///
    /// **IMPORTANT**: If you are including user-provided values in the WHERE clause,
    /// you MUST escape them. Prefer [`QueryBuilder`], or use the security utilities:
    ///
    /// ```rust,ignore
    /// use sf_toolkit_client::security::soql;
    ///
    /// // WRONG - vulnerable to injection:
    /// let query = format!("SELECT Id FROM Account WHERE Name = '{}'", user_input);
    ///
    /// // CORRECT - properly escaped:
    /// let safe_value = soql::escape_string(user_input);
    /// let query = format!("SELECT Id FROM Account WHERE Name = '{}'", safe_value);
    /// ```
    #[instrument(skip(self))]
    pub async fn query(&self, soql: &str) -> Result<QueryResult<serde_json::Value>> {
        self.connection.query(soql, false).await.map_err(Into::into)
    }

    /// Fetch the next page of query results.
    #[instrument(skip(self))]
    pub async fn query_more(
        &self,
        next_records_url: &str,
    ) -> Result<QueryResult<serde_json::Value>> {
        self.connection
            .query_more(next_records_url)
            .await
            .map_err(Into::into)
    }

    /// Execute a SOQL query and return all rows (automatic pagination).
    #[instrument(skip(self))]
    pub async fn query_all(&self, soql: &str) -> Result<Vec<serde_json::Value>> {
        self.stream_rows(soql).try_collect().await
    }

    /// Execute a SOQL query including deleted and archived records.
    #[instrument(skip(self))]
    pub async fn query_all_including_deleted(
        &self,
        soql: &str,
    ) -> Result<QueryResult<serde_json::Value>> {
        let url = self.connection.rest_url("queryAll");
        let request = sf_toolkit_client::RequestBuilder::get(url).query("q", soql);
        Ok(self.connection.send(request).await?.json()?)
    }

    /// Lazily stream raw rows, fetching pages as they are consumed.
    pub fn stream_rows(&self, soql: &str) -> impl Stream<Item = Result<serde_json::Value>> + '_ {
        query_rows(&self.connection, soql.to_string(), false)
    }

    /// Lazily stream the records a builder selects.
    ///
    /// The query is rendered and its schema resolved before this returns,
    /// so validation errors surface without any request being sent.
    pub fn fetch(&self, query: &QueryBuilder) -> Result<impl Stream<Item = Result<Record>> + '_> {
        let schema = self.schema_for(query)?;
        let soql = query.build()?;
        Ok(query_records(&self.connection, soql, query.is_tooling(), schema))
    }

    /// Eagerly collect every record a builder selects.
    #[instrument(skip(self, query), fields(sobject = query.sobject()))]
    pub async fn fetch_all(&self, query: &QueryBuilder) -> Result<Vec<Record>> {
        self.fetch(query)?.try_collect().await
    }

    /// Run `SELECT COUNT()` for the builder's filter and return the total.
    #[instrument(skip(self, query), fields(sobject = query.sobject()))]
    pub async fn count(&self, query: &QueryBuilder) -> Result<u64> {
        let soql = query.build_count()?;
        let page = self.connection.query(&soql, query.is_tooling()).await?;
        Ok(page.total_size)
    }

    /// The builder's own schema, else the registered one for its sObject.
    pub fn schema_for(&self, query: &QueryBuilder) -> Result<Arc<SObjectSchema>> {
        match query.schema() {
            Some(schema) => Ok(Arc::clone(schema)),
            None => Ok(self.schemas().get(query.sobject())?),
        }
    }
}
