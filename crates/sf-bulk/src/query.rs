//! Bulk API 2.0 query jobs.

use futures::stream::{self, Stream, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use sf_toolkit_client::{security, Connection, RequestBuilder, SalesforceClient};
use sf_toolkit_records::{decode_csv, CsvDialect, Record, SObjectSchema, SchemaRegistry};
use sf_toolkit_rest::QueryBuilder;

use crate::error::{Error, ErrorKind, Result};
use crate::monitor::{wait_until_terminal, PollConfig, PollTarget};
use crate::types::{
    dialect, BulkOperation, CreateQueryJobRequest, JobState, QueryJobInfo, QueryJobOptions,
    UpdateJobStateRequest,
};

/// Handle to a Bulk API 2.0 query job.
///
/// Query jobs start in `UploadComplete` and run on their own; the handle
/// only observes, waits for, or aborts them.
#[derive(Debug, Clone)]
pub struct BulkQueryJob<C> {
    connection: C,
    info: QueryJobInfo,
    sobject: String,
    schema: Option<Arc<SObjectSchema>>,
    max_records: Option<u64>,
    poll: PollConfig,
}

impl<C: Connection> BulkQueryJob<C> {
    /// Render `query` for bulk use and create the remote job.
    ///
    /// Clauses bulk queries do not support are rejected before any request.
    /// Result rows decode with the builder's schema, else the registered
    /// schema for its sObject, else an all-text schema from the CSV header.
    #[instrument(skip(connection, query, options), fields(sobject = query.sobject()))]
    pub async fn init_job(
        connection: C,
        query: &QueryBuilder,
        options: QueryJobOptions,
    ) -> Result<Self> {
        let soql = query.build_for_bulk()?;
        let operation = if options.query_all {
            BulkOperation::QueryAll
        } else {
            BulkOperation::Query
        };
        let request = CreateQueryJobRequest {
            query: soql,
            operation,
            column_delimiter: options.column_delimiter,
            line_ending: options.line_ending,
        };

        let url = connection.bulk_url("query");
        let info: QueryJobInfo = connection
            .send(RequestBuilder::post(url).json(&request)?)
            .await?
            .json()?;
        info!(job_id = %info.id, state = ?info.state, "Created query job");

        let schema = query
            .schema()
            .cloned()
            .or_else(|| SchemaRegistry::global().find(query.sobject()));
        Ok(Self {
            connection,
            info,
            sobject: query.sobject().to_string(),
            schema,
            max_records: options.max_records,
            poll: PollConfig::default(),
        })
    }

    /// Re-attach to an existing query job. Rows decode untyped unless a
    /// schema is supplied with [`with_schema`](Self::with_schema).
    #[instrument(skip(connection))]
    pub async fn resume(connection: C, job_id: &str) -> Result<Self> {
        let info = fetch_info(&connection, job_id).await?;
        let sobject = info.object.clone().unwrap_or_default();
        let schema = SchemaRegistry::global().find(&sobject);
        Ok(Self {
            connection,
            info,
            sobject,
            schema,
            max_records: None,
            poll: PollConfig::default(),
        })
    }

    pub fn with_schema(mut self, schema: Arc<SObjectSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn state(&self) -> JobState {
        self.info.state
    }

    pub fn info(&self) -> &QueryJobInfo {
        &self.info
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    fn job_url(&self) -> String {
        self.connection.bulk_url(&format!("query/{}", self.info.id))
    }

    fn observe(&mut self, info: QueryJobInfo) {
        let previous = self.info.state;
        if previous.accepts(info.state) {
            if previous != info.state {
                info!(job_id = %self.info.id, from = ?previous, to = ?info.state, "Query job state changed");
            }
            self.info = info;
        } else if previous != info.state {
            warn!(job_id = %self.info.id, current = ?previous, observed = ?info.state, "Ignoring out-of-order job state");
        }
    }

    /// Re-read the job from the server. A terminal job is not re-read.
    #[instrument(skip(self), fields(job_id = %self.info.id))]
    pub async fn refresh(&mut self) -> Result<JobState> {
        if self.info.state.is_terminal() {
            return Ok(self.info.state);
        }
        let info = fetch_info(&self.connection, &self.info.id).await?;
        self.observe(info);
        Ok(self.info.state)
    }

    /// Poll with growing delays until the job is terminal. On timeout the
    /// remote job keeps running.
    pub async fn monitor_until_complete(&mut self, timeout: Duration) -> Result<JobState> {
        let poll = self.poll.clone();
        wait_until_terminal(self, timeout, &poll).await
    }

    /// Abort the remote job.
    #[instrument(skip(self), fields(job_id = %self.info.id))]
    pub async fn abort(&mut self) -> Result<JobState> {
        if self.info.state.is_terminal() {
            return Err(Error::new(ErrorKind::Job(format!(
                "job {} is already {:?}",
                self.info.id, self.info.state
            ))));
        }
        let request = RequestBuilder::patch(self.job_url()).json(&UpdateJobStateRequest::abort())?;
        let info: QueryJobInfo = self.connection.send(request).await?.json()?;
        self.observe(info);
        Ok(self.info.state)
    }

    /// Consume the handle and open its result set.
    ///
    /// The job must be `JobComplete`.
    pub fn into_results(self) -> Result<BulkQueryResult<C>> {
        if self.info.state != JobState::JobComplete {
            return Err(Error::validation(format!(
                "results are only available for completed jobs; job {} is {:?}",
                self.info.id, self.info.state
            )));
        }
        let dialect = dialect(
            self.info.column_delimiter.unwrap_or_default(),
            self.info.line_ending.unwrap_or_default(),
        );
        Ok(BulkQueryResult {
            connection: self.connection,
            job_id: self.info.id,
            sobject: self.sobject,
            schema: self.schema,
            dialect,
            max_records: self.max_records,
        })
    }
}

impl BulkQueryJob<SalesforceClient> {
    /// [`init_job`](Self::init_job) on a connection registered by name,
    /// `None` meaning the default connection.
    pub async fn init_job_named(
        name: Option<&str>,
        query: &QueryBuilder,
        options: QueryJobOptions,
    ) -> Result<Self> {
        Self::init_job(SalesforceClient::named(name)?, query, options).await
    }

    /// [`resume`](Self::resume) on a connection registered by name.
    pub async fn resume_named(name: Option<&str>, job_id: &str) -> Result<Self> {
        Self::resume(SalesforceClient::named(name)?, job_id).await
    }
}

impl<C: Connection> PollTarget for BulkQueryJob<C> {
    fn job_id(&self) -> &str {
        &self.info.id
    }

    async fn refresh_state(&mut self) -> Result<JobState> {
        self.refresh().await
    }
}

async fn fetch_info<C: Connection>(connection: &C, job_id: &str) -> Result<QueryJobInfo> {
    let url = connection.bulk_url(&format!("query/{}", security::url::encode_param(job_id)));
    Ok(connection.get_json(&url).await?)
}

/// One page of query job results.
#[derive(Debug, Clone)]
pub struct ResultPage {
    pub records: Vec<Record>,
    /// Locator of the following page; `None` on the last page.
    pub next_locator: Option<String>,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// The result set of a completed query job.
///
/// Pages are fetched lazily as the streams are polled; dropping a stream
/// stops fetching. Each accessor consumes the result set, so a result set
/// is read once and can not be restarted.
#[derive(Debug)]
pub struct BulkQueryResult<C> {
    connection: C,
    job_id: String,
    sobject: String,
    schema: Option<Arc<SObjectSchema>>,
    dialect: CsvDialect,
    max_records: Option<u64>,
}

impl<C: Connection> BulkQueryResult<C> {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stream result pages, following the `Sforce-Locator` header.
    pub fn pages(self) -> impl Stream<Item = Result<ResultPage>> {
        stream::try_unfold((self, Cursor::Start), |(this, cursor)| this.advance(cursor))
    }

    async fn advance(self, cursor: Cursor) -> Result<Option<(ResultPage, (Self, Cursor))>> {
        let next = self.next_page(cursor).await?;
        Ok(next.map(|(page, cursor)| (page, (self, cursor))))
    }

    async fn next_page(&self, cursor: Cursor) -> Result<Option<(ResultPage, Cursor)>> {
        let locator = match cursor {
            Cursor::Start => None,
            Cursor::Next(locator) => Some(locator),
            Cursor::Done => return Ok(None),
        };
        let page = self.fetch_page(locator.as_deref()).await?;
        let next = match &page.next_locator {
            Some(locator) => Cursor::Next(locator.clone()),
            None => Cursor::Done,
        };
        Ok(Some((page, next)))
    }

    /// Stream decoded records across all pages.
    pub fn records(self) -> impl Stream<Item = Result<Record>> {
        self.pages()
            .map_ok(|page| stream::iter(page.records.into_iter().map(Ok::<_, Error>)))
            .try_flatten()
    }

    /// Fetch every page and collect the records.
    pub async fn as_list(self) -> Result<Vec<Record>> {
        self.records().try_collect().await
    }

    #[instrument(skip(self), fields(job_id = %self.job_id))]
    async fn fetch_page(&self, locator: Option<&str>) -> Result<ResultPage> {
        let url = self
            .connection
            .bulk_url(&format!("query/{}/results", self.job_id));
        let mut request = RequestBuilder::get(url).accept("text/csv");
        if let Some(locator) = locator {
            request = request.query("locator", locator);
        }
        if let Some(max_records) = self.max_records {
            request = request.query("maxRecords", max_records.to_string());
        }

        let response = self.connection.send(request).await?;
        let next_locator = response.sforce_locator().map(str::to_string);
        let body = response.text()?;
        let records = if body.trim().is_empty() {
            Vec::new()
        } else {
            decode_csv(self.schema.as_ref(), &self.sobject, &body, self.dialect)?
        };
        debug!(rows = records.len(), more = next_locator.is_some(), "Fetched result page");
        Ok(ResultPage {
            records,
            next_locator,
        })
    }
}
