//! Bulk API 2.0 ingest jobs.
//!
//! ```text
//! init_job() -> Open --upload_batches()--> UploadComplete --refresh()--> InProgress
//!            -> JobComplete | Failed        (abort() from any non-terminal state)
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use sf_toolkit_client::{security, Connection, RequestBuilder, SalesforceClient};
use sf_toolkit_records::{is_single_type, read_rows, upload_columns, CsvDialect, CsvEncoder, Record};

use crate::error::{Error, ErrorKind, Result};
use crate::monitor::{wait_until_terminal, PollConfig, PollTarget};
use crate::types::{
    dialect, BulkOperation, CreateIngestJobRequest, IngestJobInfo, IngestJobResult,
    IngestOutcome, IngestResultRow, IngestUploadOptions, JobState, UpdateJobStateRequest,
};

/// The result files of an ingest job.
#[derive(Debug, Clone, Copy)]
enum ResultFile {
    Successful,
    Failed,
    Unprocessed,
}

impl ResultFile {
    fn path(&self) -> &'static str {
        match self {
            ResultFile::Successful => "successfulResults",
            ResultFile::Failed => "failedResults",
            ResultFile::Unprocessed => "unprocessedrecords",
        }
    }
}

/// Cells of each uploaded row, for matching result rows back to input
/// positions.
#[derive(Debug, Clone, Default)]
struct UploadLedger {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl UploadLedger {
    /// Positions keyed by row content; identical rows queue in input order.
    fn index(&self) -> HashMap<&[String], VecDeque<usize>> {
        let mut index: HashMap<&[String], VecDeque<usize>> = HashMap::new();
        for (position, row) in self.rows.iter().enumerate() {
            index.entry(row.as_slice()).or_default().push_back(position);
        }
        index
    }
}

/// Handle to a Bulk API 2.0 ingest job.
///
/// The remote job is the source of truth; the handle keeps the last observed
/// [`IngestJobInfo`] and refreshes it on demand. Dropping the handle never
/// aborts the remote job.
///
/// # Example
///
/// ```rust,ignore
/// use sf_toolkit_bulk::{BulkIngestJob, BulkOperation, CreateIngestJobRequest};
///
/// let request = CreateIngestJobRequest::new("Contact", BulkOperation::Insert);
/// let mut job = BulkIngestJob::init_job(client.clone(), request).await?;
/// job.upload_batches(&contacts).await?;
/// job.monitor_until_complete(Duration::from_secs(600)).await?;
///
/// for (position, outcome) in job.outcomes().await?.iter().enumerate() {
///     println!("{position}: {outcome:?}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BulkIngestJob<C> {
    connection: C,
    info: IngestJobInfo,
    poll: PollConfig,
    uploaded: UploadLedger,
}

impl<C: Connection> BulkIngestJob<C> {
    /// Create the remote job. The returned handle is `Open`.
    #[instrument(skip(connection, request), fields(sobject = %request.object, operation = request.operation.api_name()))]
    pub async fn init_job(connection: C, request: CreateIngestJobRequest) -> Result<Self> {
        if !request.operation.is_ingest() {
            return Err(Error::validation(format!(
                "{} is not an ingest operation",
                request.operation.api_name()
            )));
        }
        match (&request.operation, &request.external_id_field_name) {
            (BulkOperation::Upsert, None) => {
                return Err(Error::validation("upsert jobs need an external id field"));
            }
            (BulkOperation::Upsert, Some(_)) | (_, None) => {}
            (operation, Some(_)) => {
                return Err(Error::validation(format!(
                    "an external id field only applies to upsert, not {}",
                    operation.api_name()
                )));
            }
        }

        let url = connection.bulk_url("ingest");
        let response = connection
            .send(RequestBuilder::post(url).json(&request)?)
            .await?;
        let info: IngestJobInfo = response.json()?;
        info!(job_id = %info.id, state = ?info.state, "Created ingest job");
        Ok(Self::from_info(connection, info))
    }

    /// Re-attach to an existing job, e.g. after a monitoring timeout.
    ///
    /// A resumed handle has no record of uploaded rows, so result rows carry
    /// no input position and [`outcomes`](Self::outcomes) is unavailable.
    #[instrument(skip(connection))]
    pub async fn resume(connection: C, job_id: &str) -> Result<Self> {
        let info = fetch_info(&connection, job_id).await?;
        debug!(state = ?info.state, "Resumed ingest job");
        Ok(Self::from_info(connection, info))
    }

    fn from_info(connection: C, info: IngestJobInfo) -> Self {
        Self {
            connection,
            info,
            poll: PollConfig::default(),
            uploaded: UploadLedger::default(),
        }
    }

    /// Use a different polling schedule for [`monitor_until_complete`](Self::monitor_until_complete).
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

    /// The job as last observed.
    pub fn info(&self) -> &IngestJobInfo {
        &self.info
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    fn dialect(&self) -> CsvDialect {
        dialect(
            self.info.column_delimiter.unwrap_or_default(),
            self.info.line_ending.unwrap_or_default(),
        )
    }

    fn job_url(&self, suffix: &str) -> String {
        let path = if suffix.is_empty() {
            format!("ingest/{}", self.info.id)
        } else {
            format!("ingest/{}/{suffix}", self.info.id)
        };
        self.connection.bulk_url(&path)
    }

    /// Record a newly observed job state, keeping terminal states final.
    fn observe(&mut self, info: IngestJobInfo) {
        let previous = self.info.state;
        if previous.accepts(info.state) {
            if previous != info.state {
                info!(job_id = %self.info.id, from = ?previous, to = ?info.state, "Ingest job state changed");
            }
            self.info = info;
        } else if previous != info.state {
            warn!(job_id = %self.info.id, current = ?previous, observed = ?info.state, "Ignoring out-of-order job state");
        }
    }

    /// Upload `records` with the default 100 MB body ceiling.
    pub async fn upload_batches(&mut self, records: &[Record]) -> Result<()> {
        self.upload_batches_with(records, &IngestUploadOptions::default())
            .await
    }

    /// Upload `records` and mark the upload complete.
    ///
    /// The rows are split across as many upload requests as needed to keep
    /// each body under `options.max_bytes`; every part repeats the header.
    /// Delete jobs upload only the `Id` column. Every row is encoded before
    /// the first request is sent.
    #[instrument(skip(self, records, options), fields(job_id = %self.info.id, records = records.len()))]
    pub async fn upload_batches_with(
        &mut self,
        records: &[Record],
        options: &IngestUploadOptions,
    ) -> Result<()> {
        if self.info.state != JobState::Open {
            return Err(Error::validation(format!(
                "cannot upload to a job in state {:?}",
                self.info.state
            )));
        }
        let Some(first) = records.first() else {
            return Err(Error::validation("cannot upload an empty record list"));
        };
        if !is_single_type(records) {
            return Err(Error::validation("all records in a job must share one sObject type"));
        }
        if first.sobject() != self.info.object {
            return Err(Error::validation(format!(
                "job loads {} but the records are {}",
                self.info.object,
                first.sobject()
            )));
        }

        let columns = if self.info.operation.is_delete() {
            if let Some(index) = records.iter().position(|r| r.id().is_none()) {
                return Err(Error::validation(format!(
                    "record at index {index} has no Id to delete"
                )));
            }
            vec![first.schema().id_field().to_string()]
        } else {
            upload_columns(records)
        };
        if columns.is_empty() {
            return Err(Error::validation("records have no fields set"));
        }

        let encoder = CsvEncoder::new(columns, self.dialect());
        let parts = split_upload(&encoder, records, options.max_bytes)?;

        let url = self.job_url("batches");
        for (index, part) in parts.into_iter().enumerate() {
            debug!(part = index, bytes = part.len(), "Uploading job data");
            self.connection
                .send(
                    RequestBuilder::put(&url)
                        .csv(part)
                        .accept("application/json"),
                )
                .await?;
        }
        self.uploaded.rows.extend(records.iter().map(|r| encoder.cells(r)));
        self.uploaded.columns = encoder.columns().to_vec();

        let request = RequestBuilder::patch(self.job_url("")).json(&UpdateJobStateRequest::upload_complete())?;
        let info: IngestJobInfo = self.connection.send(request).await?.json()?;
        self.observe(info);
        Ok(())
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

    /// Poll with growing delays until the job is terminal.
    ///
    /// On timeout the remote job is left running; [`resume`](Self::resume)
    /// or this handle can pick it up again later.
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
        let request = RequestBuilder::patch(self.job_url("")).json(&UpdateJobStateRequest::abort())?;
        let info: IngestJobInfo = self.connection.send(request).await?.json()?;
        self.observe(info);
        Ok(self.info.state)
    }

    /// Rows the server saved.
    pub async fn successful_results(&self) -> Result<Vec<IngestResultRow>> {
        let index = &mut self.uploaded.index();
        self.result_rows(ResultFile::Successful, index).await
    }

    /// Rows the server rejected, each with its `sf__Error`.
    pub async fn failed_results(&self) -> Result<Vec<IngestResultRow>> {
        let index = &mut self.uploaded.index();
        self.result_rows(ResultFile::Failed, index).await
    }

    /// Rows the server never got to.
    pub async fn unprocessed_records(&self) -> Result<Vec<IngestResultRow>> {
        let index = &mut self.uploaded.index();
        self.result_rows(ResultFile::Unprocessed, index).await
    }

    /// One outcome per uploaded record, in input order.
    ///
    /// Records that appear in no result file are reported as unprocessed.
    #[instrument(skip(self), fields(job_id = %self.info.id))]
    pub async fn outcomes(&self) -> Result<Vec<IngestOutcome>> {
        if self.uploaded.rows.is_empty() {
            return Err(Error::validation(
                "outcomes are only known for records uploaded through this handle",
            ));
        }
        let mut index = self.uploaded.index();
        let mut outcomes = vec![IngestOutcome::Unprocessed; self.uploaded.rows.len()];

        for row in self.result_rows(ResultFile::Successful, &mut index).await? {
            if let Some(position) = row.position {
                outcomes[position] = IngestOutcome::Success {
                    id: row.id,
                    created: row.created,
                };
            }
        }
        for row in self.result_rows(ResultFile::Failed, &mut index).await? {
            if let Some(position) = row.position {
                outcomes[position] = IngestOutcome::Failure {
                    error: row.error.unwrap_or_default(),
                };
            }
        }
        Ok(outcomes)
    }

    async fn result_rows(
        &self,
        file: ResultFile,
        index: &mut HashMap<&[String], VecDeque<usize>>,
    ) -> Result<Vec<IngestResultRow>> {
        if !self.info.state.is_terminal() {
            return Err(Error::validation(format!(
                "results are available once the job finishes; it is {:?}",
                self.info.state
            )));
        }
        let request = RequestBuilder::get(self.job_url(file.path())).accept("text/csv");
        let body = self.connection.send(request).await?.text()?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows = read_rows(&body, self.dialect())?;
        debug!(file = file.path(), rows = rows.len(), "Read job results");
        Ok(rows
            .into_iter()
            .map(|row| self.result_row(row, index))
            .collect())
    }

    fn result_row(
        &self,
        mut row: BTreeMap<String, String>,
        index: &mut HashMap<&[String], VecDeque<usize>>,
    ) -> IngestResultRow {
        let id = row.remove("sf__Id").filter(|id| !id.is_empty());
        let created = row
            .remove("sf__Created")
            .is_some_and(|created| created.eq_ignore_ascii_case("true"));
        let error = row.remove("sf__Error").filter(|error| !error.is_empty());

        let key: Vec<String> = self
            .uploaded
            .columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or_default())
            .collect();
        let position = index
            .get_mut(key.as_slice())
            .and_then(VecDeque::pop_front);

        IngestResultRow {
            position,
            id,
            created,
            error,
            values: row,
        }
    }
}

impl BulkIngestJob<SalesforceClient> {
    /// [`init_job`](Self::init_job) on a connection registered by name,
    /// `None` meaning the default connection.
    pub async fn init_job_named(name: Option<&str>, request: CreateIngestJobRequest) -> Result<Self> {
        Self::init_job(SalesforceClient::named(name)?, request).await
    }

    /// [`resume`](Self::resume) on a connection registered by name.
    pub async fn resume_named(name: Option<&str>, job_id: &str) -> Result<Self> {
        Self::resume(SalesforceClient::named(name)?, job_id).await
    }
}

impl<C: Connection> PollTarget for BulkIngestJob<C> {
    fn job_id(&self) -> &str {
        &self.info.id
    }

    async fn refresh_state(&mut self) -> Result<JobState> {
        self.refresh().await
    }
}

async fn fetch_info<C: Connection>(connection: &C, job_id: &str) -> Result<IngestJobInfo> {
    let url = connection.bulk_url(&format!("ingest/{}", security::url::encode_param(job_id)));
    Ok(connection.get_json(&url).await?)
}

/// Encode `records` into upload bodies of at most `max_bytes` each.
fn split_upload(encoder: &CsvEncoder, records: &[Record], max_bytes: usize) -> Result<Vec<String>> {
    let header = encoder.header()?;
    let mut parts = Vec::new();
    let mut current = header.clone();

    for (index, record) in records.iter().enumerate() {
        let line = encoder.row(record)?;
        if header.len() + line.len() > max_bytes {
            return Err(Error::validation(format!(
                "record at index {index} encodes to {} bytes, over the {max_bytes} byte upload limit",
                line.len()
            )));
        }
        if current.len() + line.len() > max_bytes {
            parts.push(std::mem::replace(&mut current, header.clone()));
        }
        current.push_str(&line);
    }
    parts.push(current);
    Ok(parts)
}

/// Create a job, upload `records`, wait for it to finish and collect the
/// per-record outcomes.
pub async fn execute_ingest<C: Connection>(
    connection: C,
    request: CreateIngestJobRequest,
    records: &[Record],
    timeout: Duration,
) -> Result<IngestJobResult> {
    let mut job = BulkIngestJob::init_job(connection, request).await?;
    job.upload_batches(records).await?;
    job.monitor_until_complete(timeout).await?;
    let outcomes = job.outcomes().await?;
    Ok(IngestJobResult {
        job: job.info,
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job_body, MockConnection};
    use crate::ColumnDelimiter;
    use serde_json::json;
    use sf_toolkit_client::{RequestMethod, Response};
    use sf_toolkit_records::{FieldSchema, FieldType, SObjectSchema};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JOB_ID: &str = "750000000000001AAA";

    fn contact_schema() -> Arc<SObjectSchema> {
        Arc::new(
            SObjectSchema::new(
                "Contact",
                vec![
                    FieldSchema::new("Id", FieldType::Id).readonly(),
                    FieldSchema::new("LastName", FieldType::Text),
                    FieldSchema::new("Email", FieldType::Text),
                ],
            )
            .unwrap(),
        )
    }

    fn contacts(count: usize) -> Vec<Record> {
        let schema = contact_schema();
        (0..count)
            .map(|i| {
                Record::new(Arc::clone(&schema))
                    .with("LastName", format!("Contact {i}"))
                    .unwrap()
            })
            .collect()
    }

    /// Serves an ingest job that moves Open -> UploadComplete -> the given
    /// sequence of states on each status read, plus fixed result files.
    fn ingest_server(
        operation: &'static str,
        states: Vec<&'static str>,
        successful: String,
        failed: String,
    ) -> MockConnection {
        let reads = AtomicUsize::new(0);
        MockConnection::new(move |request| {
            let url = request.url();
            match request.method() {
                RequestMethod::Post => Ok(Response::json_body(200, &job_body(JOB_ID, operation, "Open"))),
                RequestMethod::Put => Ok(Response::new(201, [("Content-Type", "text/plain")], "")),
                RequestMethod::Patch => {
                    let state = request.json_body().unwrap()["state"].as_str().unwrap().to_string();
                    Ok(Response::json_body(200, &job_body(JOB_ID, operation, &state)))
                }
                RequestMethod::Get if url.ends_with("/successfulResults") => {
                    Ok(Response::new(200, [("Content-Type", "text/csv")], successful.clone()))
                }
                RequestMethod::Get if url.ends_with("/failedResults") => {
                    Ok(Response::new(200, [("Content-Type", "text/csv")], failed.clone()))
                }
                RequestMethod::Get if url.ends_with("/unprocessedrecords") => {
                    Ok(Response::new(200, [("Content-Type", "text/csv")], "LastName\n"))
                }
                RequestMethod::Get => {
                    let read = reads.fetch_add(1, Ordering::SeqCst);
                    let state = states[read.min(states.len() - 1)];
                    Ok(Response::json_body(200, &job_body(JOB_ID, operation, state)))
                }
                other => panic!("unexpected {other:?} {url}"),
            }
        })
    }

    #[tokio::test]
    async fn test_failed_rows_map_to_input_positions() {
        let failed_positions = [2, 5, 7];
        let mut successful = String::from("sf__Id,sf__Created,LastName\n");
        let mut failed = String::from("sf__Id,sf__Error,LastName\n");
        for i in 0..10 {
            if failed_positions.contains(&i) {
                failed.push_str(&format!(",REQUIRED_FIELD_MISSING:Email:--,Contact {i}\n"));
            }
        }
        // Result files are not in upload order.
        for i in (0..10).rev() {
            if !failed_positions.contains(&i) {
                successful.push_str(&format!("003{i:012}AAA,true,Contact {i}\n"));
            }
        }

        let connection = ingest_server("insert", vec!["InProgress", "JobComplete"], successful, failed);
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Insert);
        let records = contacts(10);

        let mut job = BulkIngestJob::init_job(connection, request).await.unwrap();
        job.upload_batches(&records).await.unwrap();
        assert_eq!(job.state(), JobState::UploadComplete);
        job.refresh().await.unwrap();
        assert_eq!(job.refresh().await.unwrap(), JobState::JobComplete);

        let failures = job.failed_results().await.unwrap();
        let positions: Vec<_> = failures.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![Some(2), Some(5), Some(7)]);
        assert_eq!(failures[0].error.as_deref(), Some("REQUIRED_FIELD_MISSING:Email:--"));
        assert_eq!(failures[0].values["LastName"], "Contact 2");

        let outcomes = job.outcomes().await.unwrap();
        assert_eq!(outcomes.len(), 10);
        for (position, outcome) in outcomes.iter().enumerate() {
            if failed_positions.contains(&position) {
                assert!(matches!(outcome, IngestOutcome::Failure { .. }));
            } else {
                assert_eq!(
                    outcome,
                    &IngestOutcome::Success {
                        id: Some(format!("003{position:012}AAA")),
                        created: true
                    }
                );
            }
        }
        assert!(job.unprocessed_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_state_is_sticky() {
        let connection = ingest_server(
            "insert",
            vec!["InProgress", "UploadComplete", "JobComplete", "Failed"],
            String::new(),
            String::new(),
        );
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Insert);
        let mut job = BulkIngestJob::init_job(connection, request).await.unwrap();
        job.upload_batches(&contacts(1)).await.unwrap();

        assert_eq!(job.refresh().await.unwrap(), JobState::InProgress);
        // The server briefly reports an older state; the handle keeps its own.
        assert_eq!(job.refresh().await.unwrap(), JobState::InProgress);
        assert_eq!(job.refresh().await.unwrap(), JobState::JobComplete);

        let calls = job.connection().calls();
        assert_eq!(job.refresh().await.unwrap(), JobState::JobComplete);
        assert_eq!(job.connection().calls(), calls);

        let err = job.abort().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Job(_)));
        assert_eq!(job.connection().calls(), calls);
    }

    #[tokio::test]
    async fn test_upload_splits_at_byte_ceiling() {
        let connection = ingest_server("insert", vec!["JobComplete"], String::new(), String::new());
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Insert);
        let mut job = BulkIngestJob::init_job(connection, request).await.unwrap();

        // "LastName\n" is 9 bytes and "Contact N\n" is 10 bytes.
        let options = IngestUploadOptions::default().with_max_bytes(30);
        job.upload_batches_with(&contacts(5), &options).await.unwrap();

        let puts: Vec<String> = job
            .connection()
            .requests()
            .iter()
            .filter(|r| r.method() == RequestMethod::Put)
            .map(|r| r.text_body().unwrap().to_string())
            .collect();
        assert_eq!(
            puts,
            vec![
                "LastName\nContact 0\nContact 1\n",
                "LastName\nContact 2\nContact 3\n",
                "LastName\nContact 4\n",
            ]
        );
        assert!(puts.iter().all(|p| p.len() <= 30));
        assert_eq!(job.state(), JobState::UploadComplete);
    }

    #[tokio::test]
    async fn test_oversized_row_is_rejected_before_upload() {
        let connection = ingest_server("insert", vec!["JobComplete"], String::new(), String::new());
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Insert);
        let mut job = BulkIngestJob::init_job(connection, request).await.unwrap();
        let calls = job.connection().calls();

        let options = IngestUploadOptions::default().with_max_bytes(12);
        let err = job.upload_batches_with(&contacts(2), &options).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Validation(_)));
        assert_eq!(job.connection().calls(), calls);
        assert_eq!(job.state(), JobState::Open);
    }

    #[tokio::test]
    async fn test_upload_validation_sends_nothing() {
        let connection = ingest_server("insert", vec!["JobComplete"], String::new(), String::new());
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Insert);
        let mut job = BulkIngestJob::init_job(connection, request).await.unwrap();
        let calls = job.connection().calls();

        assert!(job.upload_batches(&[]).await.is_err());

        let account = Arc::new(
            SObjectSchema::new("Account", vec![FieldSchema::new("Name", FieldType::Text)]).unwrap(),
        );
        let mut mixed = contacts(1);
        mixed.push(Record::new(account).with("Name", "Acme").unwrap());
        assert!(job.upload_batches(&mixed).await.is_err());
        assert_eq!(job.connection().calls(), calls);
    }

    #[tokio::test]
    async fn test_delete_uploads_only_ids() {
        let connection = ingest_server("delete", vec!["JobComplete"], String::new(), String::new());
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Delete);
        let mut job = BulkIngestJob::init_job(connection, request).await.unwrap();

        let mut records = contacts(2);
        for (i, record) in records.iter_mut().enumerate() {
            record.assign_id(format!("003{i:012}AAA"));
        }
        job.upload_batches(&records).await.unwrap();

        let requests = job.connection().requests();
        let put = requests.iter().find(|r| r.method() == RequestMethod::Put).unwrap();
        assert_eq!(
            put.text_body(),
            Some("Id\n003000000000000AAA\n003000000000001AAA\n")
        );
    }

    #[tokio::test]
    async fn test_upsert_requires_external_id_field() {
        let connection = MockConnection::new(|_| panic!("no request expected"));
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Upsert);
        let err = BulkIngestJob::init_job(connection, request).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_timeout_leaves_job_running() {
        let connection = ingest_server("insert", vec!["InProgress"], String::new(), String::new());
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Insert);
        let mut job = BulkIngestJob::init_job(connection, request).await.unwrap();
        job.upload_batches(&contacts(1)).await.unwrap();

        let err = job
            .monitor_until_complete(Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(job.state(), JobState::InProgress);

        let aborts = job
            .connection()
            .requests()
            .iter()
            .filter(|r| r.json_body().is_some_and(|b| b["state"] == "Aborted"))
            .count();
        assert_eq!(aborts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_ingest() {
        let successful = "sf__Id,sf__Created,LastName\n003000000000000AAA,true,Contact 0\n".to_string();
        let failed = "sf__Id,sf__Error,LastName\n".to_string();
        let connection = ingest_server("insert", vec!["InProgress", "JobComplete"], successful, failed);

        let result = execute_ingest(
            connection,
            CreateIngestJobRequest::new("Contact", BulkOperation::Insert),
            &contacts(2),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        assert!(result.is_success());
        assert!(result.outcomes[0].is_success());
        assert_eq!(result.outcomes[1], IngestOutcome::Unprocessed);
        assert!(!result.has_failures());
        assert_eq!(result.success_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_ingest_over_http() {
        let mock_server = MockServer::start().await;
        let job_path = format!("/services/data/v62.0/jobs/ingest/{JOB_ID}");

        let mut created = job_body(JOB_ID, "insert", "Open");
        created["columnDelimiter"] = json!("PIPE");
        Mock::given(method("POST"))
            .and(path("/services/data/v62.0/jobs/ingest"))
            .and(body_partial_json(json!({"object": "Contact", "columnDelimiter": "PIPE"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(created))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path(format!("{job_path}/batches")))
            .and(header("Content-Type", "text/csv"))
            .and(body_string("LastName|Email\nContact 0|#N/A\n"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .and(path(job_path.clone()))
            .and(body_partial_json(json!({"state": "UploadComplete"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(job_body(JOB_ID, "insert", "UploadComplete")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = sf_toolkit_client::SalesforceClient::new(mock_server.uri(), "token").unwrap();
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Insert)
            .with_column_delimiter(ColumnDelimiter::Pipe);
        let mut job = BulkIngestJob::init_job(client, request).await.unwrap();

        let mut record = contacts(1).remove(0);
        record.set("Email", None::<String>).unwrap();
        job.upload_batches(&[record]).await.unwrap();
        assert_eq!(job.state(), JobState::UploadComplete);
    }

    #[tokio::test]
    async fn test_resume_by_connection_name() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/services/data/v62.0/jobs/ingest"))
            .and(body_partial_json(json!({"object": "Contact", "operation": "delete"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body(JOB_ID, "delete", "Open")))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/services/data/v62.0/jobs/ingest/{JOB_ID}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(job_body(JOB_ID, "delete", "InProgress")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SalesforceClient::new(mock_server.uri(), "token").unwrap();
        let guard = client.register("bulk-ingest-named").unwrap();

        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Delete);
        let job = BulkIngestJob::init_job_named(Some("bulk-ingest-named"), request)
            .await
            .unwrap();
        assert_eq!(job.id(), JOB_ID);
        assert_eq!(job.state(), JobState::Open);

        let resumed = BulkIngestJob::resume_named(Some("bulk-ingest-named"), JOB_ID)
            .await
            .unwrap();
        assert_eq!(resumed.state(), JobState::InProgress);

        drop(guard);
        let request = CreateIngestJobRequest::new("Contact", BulkOperation::Delete);
        let err = BulkIngestJob::init_job_named(Some("bulk-ingest-named"), request)
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Client(_)));
    }
}
