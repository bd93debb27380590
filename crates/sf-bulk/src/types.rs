//! Types for Bulk API 2.0.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use sf_toolkit_records::CsvDialect;

/// Deserialize API version that can be either a float (59.0) or string ("59.0").
pub(crate) fn deserialize_api_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ApiVersion {
        Float(f64),
        String(String),
    }

    Option::<ApiVersion>::deserialize(deserializer).map(|opt| {
        opt.map(|v| match v {
            ApiVersion::Float(f) => format!("{:.1}", f),
            ApiVersion::String(s) => s,
        })
    })
}

/// Salesforce job timestamps use `+0000` offsets, which RFC 3339 rejects.
fn parse_job_timestamp(value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let value = value?;
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

/// Bulk API 2.0 job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Job is open and accepting data
    Open,
    /// Upload is complete, job is ready for processing
    UploadComplete,
    /// Job is processing
    InProgress,
    /// Job was aborted
    Aborted,
    /// Job completed successfully
    JobComplete,
    /// Job failed
    Failed,
}

impl JobState {
    /// Check if job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Aborted | JobState::JobComplete | JobState::Failed
        )
    }

    /// Check if job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobState::JobComplete)
    }

    fn rank(&self) -> u8 {
        match self {
            JobState::Open => 0,
            JobState::UploadComplete => 1,
            JobState::InProgress => 2,
            JobState::Aborted | JobState::JobComplete | JobState::Failed => 3,
        }
    }

    /// Whether a job known to be in `self` may be moved to `observed`.
    ///
    /// Terminal states are final and states never move backwards.
    pub(crate) fn accepts(&self, observed: JobState) -> bool {
        !self.is_terminal() && observed.rank() >= self.rank()
    }
}

/// Bulk API 2.0 operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkOperation {
    /// Insert new records
    Insert,
    /// Update existing records
    Update,
    /// Upsert based on external ID
    Upsert,
    /// Delete records (soft delete)
    Delete,
    /// Hard delete records (permanent)
    HardDelete,
    /// Query records
    Query,
    /// Query all records including deleted
    QueryAll,
}

impl BulkOperation {
    /// Get the API string for this operation.
    pub fn api_name(&self) -> &'static str {
        match self {
            BulkOperation::Insert => "insert",
            BulkOperation::Update => "update",
            BulkOperation::Upsert => "upsert",
            BulkOperation::Delete => "delete",
            BulkOperation::HardDelete => "hardDelete",
            BulkOperation::Query => "query",
            BulkOperation::QueryAll => "queryAll",
        }
    }

    /// Check if this is a query operation.
    pub fn is_query(&self) -> bool {
        matches!(self, BulkOperation::Query | BulkOperation::QueryAll)
    }

    /// Check if this is an ingest operation.
    pub fn is_ingest(&self) -> bool {
        !self.is_query()
    }

    /// Delete operations upload only the `Id` column.
    pub fn is_delete(&self) -> bool {
        matches!(self, BulkOperation::Delete | BulkOperation::HardDelete)
    }
}

/// Content type for Bulk API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ContentType {
    #[default]
    #[serde(rename = "CSV")]
    Csv,
}

/// Line ending style for Bulk API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LineEnding {
    /// Unix-style (LF)
    #[default]
    #[serde(rename = "LF")]
    Lf,
    /// Windows-style (CRLF)
    #[serde(rename = "CRLF")]
    Crlf,
}

/// Column delimiter for Bulk API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnDelimiter {
    #[default]
    Comma,
    Tab,
    Semicolon,
    Pipe,
    Backquote,
    Caret,
}

impl ColumnDelimiter {
    /// Get the API string for this delimiter.
    pub fn api_name(&self) -> &'static str {
        match self {
            ColumnDelimiter::Comma => "COMMA",
            ColumnDelimiter::Tab => "TAB",
            ColumnDelimiter::Semicolon => "SEMICOLON",
            ColumnDelimiter::Pipe => "PIPE",
            ColumnDelimiter::Backquote => "BACKQUOTE",
            ColumnDelimiter::Caret => "CARET",
        }
    }

    /// Get the actual delimiter character.
    pub fn char(&self) -> char {
        match self {
            ColumnDelimiter::Comma => ',',
            ColumnDelimiter::Tab => '\t',
            ColumnDelimiter::Semicolon => ';',
            ColumnDelimiter::Pipe => '|',
            ColumnDelimiter::Backquote => '`',
            ColumnDelimiter::Caret => '^',
        }
    }
}

/// The CSV dialect a job reads and writes.
pub(crate) fn dialect(delimiter: ColumnDelimiter, line_ending: LineEnding) -> CsvDialect {
    CsvDialect::new(delimiter.char() as u8, line_ending == LineEnding::Crlf)
}

// =============================================================================
// Request Types
// =============================================================================

/// Request to create an ingest job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIngestJobRequest {
    /// SObject API name
    pub object: String,
    /// Operation type
    pub operation: BulkOperation,
    /// External ID field for upsert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_field_name: Option<String>,
    /// Content type
    pub content_type: ContentType,
    /// Column delimiter
    pub column_delimiter: ColumnDelimiter,
    /// Line ending
    pub line_ending: LineEnding,
}

impl CreateIngestJobRequest {
    /// Create a new ingest job request.
    pub fn new(sobject: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            object: sobject.into(),
            operation,
            external_id_field_name: None,
            content_type: ContentType::Csv,
            column_delimiter: ColumnDelimiter::default(),
            line_ending: LineEnding::default(),
        }
    }

    /// Set the external ID field for upsert operations.
    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field_name = Some(field.into());
        self
    }

    /// Set the column delimiter.
    pub fn with_column_delimiter(mut self, delimiter: ColumnDelimiter) -> Self {
        self.column_delimiter = delimiter;
        self
    }

    /// Set the line ending.
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }
}

/// Request to create a query job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryJobRequest {
    /// SOQL query
    pub query: String,
    /// Operation type (query or queryAll)
    pub operation: BulkOperation,
    /// Column delimiter
    pub column_delimiter: ColumnDelimiter,
    /// Line ending
    pub line_ending: LineEnding,
}

/// Request to move a job to a new state.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateJobStateRequest {
    pub state: JobState,
}

impl UpdateJobStateRequest {
    pub fn upload_complete() -> Self {
        Self {
            state: JobState::UploadComplete,
        }
    }

    pub fn abort() -> Self {
        Self {
            state: JobState::Aborted,
        }
    }
}

/// Options for [`BulkQueryJob::init_job`](crate::BulkQueryJob::init_job).
#[derive(Debug, Clone, Default)]
pub struct QueryJobOptions {
    /// Include deleted and archived records (`queryAll`).
    pub query_all: bool,
    pub column_delimiter: ColumnDelimiter,
    pub line_ending: LineEnding,
    /// Rows per result page (`maxRecords`); the server picks when unset.
    pub max_records: Option<u64>,
}

impl QueryJobOptions {
    pub fn with_query_all(mut self) -> Self {
        self.query_all = true;
        self
    }

    pub fn with_column_delimiter(mut self, delimiter: ColumnDelimiter) -> Self {
        self.column_delimiter = delimiter;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = Some(max_records);
        self
    }
}

/// Upload limits for [`BulkIngestJob::upload_batches_with`](crate::BulkIngestJob::upload_batches_with).
#[derive(Debug, Clone)]
pub struct IngestUploadOptions {
    /// Largest CSV body per upload request, header included.
    pub max_bytes: usize,
}

/// Uploads are base64-encoded server side; 100 MB of CSV stays below the
/// 150 MB request limit.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100_000_000;

impl Default for IngestUploadOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl IngestUploadOptions {
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Ingest job information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJobInfo {
    /// Job ID
    pub id: String,
    /// Current state
    pub state: JobState,
    /// SObject API name
    pub object: String,
    /// Operation type
    pub operation: BulkOperation,
    #[serde(default)]
    pub external_id_field_name: Option<String>,
    #[serde(default)]
    pub column_delimiter: Option<ColumnDelimiter>,
    #[serde(default)]
    pub line_ending: Option<LineEnding>,
    #[serde(default)]
    pub content_type: Option<ContentType>,
    /// Upload URL, relative to the instance
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    /// Number of records processed
    #[serde(default)]
    pub number_records_processed: i64,
    /// Number of records failed
    #[serde(default)]
    pub number_records_failed: i64,
    #[serde(default)]
    pub retries: Option<i64>,
    #[serde(default)]
    pub created_by_id: Option<String>,
    /// Job creation time
    #[serde(default)]
    pub created_date: Option<String>,
    /// Last modification time
    #[serde(default)]
    pub system_modstamp: Option<String>,
    /// Total processing time in milliseconds
    #[serde(default)]
    pub total_processing_time: Option<i64>,
    #[serde(default)]
    pub api_active_processing_time: Option<i64>,
    #[serde(default)]
    pub apex_processing_time: Option<i64>,
    /// API version (can be float like 59.0 or string like "59.0")
    #[serde(default, deserialize_with = "deserialize_api_version")]
    pub api_version: Option<String>,
    /// Concurrency mode
    #[serde(default)]
    pub concurrency_mode: Option<String>,
    /// Error message if failed
    #[serde(default)]
    pub error_message: Option<String>,
}

impl IngestJobInfo {
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_job_timestamp(self.created_date.as_deref())
    }

    pub fn modified_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_job_timestamp(self.system_modstamp.as_deref())
    }
}

/// Query job information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryJobInfo {
    /// Job ID
    pub id: String,
    /// Current state
    pub state: JobState,
    /// SObject API name
    #[serde(default)]
    pub object: Option<String>,
    /// SOQL query
    #[serde(default)]
    pub query: Option<String>,
    /// Operation type
    pub operation: BulkOperation,
    #[serde(default)]
    pub column_delimiter: Option<ColumnDelimiter>,
    #[serde(default)]
    pub line_ending: Option<LineEnding>,
    /// Number of records processed
    #[serde(default)]
    pub number_records_processed: i64,
    #[serde(default)]
    pub retries: Option<i64>,
    /// Job creation time
    #[serde(default)]
    pub created_date: Option<String>,
    /// Last modification time
    #[serde(default)]
    pub system_modstamp: Option<String>,
    /// Total processing time in milliseconds
    #[serde(default)]
    pub total_processing_time: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_api_version")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub concurrency_mode: Option<String>,
    /// Error message if failed
    #[serde(default)]
    pub error_message: Option<String>,
}

impl QueryJobInfo {
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_job_timestamp(self.created_date.as_deref())
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// One row of an ingest job's result files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestResultRow {
    /// Input position of the uploaded row, when it could be matched.
    pub position: Option<usize>,
    /// `sf__Id`
    pub id: Option<String>,
    /// `sf__Created`
    pub created: bool,
    /// `sf__Error`
    pub error: Option<String>,
    /// The uploaded columns, as echoed by the server.
    pub values: std::collections::BTreeMap<String, String>,
}

/// What happened to one uploaded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Success { id: Option<String>, created: bool },
    Failure { error: String },
    /// Not processed, e.g. because the job failed or was aborted first.
    Unprocessed,
}

impl IngestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestOutcome::Success { .. })
    }

    /// Id of the saved record, when the job reported one.
    pub fn id(&self) -> Option<&str> {
        match self {
            IngestOutcome::Success { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}

/// Result of a completed ingest job.
#[derive(Debug, Clone)]
pub struct IngestJobResult {
    /// The job as last observed
    pub job: IngestJobInfo,
    /// One outcome per uploaded record, in input order
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestJobResult {
    /// Check if the job succeeded.
    pub fn is_success(&self) -> bool {
        self.job.state.is_success()
    }

    /// Get the success rate.
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let succeeded = self.outcomes.iter().filter(|o| o.is_success()).count();
        succeeded as f64 / self.outcomes.len() as f64
    }

    /// Check if there were any failures.
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, IngestOutcome::Failure { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Open.is_terminal());
        assert!(!JobState::InProgress.is_terminal());
        assert!(JobState::JobComplete.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Aborted.is_terminal());
    }

    #[test]
    fn test_job_state_never_moves_backwards() {
        assert!(JobState::Open.accepts(JobState::UploadComplete));
        assert!(JobState::UploadComplete.accepts(JobState::JobComplete));
        assert!(JobState::InProgress.accepts(JobState::InProgress));
        assert!(!JobState::InProgress.accepts(JobState::UploadComplete));
        assert!(!JobState::JobComplete.accepts(JobState::Failed));
    }

    #[test]
    fn test_bulk_operation_types() {
        assert!(BulkOperation::Query.is_query());
        assert!(BulkOperation::QueryAll.is_query());
        assert!(BulkOperation::Insert.is_ingest());
        assert!(BulkOperation::HardDelete.is_delete());
        assert_eq!(
            serde_json::to_value(BulkOperation::HardDelete).unwrap(),
            "hardDelete"
        );
        assert_eq!(
            serde_json::from_value::<BulkOperation>("queryAll".into()).unwrap(),
            BulkOperation::QueryAll
        );
    }

    #[test]
    fn test_create_ingest_job_request() {
        let request = CreateIngestJobRequest::new("Account", BulkOperation::Upsert)
            .with_external_id_field("External_Id__c")
            .with_column_delimiter(ColumnDelimiter::Pipe)
            .with_line_ending(LineEnding::Crlf);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["object"], "Account");
        assert_eq!(json["operation"], "upsert");
        assert_eq!(json["externalIdFieldName"], "External_Id__c");
        assert_eq!(json["contentType"], "CSV");
        assert_eq!(json["columnDelimiter"], "PIPE");
        assert_eq!(json["lineEnding"], "CRLF");
    }

    #[test]
    fn test_job_info_parsing() {
        let job: IngestJobInfo = serde_json::from_value(serde_json::json!({
            "id": "750R0000000zlh9IAA",
            "operation": "insert",
            "object": "Account",
            "createdDate": "2024-05-01T12:30:00.000+0000",
            "state": "UploadComplete",
            "columnDelimiter": "COMMA",
            "lineEnding": "LF",
            "apiVersion": 62.0,
            "contentUrl": "services/data/v62.0/jobs/ingest/750R0000000zlh9IAA/batches"
        }))
        .unwrap();
        assert_eq!(job.state, JobState::UploadComplete);
        assert_eq!(job.api_version.as_deref(), Some("62.0"));
        assert_eq!(job.column_delimiter, Some(ColumnDelimiter::Comma));
        assert_eq!(job.created_at().unwrap().to_rfc3339(), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn test_dialect_mapping() {
        let dialect = dialect(ColumnDelimiter::Tab, LineEnding::Crlf);
        assert_eq!(dialect.delimiter, b'\t');
        assert!(dialect.crlf);
    }
}
