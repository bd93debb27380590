//! SObject Collections for batch operations.

use serde::{Deserialize, Serialize};
use sf_toolkit_records::Record;

use crate::dispatch::{MAX_COLLECTION_BATCH, MAX_FETCH_BATCH};

/// Request body for Collections create/update/upsert.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRequest {
    #[serde(rename = "allOrNone")]
    pub all_or_none: bool,
    pub records: Vec<serde_json::Value>,
}

/// Request body for Collections retrieve.
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveRequest {
    pub ids: Vec<String>,
    pub fields: Vec<String>,
}

/// One entry of a Collections response.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionResult {
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<SalesforceError>,
    pub created: Option<bool>,
}

/// Salesforce error in operation results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SalesforceError {
    #[serde(rename = "statusCode")]
    pub status_code: String,
    pub message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Outcome of saving one record, reported at the record's input position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Success { id: Option<String>, created: bool },
    Failure { errors: Vec<SalesforceError> },
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SaveOutcome::Success { .. })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            SaveOutcome::Success { id, .. } => id.as_deref(),
            SaveOutcome::Failure { .. } => None,
        }
    }

    pub fn errors(&self) -> &[SalesforceError] {
        match self {
            SaveOutcome::Success { .. } => &[],
            SaveOutcome::Failure { errors } => errors,
        }
    }

    /// Every item of a chunk whose request failed outright.
    pub(crate) fn request_failed(err: &crate::Error) -> Self {
        SaveOutcome::Failure {
            errors: vec![SalesforceError::request_failed(err)],
        }
    }
}

impl SalesforceError {
    /// Describe a request that failed outright, for each record it carried.
    pub(crate) fn request_failed(err: &crate::Error) -> Self {
        let status_code = match err.api_error() {
            Some((code, _)) => code.to_string(),
            None if err.is_transport() => "TRANSPORT_ERROR".to_string(),
            None => "REQUEST_FAILED".to_string(),
        };
        SalesforceError {
            status_code,
            message: err.to_string(),
            fields: Vec::new(),
        }
    }

    pub(crate) fn missing_result() -> Self {
        SalesforceError {
            status_code: "MISSING_RESULT".to_string(),
            message: "no result was returned for this record".to_string(),
            fields: Vec::new(),
        }
    }
}

/// Result of fetching one Id: the record, `None` when the server could not
/// find it, or the error of the request that carried it.
pub type FetchResult = std::result::Result<Option<Record>, SalesforceError>;

impl From<CollectionResult> for SaveOutcome {
    fn from(result: CollectionResult) -> Self {
        if result.success {
            SaveOutcome::Success {
                id: result.id,
                created: result.created.unwrap_or(false),
            }
        } else {
            SaveOutcome::Failure {
                errors: result.errors,
            }
        }
    }
}

/// Options shared by the list save operations.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Requests in flight at once.
    pub concurrency: usize,
    /// Records per request, at most 200.
    pub batch_size: usize,
    /// Roll back the whole request if any record in it fails.
    pub all_or_none: bool,
    /// Send only dirty fields; records without changes are not sent.
    pub only_changes: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            batch_size: MAX_COLLECTION_BATCH,
            all_or_none: false,
            only_changes: false,
        }
    }
}

impl SaveOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_all_or_none(mut self, all_or_none: bool) -> Self {
        self.all_or_none = all_or_none;
        self
    }

    pub fn with_only_changes(mut self, only_changes: bool) -> Self {
        self.only_changes = only_changes;
        self
    }
}

/// Options for [`fetch_list`](crate::SalesforceRestClient::fetch_list).
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub concurrency: usize,
    /// Ids per request, at most 2000.
    pub batch_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            batch_size: MAX_FETCH_BATCH,
        }
    }
}

impl FetchOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// A single Collections request may hold at most this many runs of
/// consecutive same-type records.
const MAX_TYPE_RUNS: usize = 10;

/// Split records, given by entity name in input order, into request batches.
///
/// A batch closes when it holds `batch_size` records or when the next record
/// would start an eleventh run of same-type records. Returned indices point
/// into `sobjects`.
pub(crate) fn plan_batches(sobjects: &[&str], batch_size: usize) -> Vec<Vec<usize>> {
    let mut batches = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut runs = 0;

    for (index, sobject) in sobjects.iter().enumerate() {
        let new_run = current
            .last()
            .is_none_or(|&previous| sobjects[previous] != *sobject);
        if current.len() >= batch_size || (new_run && runs >= MAX_TYPE_RUNS) {
            batches.push(std::mem::take(&mut current));
            runs = 0;
        }
        if current.is_empty() || new_run {
            runs += 1;
        }
        current.push(index);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_request_serialization() {
        let request = CollectionRequest {
            all_or_none: true,
            records: vec![
                json!({"attributes": {"type": "Account"}, "Name": "Acme"}),
                json!({"attributes": {"type": "Account"}, "Name": "Widget Co"}),
            ],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["allOrNone"], true);
        assert_eq!(json["records"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_outcome_from_success() {
        let json =
            json!({"id": "001xx000003DgAAAS", "success": true, "errors": [], "created": true});
        let result: CollectionResult = serde_json::from_value(json).unwrap();
        let outcome = SaveOutcome::from(result);
        assert!(outcome.is_success());
        assert_eq!(outcome.id(), Some("001xx000003DgAAAS"));
        assert_eq!(
            outcome,
            SaveOutcome::Success {
                id: Some("001xx000003DgAAAS".to_string()),
                created: true
            }
        );
    }

    #[test]
    fn test_outcome_from_failure() {
        let json = json!({
            "id": null,
            "success": false,
            "errors": [{"statusCode": "DUPLICATES_DETECTED", "message": "Duplicate found", "fields": []}],
            "created": null
        });
        let result: CollectionResult = serde_json::from_value(json).unwrap();
        let outcome = SaveOutcome::from(result);
        assert!(!outcome.is_success());
        assert_eq!(outcome.errors()[0].status_code, "DUPLICATES_DETECTED");
    }

    #[test]
    fn test_request_failure_keeps_api_code() {
        let err = crate::Error::from(sf_toolkit_client::Error::new(
            sf_toolkit_client::ErrorKind::SalesforceApi {
                error_code: "REQUEST_LIMIT_EXCEEDED".to_string(),
                message: "TotalRequests Limit exceeded.".to_string(),
                fields: vec![],
            },
        ));
        let outcome = SaveOutcome::request_failed(&err);
        assert_eq!(outcome.errors()[0].status_code, "REQUEST_LIMIT_EXCEEDED");

        let err = crate::Error::from(sf_toolkit_client::Error::new(
            sf_toolkit_client::ErrorKind::Timeout,
        ));
        assert_eq!(
            SaveOutcome::request_failed(&err).errors()[0].status_code,
            "TRANSPORT_ERROR"
        );
    }

    #[test]
    fn test_batches_split_by_size() {
        let sobjects = vec!["Account"; 450];
        let sizes: Vec<usize> = plan_batches(&sobjects, 200).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![200, 200, 50]);
        assert!(plan_batches(&[], 200).is_empty());
    }

    #[test]
    fn test_batches_limit_type_runs() {
        // Alternating types: every record starts a new run.
        let sobjects: Vec<&str> = (0..25)
            .map(|i| if i % 2 == 0 { "Account" } else { "Contact" })
            .collect();
        let batches = plan_batches(&sobjects, 200);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(batches[1][0], 10);

        let grouped = vec!["Account", "Account", "Contact", "Contact"];
        assert_eq!(plan_batches(&grouped, 200), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_default_options() {
        let options = SaveOptions::default();
        assert_eq!(options.batch_size, 200);
        assert_eq!(options.concurrency, 1);
        let options = options.with_concurrency(4).with_only_changes(true);
        assert_eq!(options.concurrency, 4);
        assert!(options.only_changes);
    }
}
