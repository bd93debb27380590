//! Buffered HTTP response with Salesforce-specific accessors.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// A fully-read HTTP response.
///
/// The body is buffered so a response can be inspected more than once and
/// built by hand in tests.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Response {
    /// Build a response. Header names are matched case-insensitively.
    pub fn new<K, V>(
        status: u16,
        headers: impl IntoIterator<Item = (K, V)>,
        body: impl Into<Bytes>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
                .collect(),
            body: body.into(),
        }
    }

    /// A JSON response with the given status.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self::new(
            status,
            [("Content-Type", "application/json")],
            value.to_string(),
        )
    }

    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;
        Ok(Self::new(status, headers, body))
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns true if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get the Retry-After header as a Duration (seconds form only).
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    /// The Bulk API result locator. `None` when absent or when the server
    /// reports `"null"`, meaning there are no further pages.
    pub fn sforce_locator(&self) -> Option<&str> {
        self.header("sforce-locator")
            .filter(|value| !value.is_empty() && *value != "null")
    }

    /// Number of rows in this Bulk API result page.
    pub fn sforce_record_count(&self) -> Option<u64> {
        self.header("sforce-numberofrecords")?.parse().ok()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| {
            Error::with_source(
                ErrorKind::Other("Response body is not valid UTF-8".to_string()),
                e,
            )
        })
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    /// Get API usage limits from the `Sforce-Limit-Info` header
    /// (`api-usage=25/15000`).
    pub fn api_usage(&self) -> Option<ApiUsage> {
        let info = self.header("sforce-limit-info")?;

        info.split(',')
            .map(str::trim)
            .find_map(|part| part.strip_prefix("api-usage="))
            .and_then(|usage| {
                let (used, limit) = usage.split_once('/')?;
                Some(ApiUsage {
                    used: used.parse().ok()?,
                    limit: limit.parse().ok()?,
                })
            })
    }

    /// Convert a non-2xx response into the matching error.
    pub fn check_salesforce_error(self) -> Result<Response> {
        if self.is_success() {
            return Ok(self);
        }
        let body = String::from_utf8_lossy(&self.body);
        Err(parse_error_response(self.status, &body))
    }
}

/// API usage information from response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiUsage {
    pub used: u64,
    pub limit: u64,
}

impl ApiUsage {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn percentage(&self) -> f64 {
        if self.limit == 0 {
            100.0
        } else {
            (self.used as f64 / self.limit as f64) * 100.0
        }
    }
}

fn parse_error_response(status: u16, body: &str) -> Error {
    if status == 429 {
        return Error::new(ErrorKind::RateLimited { retry_after: None });
    }

    // Salesforce returns either an array of errors or a single error object.
    let first = serde_json::from_str::<Vec<SalesforceErrorResponse>>(body)
        .ok()
        .and_then(|errors| errors.into_iter().next())
        .or_else(|| serde_json::from_str::<SalesforceErrorResponse>(body).ok());

    if let Some(err) = first {
        return Error::new(ErrorKind::SalesforceApi {
            error_code: err.error_code,
            message: sanitize_error_message(&err.message),
            fields: err.fields.unwrap_or_default(),
        });
    }

    let sanitized = sanitize_error_message(body);
    let kind = match status {
        401 => ErrorKind::Authentication(sanitized),
        403 => ErrorKind::Authorization(sanitized),
        404 => ErrorKind::NotFound(sanitized),
        _ => ErrorKind::Http {
            status,
            message: sanitized,
        },
    };

    Error::new(kind)
}

/// Strip anything that looks like a credential and bound the length.
fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let mut sanitized = message.to_string();

    // Access tokens look like "<15+ char org id>!<opaque>".
    if let Ok(token_pattern) = regex_lite::Regex::new(r"00[A-Za-z0-9]{13,}[!][A-Za-z0-9_.]+") {
        sanitized = token_pattern
            .replace_all(&sanitized, "[REDACTED_TOKEN]")
            .to_string();
    }

    if let Ok(session_pattern) = regex_lite::Regex::new(r"sid=[A-Za-z0-9]{20,}") {
        sanitized = session_pattern
            .replace_all(&sanitized, "sid=[REDACTED]")
            .to_string();
    }

    if sanitized.len() > MAX_LENGTH {
        let mut cut = MAX_LENGTH;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}

#[derive(Debug, serde::Deserialize)]
struct SalesforceErrorResponse {
    #[serde(alias = "errorCode")]
    error_code: String,
    message: String,
    fields: Option<Vec<String>>,
}
