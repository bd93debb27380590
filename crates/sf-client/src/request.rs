//! HTTP request description passed through a [`Connection`](crate::Connection).
//!
//! A `RequestBuilder` is plain data: the transport decides how to put it on
//! the wire, and test connections can inspect it directly.

use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl RequestMethod {
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Patch => reqwest::Method::PATCH,
            RequestMethod::Put => reqwest::Method::PUT,
            RequestMethod::Delete => reqwest::Method::DELETE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        }
    }
}

/// Request body content.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
}

impl RequestBody {
    /// Body length in bytes as it will be sent.
    pub fn len(&self) -> usize {
        match self {
            RequestBody::Json(value) => value.to_string().len(),
            RequestBody::Text(text) => text.len(),
            RequestBody::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for HTTP requests with Salesforce-specific options.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    pub(crate) method: RequestMethod,
    pub(crate) url: String,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) bearer_token: Option<String>,
}

impl RequestBuilder {
    pub fn new(method: RequestMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            query_params: Vec::new(),
            body: None,
            bearer_token: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(RequestMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(RequestMethod::Post, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(RequestMethod::Patch, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(RequestMethod::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(RequestMethod::Delete, url)
    }

    /// Set the bearer token for authentication.
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    /// Set JSON body.
    pub fn json<T: Serialize>(self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)?;
        Ok(self.json_value(value))
    }

    /// Set raw JSON body.
    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self.header("Content-Type", "application/json")
    }

    /// Set CSV body (for Bulk API uploads).
    pub fn csv(mut self, data: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(data.into()));
        self.header("Content-Type", "text/csv")
    }

    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Set the Accept header.
    pub fn accept(self, mime: &str) -> Self {
        self.header("Accept", mime)
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Look up a header set on this request (exact name match).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// The JSON body, if one was set.
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// The text body (CSV uploads), if one was set.
    pub fn text_body(&self) -> Option<&str> {
        match &self.body {
            Some(RequestBody::Text(text)) => Some(text),
            _ => None,
        }
    }
}
