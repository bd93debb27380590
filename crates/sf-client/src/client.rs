//! Core HTTP client with retry, compression, and Salesforce-specific handling.

use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{RequestBody, RequestBuilder};
use crate::response::Response;
use crate::retry::RetryPolicy;

/// HTTP client for Salesforce APIs with built-in retry, compression, and error handling.
#[derive(Debug, Clone)]
pub struct SfHttpClient {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl SfHttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.accept_compressed)
            .deflate(config.accept_compressed)
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute a request, retrying transport failures per the configured policy.
    ///
    /// Non-2xx responses that are not retryable are converted into errors.
    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    pub async fn execute(&self, request: &RequestBuilder) -> Result<Response> {
        let mut retry_policy = self.config.retry.clone().map(RetryPolicy::new);

        loop {
            match self.execute_once(request).await {
                Ok(response) => return response.check_salesforce_error(),
                Err(err) if err.is_retryable() => {
                    let Some(policy) = retry_policy.as_mut() else {
                        return Err(err);
                    };
                    match policy.next_delay(err.retry_after()) {
                        Some(delay) => {
                            warn!(
                                attempt = policy.attempt(),
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "Request failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(Error::with_source(
                                ErrorKind::RetriesExhausted {
                                    attempts: policy.attempt(),
                                },
                                err,
                            ));
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn execute_once(&self, request: &RequestBuilder) -> Result<Response> {
        let mut req = self
            .inner
            .request(request.method.to_reqwest(), &request.url);

        if let Some(ref token) = request.bearer_token {
            req = req.bearer_auth(token);
        }

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        if !request.query_params.is_empty() {
            req = req.query(&request.query_params);
        }

        if let Some(ref body) = request.body {
            req = match body {
                RequestBody::Json(value) => req.json(value),
                RequestBody::Text(text) => req.body(text.clone()),
                RequestBody::Bytes(bytes) => req.body(bytes.clone()),
            };
        }

        if self.config.enable_tracing {
            debug!(method = request.method.as_str(), url = %request.url, "Sending request");
        }

        let response = Response::from_reqwest(req.send().await?).await?;
        let status = response.status();

        if self.config.enable_tracing {
            let content_length = response.bytes().len();
            if response.is_success() {
                debug!(status, content_length, "Response received");
            } else {
                info!(status, content_length, "Non-success response");
            }
        }

        if status == 429 {
            return Err(Error::new(ErrorKind::RateLimited {
                retry_after: response.retry_after(),
            }));
        }

        if matches!(status, 500 | 502 | 503 | 504) {
            return Err(Error::new(ErrorKind::Http {
                status,
                message: format!("Server error: {}", status),
            }));
        }

        Ok(response)
    }
}
