//! The reqwest-backed [`Connection`].
//!
//! ## Security
//!
//! - Access tokens are redacted in Debug output
//! - Sensitive parameters are skipped in tracing spans

use tracing::instrument;

use crate::client::SfHttpClient;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::registry::{ConnectionRegistry, RegistrationGuard};
use crate::request::RequestBuilder;
use crate::response::Response;
use crate::DEFAULT_API_VERSION;

/// Salesforce session over HTTPS.
///
/// Cloning is cheap: clones share the underlying connection pool.
///
/// # Example
///
/// ```rust,ignore
/// use sf_toolkit_client::{Connection, SalesforceClient};
///
/// let client = SalesforceClient::new("https://na1.salesforce.com", token)?
///     .with_api_version("61.0");
/// let page = client.query("SELECT Id FROM Account", false).await?;
/// ```
#[derive(Clone)]
pub struct SalesforceClient {
    http: SfHttpClient,
    instance_url: String,
    access_token: String,
    api_version: String,
}

impl std::fmt::Debug for SalesforceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceClient")
            .field("instance_url", &self.instance_url)
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl SalesforceClient {
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Self::with_config(instance_url, access_token, ClientConfig::default())
    }

    pub fn with_config(
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let instance_url = instance_url.into();
        url::Url::parse(&instance_url)?;
        Ok(Self {
            http: SfHttpClient::new(config)?,
            instance_url: instance_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }

    /// Set the API version (e.g., "62.0").
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Replace the access token after an external refresh.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    pub fn config(&self) -> &ClientConfig {
        self.http.config()
    }

    /// Register a clone of this client in the global registry under `name`.
    ///
    /// The entry is removed when the returned guard is dropped.
    pub fn register(
        &self,
        name: impl Into<String>,
    ) -> Result<RegistrationGuard<'static, SalesforceClient>> {
        ConnectionRegistry::global().register_scoped(name, self.clone())
    }

    /// Look up a registered client; `None` selects the default name.
    pub fn named(name: Option<&str>) -> Result<Self> {
        ConnectionRegistry::global().get(name)
    }
}

impl Connection for SalesforceClient {
    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn api_version(&self) -> &str {
        &self.api_version
    }

    #[instrument(skip(self, request), fields(method = request.method().as_str(), url = %request.url()))]
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let url = self.url(request.url());
        let mut request = request.bearer_auth(&self.access_token);
        request.url = url;
        self.http.execute(&request).await
    }
}
