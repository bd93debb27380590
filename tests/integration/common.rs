use std::sync::Arc;

use sf_toolkit::rest::SalesforceRestClient;
use sf_toolkit::SalesforceClient;

/// Prefix on every record these tests create, so leftovers are easy to find.
pub const TEST_PREFIX: &str = "SfToolkitIntTest";

/// Build a connection from `SF_INSTANCE_URL` and `SF_ACCESS_TOKEN`.
///
/// Returns `None` when either variable is unset so the suite can run in CI
/// without an org.
pub fn require_connection() -> Option<SalesforceClient> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let instance_url = std::env::var("SF_INSTANCE_URL").ok().filter(|v| !v.is_empty())?;
    let access_token = std::env::var("SF_ACCESS_TOKEN").ok().filter(|v| !v.is_empty())?;

    Some(
        SalesforceClient::new(instance_url, access_token)
            .expect("SF_INSTANCE_URL should be a valid instance URL"),
    )
}

pub fn rest_client(connection: &SalesforceClient) -> SalesforceRestClient<Arc<SalesforceClient>> {
    SalesforceRestClient::from_connection(Arc::new(connection.clone()))
}

pub fn unique_name(label: &str) -> String {
    format!(
        "{TEST_PREFIX} {label} {}",
        chrono::Utc::now().timestamp_millis()
    )
}
