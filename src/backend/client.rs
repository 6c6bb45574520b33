//! Shared outbound HTTP client

use std::time::Duration;

use crate::config::BackendConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Basic-auth credentials attached to every backend request
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Build the pooled client used by both the relay and the job poller.
///
/// No overall timeout is set here; callers apply one per request.
pub fn build_client(config: &BackendConfig) -> reqwest::Result<reqwest::Client> {
    if config.skip_cert_verify {
        tracing::warn!("Backend TLS certificate verification is disabled");
    }

    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .tcp_keepalive(TCP_KEEPALIVE)
        .danger_accept_invalid_certs(config.skip_cert_verify)
        .build()
}
