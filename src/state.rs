//! Application state management

use std::sync::Arc;

use crate::backend::{
    build_client, Credentials, HttpJobStatusClient, JobPoller, Poller, Relay, Uploader,
};
use crate::config::Config;
use crate::files::StaticArtifactServer;
use crate::upload::UploadHandler;

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to build backend HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    static_server: StaticArtifactServer,
    upload_handler: UploadHandler,
}

impl AppState {
    /// Wire the production relay and poller from configuration
    pub fn from_config(config: Config) -> Result<Self, StateError> {
        let client = build_client(&config.backend)?;
        let credentials = Credentials::from_config(&config.backend);

        let uploader: Arc<dyn Uploader> = Arc::new(Relay::new(
            client.clone(),
            credentials.clone(),
            config.backend.base_url.clone(),
            config.communication_timeout,
        ));
        let poller: Arc<dyn Poller> = Arc::new(JobPoller::new(
            HttpJobStatusClient::new(client, credentials, config.communication_timeout),
            &config.jobs,
        ));

        let upload_handler =
            UploadHandler::new(config.backend.base_url.clone(), uploader, poller);
        let static_server = StaticArtifactServer::new(config.static_files.root.clone());

        Ok(Self::new(config, static_server, upload_handler))
    }

    /// Assemble state from already-built parts
    pub fn new(
        config: Config,
        static_server: StaticArtifactServer,
        upload_handler: UploadHandler,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                static_server,
                upload_handler,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn static_server(&self) -> &StaticArtifactServer {
        &self.inner.static_server
    }

    pub fn upload_handler(&self) -> &UploadHandler {
        &self.inner.upload_handler
    }
}
