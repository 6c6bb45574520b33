//! Job status polling
//!
//! Follows an accepted upload's job until it reaches a terminal state. Each
//! wait between queries is a cancellable timer, so a dropped client or an
//! expired deadline stops the loop at the next suspension point and no
//! further query is issued.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::client::Credentials;
use super::types::{JobDocument, JobReference, JobState, JobStatus};
use crate::config::JobConfig;

// ============================================================================
// Status Queries
// ============================================================================

/// A single status query that did not yield a status
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// Worth retrying: transport failure or a non-2xx answer
    #[error("status query failed: {0}")]
    Transient(String),

    /// The backend answered with something that is not a job document
    #[error("malformed job document: {0}")]
    Malformed(String),
}

/// Fetches the current status of a job once
#[async_trait]
pub trait JobStatusClient: Send + Sync {
    async fn fetch_status(&self, job: &JobReference) -> Result<JobStatus, QueryError>;
}

/// `JobStatusClient` speaking the backend's JSON job document over HTTP
#[derive(Debug, Clone)]
pub struct HttpJobStatusClient {
    client: reqwest::Client,
    credentials: Credentials,
    timeout: Duration,
}

impl HttpJobStatusClient {
    pub fn new(client: reqwest::Client, credentials: Credentials, timeout: Duration) -> Self {
        Self {
            client,
            credentials,
            timeout,
        }
    }
}

#[async_trait]
impl JobStatusClient for HttpJobStatusClient {
    async fn fetch_status(&self, job: &JobReference) -> Result<JobStatus, QueryError> {
        let response = self
            .credentials
            .apply(self.client.get(job.location().clone()))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| QueryError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Transient(format!(
                "job query returned {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| QueryError::Transient(e.to_string()))?;

        let document: JobDocument =
            serde_json::from_slice(&body).map_err(|e| QueryError::Malformed(e.to_string()))?;

        Ok(document.status())
    }
}

// ============================================================================
// Poller
// ============================================================================

/// Why polling ended without the job finishing
#[derive(Debug, Clone, thiserror::Error)]
pub enum PollError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("job still pending after {0:?}")]
    TimedOut(Duration),

    #[error("job status unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("polling cancelled")]
    Cancelled,
}

/// Follows a job to its terminal state
#[async_trait]
pub trait Poller: Send + Sync {
    /// Resolves with the `FINISHED` status, or why it never got there
    async fn poll_until_terminal(
        &self,
        job: &JobReference,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, PollError>;
}

/// Fixed-interval poller over any `JobStatusClient`
pub struct JobPoller<C> {
    client: C,
    interval: Duration,
    timeout: Duration,
    max_query_retries: u32,
}

impl<C: JobStatusClient> JobPoller<C> {
    pub fn new(client: C, config: &JobConfig) -> Self {
        Self {
            client,
            interval: config.poll_interval,
            timeout: config.timeout,
            max_query_retries: config.max_query_retries,
        }
    }

    /// Poll with an explicit interval and overall timeout.
    ///
    /// The first query goes out immediately. Transient query failures are
    /// retried on the same interval; they do not extend the deadline.
    pub async fn poll_with(
        &self,
        job: &JobReference,
        interval: Duration,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, PollError> {
        let deadline = Instant::now() + timeout;
        let mut queries: u32 = 0;
        let mut consecutive_failures: u32 = 0;
        let mut last_state: Option<JobState> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            queries += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = sleep_until(deadline) => return Err(self.timed_out(job, timeout, queries)),
                result = self.client.fetch_status(job) => result,
            };

            match result {
                Ok(status) => {
                    consecutive_failures = 0;
                    tracing::debug!(job = %job, state = %status.state, query = queries, "Polled job");

                    if let JobState::Unrecognized(raw) = &status.state {
                        return Err(PollError::Protocol(format!(
                            "unrecognized job state '{}'",
                            raw
                        )));
                    }
                    if let Some(previous) = &last_state {
                        if status.state.stage() < previous.stage() {
                            return Err(PollError::Protocol(format!(
                                "job state went back from {} to {}",
                                previous, status.state
                            )));
                        }
                    }

                    if status.state.is_terminal() {
                        if status.state == JobState::Finished {
                            tracing::info!(job = %job, queries, "Job finished");
                            return Ok(status);
                        }
                        let detail = status
                            .detail
                            .unwrap_or_else(|| "job failed without detail".to_string());
                        tracing::warn!(job = %job, detail = %detail, "Job failed");
                        return Err(PollError::Failed(detail));
                    }
                    last_state = Some(status.state);
                }
                Err(QueryError::Malformed(reason)) => {
                    return Err(PollError::Protocol(reason));
                }
                Err(QueryError::Transient(reason)) => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.max_query_retries {
                        tracing::error!(
                            job = %job,
                            attempts = consecutive_failures,
                            error = %reason,
                            "Giving up on job status"
                        );
                        return Err(PollError::Unavailable {
                            attempts: consecutive_failures,
                            last_error: reason,
                        });
                    }
                    tracing::warn!(
                        job = %job,
                        attempt = consecutive_failures,
                        error = %reason,
                        "Job status query failed, retrying"
                    );
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = sleep_until(deadline) => return Err(self.timed_out(job, timeout, queries)),
                _ = sleep(interval) => {}
            }
        }
    }

    fn timed_out(&self, job: &JobReference, timeout: Duration, queries: u32) -> PollError {
        tracing::warn!(job = %job, ?timeout, queries, "Job did not finish in time");
        PollError::TimedOut(timeout)
    }
}

#[async_trait]
impl<C: JobStatusClient> Poller for JobPoller<C> {
    async fn poll_until_terminal(
        &self,
        job: &JobReference,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, PollError> {
        self.poll_with(job, self.interval, self.timeout, cancel).await
    }
}
