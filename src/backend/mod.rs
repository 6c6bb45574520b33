//! Upload backend client
//!
//! Two collaborators share one pooled `reqwest::Client`:
//! - `Relay` forwards an upload and reports the immediate answer plus any job location
//! - `JobPoller` follows that job until it is finished, failed, or out of time
//!
//! Both sit behind traits (`Uploader`, `Poller`) so the upload handler can be
//! exercised against hand-written doubles.

pub mod client;
pub mod poller;
pub mod relay;
pub mod types;

pub use client::{build_client, Credentials};
pub use poller::{HttpJobStatusClient, JobPoller, JobStatusClient, PollError, Poller, QueryError};
pub use relay::{Relay, RelayError, Uploader};
pub use types::*;
