//! Upload relay with asynchronous job completion
//!
//! Flow:
//! 1. Client streams an artifact to `POST /v1/upload/{kind}/{guid}`
//! 2. The body is forwarded to the backend as a multipart upload
//! 3. A synchronous backend answer is passed straight back
//! 4. An accepted job is polled until finished (201), failed (502) or timed out (504)

pub mod handler;
pub mod types;

pub use handler::UploadHandler;
pub use types::*;
