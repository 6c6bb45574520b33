//! Artifact Gateway Library
//!
//! Serves immutable artifacts with checksum ETags and relays uploads to a
//! backend that completes them asynchronously. The server binary is in
//! main.rs.
//!
//! # Modules
//!
//! - `files`: checksum-verified static serving with conditional GET
//! - `backend`: upload relay and job poller over the shared HTTP client
//! - `upload`: end-to-end upload orchestration
//! - `routes`: axum routers exposing the above

pub mod backend;
pub mod config;
pub mod error;
pub mod files;
pub mod routes;
pub mod state;
pub mod upload;
