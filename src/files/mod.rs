//! Checksum-verified static artifact serving
//!
//! Every artifact under the static root is paired with a `<name>.sha1`
//! sidecar written by whoever produced the artifact. The sidecar digest is
//! the artifact's ETag; an artifact without one is not servable.
//!
//! Request handling order:
//! 1. Reject any path with a literal `..` segment (400) before touching disk
//! 2. Resolve under the root: missing is 404, a directory is 401
//! 3. Read and trim the sidecar: missing or empty is 404
//! 4. `If-None-Match` equal to the ETag answers 304
//! 5. Otherwise stream the file, honouring a single byte range

pub mod checksum;
pub mod range;
mod server;

pub use checksum::{sidecar_path, ChecksumRecord};
pub use range::{parse_http_date, ByteRange, RangeOutcome};
pub use server::{contains_dot_dot, StaticArtifactServer};
