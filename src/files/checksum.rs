//! Checksum sidecar records

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;

use crate::error::{GatewayError, Result};

/// Sidecar file extension appended to the artifact path
pub const SIDECAR_EXTENSION: &str = "sha1";

/// Hex digest read from an artifact's sidecar file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRecord {
    digest: String,
}

impl ChecksumRecord {
    /// Build a record from raw sidecar contents. Blank contents are not a record.
    pub fn parse(raw: &str) -> Option<Self> {
        let digest = raw.trim();
        if digest.is_empty() {
            return None;
        }
        Some(Self {
            digest: digest.to_string(),
        })
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Quoted digest, as sent in the `ETag` header
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.digest)
    }

    /// Read the sidecar belonging to `artifact`
    pub async fn load(artifact: &Path) -> Result<Self> {
        let path = sidecar_path(artifact);
        let display = file_name(&path);

        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|_| GatewayError::NotFound(format!("File not found: {}", display)))?;

        let metadata = file
            .metadata()
            .await
            .map_err(|e| GatewayError::Internal(format!("Cannot stat file {}: {}", display, e)))?;
        if metadata.is_dir() {
            return Err(GatewayError::Forbidden(
                "Unauthorized to list the directory".to_string(),
            ));
        }

        let mut raw = String::new();
        file.read_to_string(&mut raw)
            .await
            .map_err(|e| GatewayError::Internal(format!("Cannot read sha1 file: {}", e)))?;

        Self::parse(&raw).ok_or_else(|| {
            tracing::warn!(sidecar = %path.display(), "Checksum sidecar is empty");
            GatewayError::NotFound(format!("File not found: {}", display))
        })
    }
}

/// `<artifact>.sha1`, appended to the full file name so `a.tgz` maps to `a.tgz.sha1`
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut raw: OsString = artifact.as_os_str().to_owned();
    raw.push(".");
    raw.push(SIDECAR_EXTENSION);
    PathBuf::from(raw)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
