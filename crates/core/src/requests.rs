//! Patch-request source: the ticket system's view of what to integrate.
//!
//! [`FileRequestSource`] reads a TOML export of tickets:
//!
//! ```toml
//! [[request]]
//! id = "PRQ-101"
//! release = "Version 1.0"
//! status = "accepted"
//! changes = ["12345", "23456"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::RequestError;
use crate::model::{RequestTree, SENTINEL_CHANGE};

/// One patch request and the source changes it asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRequest {
    pub id: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default)]
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
}

/// Lookup of patch requests by id or by release.
pub trait RequestSource {
    fn request(&self, id: &str) -> Result<PatchRequest, RequestError>;

    fn pending(&self, release_name: &str) -> Result<Vec<PatchRequest>, RequestError>;

    fn accepted(&self, release_name: &str) -> Result<Vec<PatchRequest>, RequestError>;
}

/// Turn patch requests into `(request-id, change-id)` pairs. A request with no
/// changes depends on work not done yet and yields the sentinel change.
pub fn request_pairs(requests: &[PatchRequest]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for request in requests {
        if request.changes.is_empty() {
            debug!(request = %request.id, "request has no changes, using sentinel");
            pairs.push((request.id.clone(), SENTINEL_CHANGE.to_string()));
            continue;
        }
        for change in &request.changes {
            pairs.push((request.id.clone(), change.trim().to_string()));
        }
    }
    pairs
}

/// Build the request tree for a set of patch requests.
pub fn build_tree(requests: &[PatchRequest]) -> RequestTree {
    RequestTree::from_pairs(request_pairs(requests))
}

// ---------------------------------------------------------------------------
// File-backed source
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RequestFile {
    #[serde(default)]
    request: Vec<PatchRequest>,
}

/// Request source backed by a TOML ticket export.
#[derive(Debug, Clone)]
pub struct FileRequestSource {
    path: PathBuf,
    requests: Vec<PatchRequest>,
}

impl FileRequestSource {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RequestError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| RequestError::SourceError {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let file: RequestFile = toml::from_str(&contents).map_err(|e| RequestError::SourceError {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        info!(path = %path.display(), count = file.request.len(), "loaded patch requests");
        Ok(Self { path: path.to_path_buf(), requests: file.request })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn by_status(&self, release_name: &str, status: RequestStatus) -> Vec<PatchRequest> {
        self.requests
            .iter()
            .filter(|r| r.release == release_name && r.status == status)
            .cloned()
            .collect()
    }
}

impl RequestSource for FileRequestSource {
    fn request(&self, id: &str) -> Result<PatchRequest, RequestError> {
        self.requests
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| {
                warn!(id, "patch request not found");
                RequestError::NotFound(id.to_string())
            })
    }

    fn pending(&self, release_name: &str) -> Result<Vec<PatchRequest>, RequestError> {
        Ok(self.by_status(release_name, RequestStatus::Pending))
    }

    fn accepted(&self, release_name: &str) -> Result<Vec<PatchRequest>, RequestError> {
        Ok(self.by_status(release_name, RequestStatus::Accepted))
    }
}
