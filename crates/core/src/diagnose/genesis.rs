//! Genesis of a held file revision: how the target branch came to have it.
//!
//! The held revision is usually inherited from another branch through an
//! integration record. When it is a purely local edit there is no such
//! record, and the history is walked backward one revision at a time until
//! one with ancestry is found. The walk never takes more steps than the held
//! revision number.

use tracing::debug;

use crate::errors::P4Error;
use crate::p4::{FileRevision, Integration, P4Backend, RevRange};

/// Why the genesis of a revision could not be established.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("the file is not held by the client")]
    NotHeld,

    #[error("no history reported for revision #{0}")]
    NoHistory(u32),

    #[error("no revision with integration history found")]
    Exhausted,

    #[error("{}", .0.detail())]
    Backend(#[from] P4Error),
}

/// The revision whose integration record explains the held content, plus
/// the local edits made on top of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub revision: FileRevision,
    /// Change ids of local edits passed on the way back, newest first.
    pub local_edits: Vec<String>,
}

/// Walk back from `have` to the first revision with ancestry linkage.
pub async fn trace<B: P4Backend + ?Sized>(
    backend: &B,
    file: &str,
    have: u32,
) -> Result<Trace, TraceError> {
    if have == 0 {
        return Err(TraceError::NotHeld);
    }

    let mut local_edits: Vec<String> = Vec::new();
    let mut rev = have;
    for _ in 0..have {
        let revision = backend
            .filelog(file, RevRange::single(rev), true)
            .await?
            .into_iter()
            .next()
            .and_then(|log| log.revisions.into_iter().next())
            .ok_or(TraceError::NoHistory(rev))?;

        if revision.has_ancestry() {
            debug!(file, rev, change = %revision.change, edits = local_edits.len(), "genesis found");
            return Ok(Trace { revision, local_edits });
        }

        debug!(file, rev, change = %revision.change, "local edit, walking back");
        if !local_edits.contains(&revision.change) {
            local_edits.push(revision.change.clone());
        }
        if rev <= 1 {
            break;
        }
        rev -= 1;
    }
    Err(TraceError::Exhausted)
}

/// How the held revision was acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    CopyFrom,
    MergeFrom,
    BranchFrom,
    Unknown(String),
}

impl Mechanism {
    pub fn parse(how: &str) -> Self {
        match how.trim() {
            "copy from" => Self::CopyFrom,
            "merge from" => Self::MergeFrom,
            "branch from" => Self::BranchFrom,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// The integration record to explain: the one whose source is the base file
/// of the resolve, falling back to the last record.
pub fn pick_integration<'r>(revision: &'r FileRevision, base_file: &str) -> Option<&'r Integration> {
    revision
        .integrations
        .iter()
        .find(|i| i.file == base_file)
        .or_else(|| revision.integrations.last())
}

/// Revisions between the held and wanted revision that the target is missing.
/// Stops at the first change already explained by the genesis.
pub fn missing_revisions<'r>(revisions: &'r [FileRevision], mentioned: &[String]) -> Vec<&'r FileRevision> {
    revisions
        .iter()
        .take_while(|r| !mentioned.contains(&r.change))
        .collect()
}
