//! The version-control backend seam consumed by the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::parser::{ChangeDescription, FileLog, OpenedFile, ResolveOutput};
use crate::errors::P4Error;

/// A backend response that did nothing, but is not a failure either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoOp {
    /// `file(s) up-to-date.`
    UpToDate,
    /// `file(s) not opened`
    NotOpened,
    /// `no file(s) to resolve.`
    NothingToResolve,
}

impl NoOp {
    /// Recognise a benign no-op in backend diagnostic text.
    pub fn recognise(text: &str) -> Option<Self> {
        if text.contains("file(s) up-to-date.") {
            Some(Self::UpToDate)
        } else if text.contains("file(s) not opened") {
            Some(Self::NotOpened)
        } else if text.contains("no file(s) to resolve.") {
            Some(Self::NothingToResolve)
        } else {
            None
        }
    }
}

impl std::fmt::Display for NoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpToDate => write!(f, "file(s) up-to-date"),
            Self::NotOpened => write!(f, "file(s) not opened"),
            Self::NothingToResolve => write!(f, "no file(s) to resolve"),
        }
    }
}

/// Typed result of a backend command whose no-op responses are not failures.
#[derive(Debug)]
pub enum CommandOutcome<T> {
    Success(T),
    BenignNoOp(NoOp),
    Failure(P4Error),
}

impl<T> CommandOutcome<T> {
    /// Classify a raw command result, mapping recognised no-op text.
    pub fn classify(result: Result<T, P4Error>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(P4Error::CommandFailed { exit_code, stderr }) => match NoOp::recognise(&stderr) {
                Some(noop) => Self::BenignNoOp(noop),
                None => Self::Failure(P4Error::CommandFailed { exit_code, stderr }),
            },
            Err(e) => Self::Failure(e),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// Revision range of a `p4 filelog` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevRange {
    pub from: u32,
    pub to: u32,
}

impl RevRange {
    pub fn single(rev: u32) -> Self {
        Self { from: rev, to: rev }
    }

    pub fn spec(&self) -> String {
        format!("#{},#{}", self.from, self.to)
    }
}

/// Commands the integration engine issues against the repository.
///
/// Commands that fail outright return `Err`; commands with benign no-op
/// responses return a [`CommandOutcome`].
#[async_trait]
pub trait P4Backend: Send + Sync {
    async fn client_exists(&self, client: &str) -> Result<bool, P4Error>;

    async fn opened(&self) -> Result<Vec<OpenedFile>, P4Error>;

    /// Create a numbered changelist carrying any default-changelist files.
    /// Returns the raw server acknowledgment.
    async fn create_change(&self, description: &str) -> Result<String, P4Error>;

    async fn delete_change(&self, change: &str) -> Result<(), P4Error>;

    async fn shelve(&self, change: &str) -> Result<(), P4Error>;

    async fn revert_all(&self) -> CommandOutcome<()>;

    async fn sync_path(&self, path: &str) -> CommandOutcome<()>;

    async fn describe(&self, change: &str) -> Result<ChangeDescription, P4Error>;

    /// Integrate `source` into `target` in changelist `change`. Any lines the
    /// server returns without failing are warnings.
    async fn integrate(&self, change: &str, source: &str, target: &str)
        -> Result<Vec<String>, P4Error>;

    async fn verify(&self, file: &str) -> Result<Vec<String>, P4Error>;

    async fn sync_file(&self, file: &str) -> Result<Vec<String>, P4Error>;

    async fn resolve(&self, file: &str) -> CommandOutcome<ResolveOutput>;

    async fn have(&self, file: &str) -> Result<u32, P4Error>;

    /// History of `file` over `range`. With `integrations_only`, only the
    /// content-source integration records are reported.
    async fn filelog(
        &self,
        file: &str,
        range: RevRange,
        integrations_only: bool,
    ) -> Result<Vec<FileLog>, P4Error>;
}
