//! Conflict diagnostician.
//!
//! Failures are classified into a [`Diagnosis`] once, where they are
//! captured. The [`Diagnostician`] turns a diagnosis into guidance text for
//! the release engineer; for resolution conflicts it reconstructs how the
//! target got its revision and estimates which source changes are missing.

pub mod genesis;

use std::fmt::Write as _;

use tracing::{debug, instrument};

use crate::model::{Branch, ChangeNode};
use crate::p4::{parse_rev, P4Backend, RevRange};
use genesis::{missing_revisions, pick_integration, Mechanism, TraceError};

/// Prefix of every suggestion that could not be worked out automatically.
pub const MANUAL_INSPECTION: &str = "Please have a look at this change";

/// The classified reason a change needs a suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// The integration found no source file for the requested range.
    MissingSourceFile,
    /// Resolving `file` left conflicting chunks. `index` is the position of
    /// the file in the original change's file list.
    ResolutionConflict { file: String, index: usize },
    Unrecognised,
}

impl Diagnosis {
    /// Classify the backend text of a failed integration.
    pub fn from_integrate_failure(text: &str) -> Self {
        if text.contains("no such file") {
            Self::MissingSourceFile
        } else {
            Self::Unrecognised
        }
    }
}

/// Produces guidance text for diagnosed changes.
pub struct Diagnostician<'a, B: P4Backend + ?Sized> {
    backend: &'a B,
    from_prefix: &'a str,
    target: &'a Branch,
    description_lines: usize,
}

impl<'a, B: P4Backend + ?Sized> Diagnostician<'a, B> {
    pub fn new(backend: &'a B, from_prefix: &'a str, target: &'a Branch, description_lines: usize) -> Self {
        Self { backend, from_prefix, target, description_lines }
    }

    /// Guidance for `diagnosis` on `node`. Never fails: anything that cannot
    /// be worked out degrades to a request for manual inspection.
    pub async fn suggest(&self, diagnosis: &Diagnosis, node: &ChangeNode) -> String {
        let mut suggestion = separator();
        match diagnosis {
            Diagnosis::MissingSourceFile => suggestion.push_str(&self.missing_source_file(node)),
            Diagnosis::ResolutionConflict { file, index } => {
                match self.resolution_conflict(node, file, *index).await {
                    Ok(text) => suggestion.push_str(&text),
                    Err(e) => {
                        debug!(file = %file, error = %e, "could not work out missing changes");
                        return manual_inspection(&e.to_string());
                    }
                }
            }
            Diagnosis::Unrecognised => {}
        }
        suggestion
    }

    fn missing_source_file(&self, node: &ChangeNode) -> String {
        let Some(description) = node.change_description.as_ref() else {
            return String::new();
        };
        if description.is_pending() {
            return "Change is pending\n\n\
                    Requested change is currently pending. Please copy locally or submit it"
                .to_string();
        }
        match description.path.as_deref() {
            Some(path) => format!(
                "Verify the branch of the requested change\n\n\
                 Requested change is currently at : {}\nWe need it to be in this branch: {}\n",
                path, self.from_prefix
            ),
            None => String::new(),
        }
    }

    #[instrument(skip(self, node))]
    async fn resolution_conflict(&self, node: &ChangeNode, file: &str, index: usize) -> Result<String, TraceError> {
        let have = self.backend.have(file).await?;
        let want = node
            .change_description
            .as_ref()
            .and_then(|d| d.files.get(index))
            .map(|f| f.rev)
            .ok_or(TraceError::Exhausted)?;
        let resolved = node.resolve_result.as_ref();
        let base_file = resolved.and_then(|r| r.base_file()).unwrap_or(file).to_string();
        let client_file = resolved.and_then(|r| r.client_file()).unwrap_or(file).to_string();

        let trace = genesis::trace(self.backend, file, have).await?;
        let revision = &trace.revision;
        let integration = pick_integration(revision, &base_file).ok_or(TraceError::Exhausted)?;

        // Changes already explained by the genesis narrative.
        let mut mentioned = trace.local_edits.clone();
        mentioned.push(revision.change.clone());

        let mut compare_rev = have;
        let narrative = match Mechanism::parse(&integration.how) {
            Mechanism::CopyFrom => format!(
                "Acquired via: {} in change {} as a copy from {}#{} accepting theirs\n",
                revision.action, revision.change, base_file, want
            ),
            Mechanism::MergeFrom => format!(
                "Acquired via: {} in change {} merge from {}#{} accepting merge\n",
                revision.action, revision.change, base_file, want
            ),
            Mechanism::BranchFrom => {
                if trace.local_edits.is_empty() {
                    String::new()
                } else {
                    compare_rev = parse_rev(&integration.erev);
                    self.branch_narrative(compare_rev, &revision.change, &trace.local_edits).await
                }
            }
            Mechanism::Unknown(how) => format!(
                "Unknown genesis for {}\n\n{}\n\
                 See the p4 integrated command reference for this integration mechanism.\n",
                file, how
            ),
        };

        let mut out = format!(
            "File with conflict: {}\nRequested {} revision: {}\nCurrent {} revision: {}\n{}\n",
            file,
            short_name(self.from_prefix),
            want,
            self.target.name,
            have,
            narrative
        );

        if compare_rev > want {
            let _ = write!(
                out,
                "Target already holds a newer revision\nWe already have revision {} in {}",
                want, self.target.name
            );
        } else if want - compare_rev <= 1 {
            let _ = write!(
                out,
                "No missing intervening changes\n\
                 There do not appear to be missing intervening revisions needed to properly \
                 resolve this file. Perhaps the following diff command can help:\n\
                 \"p4 diff2 {} {}#{}\"\n",
                client_file, base_file, want
            );
        } else {
            let range = RevRange { from: compare_rev + 1, to: want };
            let history = self.backend.filelog(&base_file, range, false).await?;
            let revisions = history.into_iter().next().map(|l| l.revisions).unwrap_or_default();
            let missing = missing_revisions(&revisions, &mentioned);
            let _ = writeln!(
                out,
                "These are {} missing intervening changes that might help in resolving this conflict:",
                missing.len()
            );
            for r in missing {
                let _ = writeln!(out, " revision {} change: {} user: {}", r.rev, r.change, r.user);
            }
        }
        out.push_str("\n\n");
        Ok(out)
    }

    /// Narrative for a branched file with local edits on top.
    async fn branch_narrative(&self, branched_rev: u32, change: &str, edits: &[String]) -> String {
        let mut out = format!(
            "Branched from {} at revision: {} in change {}\nEdits in {} since branching: {}\n",
            short_name(self.from_prefix),
            branched_rev,
            change,
            self.target.name,
            edits.len()
        );
        for edit in edits {
            let _ = writeln!(out, "  - Change: {}", edit);
            match self.backend.describe(edit).await {
                Ok(description) => {
                    let lines: Vec<&str> = description.desc.lines().take(self.description_lines).collect();
                    let _ = writeln!(out, "    Description:\n    {}", lines.join("\n    "));
                }
                Err(e) => {
                    debug!(change = %edit, error = %e, "describe of local edit failed");
                    let _ = writeln!(out, "    Description unavailable");
                }
            }
        }
        out
    }
}

fn separator() -> String {
    format!("{}\n", ".".repeat(120))
}

fn manual_inspection(detail: &str) -> String {
    if detail.is_empty() {
        MANUAL_INSPECTION.to_string()
    } else {
        format!("{}\n{}", MANUAL_INSPECTION, detail)
    }
}

/// Last path segment of a branch prefix, e.g. `dev` for `//depot/streams/dev`.
fn short_name(prefix: &str) -> &str {
    prefix.rsplit('/').next().unwrap_or(prefix)
}
