//! Integration orchestrator.
//!
//! The [`PatchTester`] owns the run-scoped state of one patchtester session
//! and drives each integration pass:
//!
//! 1. Prepare the workspace: shelve and revert pending opens, sync the target.
//! 2. Walk the requested changes in ascending numeric order, integrating each
//!    into its own changelist and resolving the affected files.
//! 3. Record errors, warnings and suggestions on the change nodes.
//! 4. At the end of the run, revert and delete every changelist it created.

pub mod components;
pub mod resolve;
mod runner;
mod workspace;

use std::collections::HashSet;

use tracing::info;

use crate::model::{sorted_requested, NodeId};
use crate::p4::P4Backend;

/// Blocking yes/no question put to the operator before destructive steps.
pub trait Confirmer {
    fn ask(&self, prompt: &str) -> bool;
}

/// Answers every question with a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirmer for AutoConfirm {
    fn ask(&self, prompt: &str) -> bool {
        info!(prompt, answer = self.0, "auto-confirm");
        self.0
    }
}

/// Settings that stay fixed for a whole run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Client workspace the integrations happen in.
    pub client: String,
    /// Depot prefix of the source branch.
    pub from_prefix: String,
    /// Components ignored by cross-component detection.
    pub excluded_components: Vec<String>,
    /// Lines of each local edit's description quoted in suggestions.
    pub description_lines: usize,
}

/// One patchtester session over a single client workspace.
pub struct PatchTester<'a, B: P4Backend + ?Sized, C: Confirmer + ?Sized> {
    backend: &'a B,
    confirmer: &'a C,
    settings: RunSettings,
    /// Requested change ids for the next pass, rewritten with local ids after each pass.
    requested: Vec<String>,
    /// Every changelist created by the run, deleted at cleanup.
    created_changelists: Vec<String>,
    visited_sentinels: HashSet<NodeId>,
}

impl<'a, B: P4Backend + ?Sized, C: Confirmer + ?Sized> PatchTester<'a, B, C> {
    pub fn new(backend: &'a B, confirmer: &'a C, settings: RunSettings, requested: Vec<String>) -> Self {
        info!(client = %settings.client, from = %settings.from_prefix, count = requested.len(), "initializing patch tester");
        Self {
            backend,
            confirmer,
            settings,
            requested: sorted_requested(&requested),
            created_changelists: Vec::new(),
            visited_sentinels: HashSet::new(),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// The requested change ids the next pass will process, in order.
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// Changelists created so far and not yet cleaned up.
    pub fn created_changelists(&self) -> &[String] {
        &self.created_changelists
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedP4;

    fn settings() -> RunSettings {
        RunSettings {
            client: "builder-ws".into(),
            from_prefix: "//depot/streams/dev".into(),
            excluded_components: vec!["testSpecs".into()],
            description_lines: 4,
        }
    }

    #[test]
    fn test_requested_is_sorted_numerically() {
        let p4 = ScriptedP4::new();
        let confirm = AutoConfirm(true);
        let tester = PatchTester::new(
            &p4,
            &confirm,
            settings(),
            vec!["30".into(), "10".into(), "20".into()],
        );
        assert_eq!(tester.requested(), ["10", "20", "30"]);
        assert!(tester.created_changelists().is_empty());
    }

    #[test]
    fn test_auto_confirm() {
        assert!(AutoConfirm(true).ask("continue?"));
        assert!(!AutoConfirm(false).ask("continue?"));
    }
}
