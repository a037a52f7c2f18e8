//! Per-change integration pass.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use super::components::is_cross_component;
use super::resolve::{interpret, ResolveVerdict};
use super::{Confirmer, PatchTester};
use crate::diagnose::{Diagnosis, Diagnostician};
use crate::model::{Branch, ChangeNode, NodeId, RequestTree, SENTINEL_CHANGE};
use crate::p4::{parse_change_created, ChangeDescription, CommandOutcome, NoOp, P4Backend};

pub const MISSING_CHANGE_LABEL: &str = "Pending patch or missing Requested Changelists: field";
pub const MISSING_CHANGE_TEXT: &str = "No changelist available.";
pub const MISSING_CHANGE_SUGGESTION: &str = "The request does not list any changelist yet. \
Either the patch is still pending or the Requested Changelists: field \
was left empty. Add the changelists to the request and run again.";

pub const DESCRIBE_ERROR: &str = "p4 describe integrate error";
pub const CREATE_CHANGE_ERROR: &str = "create new change error";
pub const INTEGRATE_WARNING: &str = "p4 integration warning";
pub const INTEGRATE_ERROR: &str = "p4 integrate error";
pub const RESOLVE_ERROR: &str = "p4 resolve error";
pub const RESOLUTION_CONFLICT: &str = "Resolution Conflict";
pub const CROSS_COMPONENT: &str = "Cross Component Checkin";

pub const COPY_IN_FAILED: &str = "Failed to copy in files to new changelist";
const COPY_IN_TEXT: &str =
    "A file integration failed. Multiple requests contained different revisions of the same file.";
const COPY_IN_SUGGESTION: &str = "This warning indicates that the same file was requested in \
multiple changelists. Changes are integrated but never submitted, so only the first requested \
revision of a file can be integrated. The other requested changes to that file are not really \
being tested.";

impl<'a, B: P4Backend + ?Sized, C: Confirmer + ?Sized> PatchTester<'a, B, C> {
    /// Integrate every requested change into `target`, in ascending order,
    /// recording the outcome on the matching tree nodes.
    ///
    /// No single change can abort the pass. After the pass the requested
    /// list holds the local changelists, ready for the next target branch.
    #[instrument(skip(self, tree, target), fields(target = %target.prefix))]
    pub async fn run_integrations(&mut self, tree: &mut RequestTree, target: &Branch) {
        let requested = self.requested.clone();
        let mut integrated: HashSet<String> = HashSet::new();

        for (position, value) in requested.iter().enumerate() {
            if value == SENTINEL_CHANGE {
                self.flag_sentinels(tree);
                continue;
            }

            let Some((id, canonical)) = locate(tree, value) else {
                warn!(change = %value, "no request node for change");
                continue;
            };
            if !integrated.insert(canonical.clone()) {
                debug!(change = %canonical, "change already integrated in this pass");
                continue;
            }

            let local = self.integrate_node(tree, id, &canonical, target).await;
            mirror_duplicates(tree, id, &canonical);
            if let Some(local) = local {
                self.requested[position] = local;
            }
        }
    }

    /// Flag every sentinel node not seen yet in this run.
    fn flag_sentinels(&mut self, tree: &mut RequestTree) {
        for id in tree.find_all_by_requested(SENTINEL_CHANGE) {
            if !self.visited_sentinels.insert(id) {
                continue;
            }
            if let Some(node) = tree.get_mut(id) {
                node.reset_outcome();
                node.record_error(MISSING_CHANGE_LABEL, MISSING_CHANGE_TEXT);
                node.record_suggestion(MISSING_CHANGE_LABEL, MISSING_CHANGE_SUGGESTION);
            }
        }
    }

    /// Process one node. Returns the local changelist created for it, if any.
    async fn integrate_node(
        &mut self,
        tree: &mut RequestTree,
        id: NodeId,
        change: &str,
        target: &Branch,
    ) -> Option<String> {
        let request = tree.request_id(id).unwrap_or_default().to_string();
        let node = tree.get_mut(id)?;
        node.reset_outcome();
        info!(%change, %request, "processing change");

        let description = match self.backend.describe(change).await {
            Ok(description) => description,
            Err(e) => {
                node.record_error(DESCRIBE_ERROR, e.detail());
                debug!(%change, error = %e, "describe failed");
                return None;
            }
        };
        let original_desc = description.desc.clone();
        node.change_description = Some(description);

        let text = format!(
            "patchTester: test integrate for {} original desc: {}",
            change, original_desc
        );
        let local = match self.backend.create_change(&text).await {
            Ok(ack) => match parse_change_created(&ack) {
                Ok(local) => local,
                Err(e) => {
                    node.record_error(CREATE_CHANGE_ERROR, ack);
                    debug!(%change, error = %e, "changelist not created");
                    return None;
                }
            },
            Err(e) => {
                node.record_error(CREATE_CHANGE_ERROR, e.detail());
                return None;
            }
        };
        node.change = Some(local.clone());
        self.created_changelists.push(local.clone());
        info!(%change, %local, "integrating change as local change");

        let source = format!("{}/...@{},{}", self.settings.from_prefix, change, change);
        let destination = format!("{}/...", target.prefix);
        match self.backend.integrate(&local, &source, &destination).await {
            Ok(lines) if lines.is_empty() => {}
            Ok(lines) => {
                let text = lines.join("\n");
                info!(%change, "integration returned warnings");
                node.record_warning(INTEGRATE_WARNING, text);
            }
            Err(e) => {
                let text = e.detail();
                info!(%change, error = %text, "integration failed");
                let diagnosis = Diagnosis::from_integrate_failure(&text);
                let suggestion = self.suggest(&diagnosis, node, target).await;
                node.record_error(INTEGRATE_ERROR, text);
                node.record_suggestion(INTEGRATE_ERROR, suggestion);
                return Some(local);
            }
        }

        let pending = match self.backend.describe(&local).await {
            Ok(pending) => pending,
            Err(e) => {
                node.record_error(DESCRIBE_ERROR, e.detail());
                return Some(local);
            }
        };
        if pending.files.is_empty() {
            node.record_warning(COPY_IN_FAILED, COPY_IN_TEXT);
            node.record_suggestion(COPY_IN_FAILED, COPY_IN_SUGGESTION);
            return Some(local);
        }

        let conflicted = self.resolve_files(node, &pending, target).await;

        if !conflicted {
            self.check_components(node);
        }
        Some(local)
    }

    /// Verify, sync and resolve each file of the local changelist in order.
    /// Returns `true` once a resolution conflict was recorded.
    async fn resolve_files(
        &self,
        node: &mut ChangeNode,
        pending: &ChangeDescription,
        target: &Branch,
    ) -> bool {
        for (idx, file) in pending.files.iter().enumerate() {
            if file.rev == 1 && file.action.contains("branch") {
                debug!(file = %file.depot_file, "branched at rev 1, nothing to resolve");
                continue;
            }
            let path = file.depot_file.as_str();

            if let Err(e) = self.backend.verify(path).await {
                info!(file = path, error = %e, "verify error");
            } else if let Err(e) = self.backend.sync_file(path).await {
                info!(file = path, error = %e, "sync error");
            }

            node.resolve_result = None;
            match self.backend.resolve(path).await {
                CommandOutcome::Success(output) => node.resolve_result = Some(output),
                CommandOutcome::BenignNoOp(NoOp::NothingToResolve) => {
                    debug!(file = path, "no file(s) to resolve");
                    continue;
                }
                CommandOutcome::BenignNoOp(other) => {
                    debug!(file = path, %other, "resolve reported no-op");
                    continue;
                }
                CommandOutcome::Failure(e) => {
                    info!(file = path, error = %e, "error resolving files");
                    node.record_error(RESOLVE_ERROR, e.detail());
                    continue;
                }
            }

            let verdict = match node.resolve_result.as_ref() {
                Some(output) if !output.is_empty() => {
                    debug!(file = path, summary = %output.summary(), "resolve result");
                    interpret(output)
                }
                _ => {
                    node.record_error(format!("Error resolving {}", path), "Failed to resolve");
                    continue;
                }
            };

            if let ResolveVerdict::Conflicts(count) = verdict {
                info!(file = path, count, "resolution conflict");
                let index = self.original_index(node, path, target).unwrap_or(idx);
                let diagnosis = Diagnosis::ResolutionConflict { file: path.to_string(), index };
                let suggestion = self.suggest(&diagnosis, node, target).await;
                node.record_error(
                    RESOLUTION_CONFLICT,
                    format!("{} conflicts reported for file {}", count, path),
                );
                node.record_suggestion(RESOLUTION_CONFLICT, suggestion);
                return true;
            }
        }
        false
    }

    /// Flag changes whose original files span more than one component.
    fn check_components(&self, node: &mut ChangeNode) {
        let Some(description) = node.change_description.as_ref() else {
            return;
        };
        let settings = &self.settings;
        if !is_cross_component(
            description.depot_files(),
            &settings.from_prefix,
            &settings.excluded_components,
        ) {
            return;
        }
        let files = description.depot_files().collect::<Vec<_>>().join("\n");
        node.cross_component = true;
        node.record_error(
            CROSS_COMPONENT,
            "Successfully integrated and resolved but \nthis changelist contains files from multiple components.",
        );
        node.record_suggestion(
            CROSS_COMPONENT,
            format!("This is a warning. \nThese are the files in this changelist\n{}", files),
        );
    }

    /// Position in the original change of the source file behind a target file.
    fn original_index(&self, node: &ChangeNode, file: &str, target: &Branch) -> Option<usize> {
        let rest = file.strip_prefix(&target.prefix)?;
        let source = format!("{}{}", self.settings.from_prefix, rest);
        node.change_description
            .as_ref()?
            .files
            .iter()
            .position(|f| f.depot_file == source)
    }

    async fn suggest(&self, diagnosis: &Diagnosis, node: &ChangeNode, target: &Branch) -> String {
        Diagnostician::new(
            self.backend,
            &self.settings.from_prefix,
            target,
            self.settings.description_lines,
        )
        .suggest(diagnosis, node)
        .await
    }
}

/// Find the node for a requested value. A value that is not a requested
/// change may be the local changelist of an earlier pass; it then maps back
/// to that node's canonical change id.
fn locate(tree: &RequestTree, value: &str) -> Option<(NodeId, String)> {
    if let Some(id) = tree.find_by_requested(value) {
        return Some((id, value.to_string()));
    }
    debug!(change = %value, "no node for change, searching by local changelist");
    let id = tree.find_by_local_change(value)?;
    let node = tree.get(id)?;
    let canonical = node
        .change_description
        .as_ref()
        .map(|d| d.change.clone())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| node.requested_change.clone());
    debug!(local = %value, change = %canonical, "remapped local changelist to requested change");
    Some((id, canonical))
}

/// Copy the outcome of `id` onto every other node requesting the same change.
fn mirror_duplicates(tree: &mut RequestTree, id: NodeId, change: &str) {
    let others: Vec<NodeId> = tree
        .find_all_by_requested(change)
        .into_iter()
        .filter(|other| *other != id)
        .collect();
    if others.is_empty() {
        return;
    }
    let Some(source) = tree.get(id).cloned() else {
        return;
    };
    for other in others {
        if let Some(node) = tree.get_mut(other) {
            node.mirror_outcome(&source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedP4;
    use crate::integration::{AutoConfirm, RunSettings};
    use crate::p4::{DescribedFile, ResolveEntry, ResolveOutput, ResolveRecord};

    const FROM: &str = "//depot/streams/dev";

    fn settings() -> RunSettings {
        RunSettings {
            client: "builder-ws".into(),
            from_prefix: FROM.into(),
            excluded_components: vec!["testSpecs".into(), "SCons".into(), "buildMap".into()],
            description_lines: 4,
        }
    }

    fn target() -> Branch {
        Branch {
            name: "1.0".into(),
            release_name: "Version 1.0".into(),
            prefix: "//depot/streams/v1.0".into(),
        }
    }

    fn described(change: &str, files: &[(&str, u32, &str)]) -> ChangeDescription {
        ChangeDescription {
            change: change.into(),
            desc: format!("fix for {}\n", change),
            status: "submitted".into(),
            user: "dev".into(),
            path: None,
            files: files
                .iter()
                .map(|(f, rev, action)| DescribedFile {
                    depot_file: format!("{}/{}", FROM, f),
                    rev: *rev,
                    action: action.to_string(),
                })
                .collect(),
        }
    }

    fn conflicted(base: &str) -> ResolveOutput {
        ResolveOutput {
            entries: vec![
                ResolveEntry::Record(ResolveRecord {
                    base_file: Some(base.into()),
                    ..Default::default()
                }),
                ResolveEntry::Message("Diff chunks: 1 yours + 0 theirs + 0 both + 2 conflicting".into()),
            ],
        }
    }

    #[tokio::test]
    async fn test_clean_integration_is_success() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert!(node.is_success(), "{:?}", node);
        assert_eq!(node.change.as_deref(), Some("1000"));
        assert_eq!(tester.created_changelists(), ["1000"]);
        assert_eq!(tester.requested(), ["1000"]);
        assert!(p4
            .calls()
            .contains(&"integ -c 1000 //depot/streams/dev/...@100,100 //depot/streams/v1.0/...".to_string()));
    }

    #[tokio::test]
    async fn test_describe_failure_is_recorded_not_fatal() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("200", &[("libA/x.c", 2, "edit")]));
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100", "200"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into(), "200".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let first = &tree.requests[0].changes[0];
        assert_eq!(first.errors[0].label, DESCRIBE_ERROR);
        assert!(first.change.is_none());
        assert!(tree.requests[0].changes[1].is_success());
    }

    #[tokio::test]
    async fn test_malformed_acknowledgment() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        p4.push_change_ack("Change form rejected");
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert_eq!(node.errors[0].label, CREATE_CHANGE_ERROR);
        assert!(tester.created_changelists().is_empty());
        assert_eq!(tester.requested(), ["100"]);
    }

    #[tokio::test]
    async fn test_integration_warning_is_kept() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        p4.set_integrate_output("100", vec!["//depot/streams/v1.0/libA/x.c - can't integrate".into()]);
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert!(node.errors.is_empty());
        assert_eq!(node.warnings[0].label, INTEGRATE_WARNING);
    }

    #[tokio::test]
    async fn test_missing_source_file_gets_suggestion() {
        let p4 = ScriptedP4::new();
        let mut description = described("100", &[("libA/x.c", 3, "edit")]);
        description.status = "pending".into();
        p4.add_change(description);
        p4.fail_on("integ -c 1000", "//depot/streams/dev/...@100,100 - no such file(s).");
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert_eq!(node.errors[0].label, INTEGRATE_ERROR);
        assert!(node.suggestions[0].text.contains("Change is pending"));
        assert!(!p4.calls().iter().any(|c| c.starts_with("resolve")));
    }

    #[tokio::test]
    async fn test_copy_in_failure_is_warning() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        p4.skip_copy_in("100");
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert_eq!(node.warnings[0].label, COPY_IN_FAILED);
        assert!(!p4.calls().iter().any(|c| c.starts_with("resolve")));
    }

    #[tokio::test]
    async fn test_branch_at_rev_one_not_resolved() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/new.c", 1, "branch"), ("libA/x.c", 4, "edit")]));
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let resolves: Vec<String> = p4.calls().into_iter().filter(|c| c.starts_with("resolve")).collect();
        assert_eq!(resolves, vec!["resolve //depot/streams/v1.0/libA/x.c"]);
    }

    #[tokio::test]
    async fn test_nothing_to_resolve_is_benign() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        p4.fail_on("resolve", "//ws/libA/x.c - no file(s) to resolve.");
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;
        assert!(tree.requests[0].changes[0].is_success());
    }

    #[tokio::test]
    async fn test_resolution_conflict_stops_scanning() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit"), ("libA/y.c", 2, "edit")]));
        p4.set_resolve(
            "//depot/streams/v1.0/libA/x.c",
            conflicted("//depot/streams/dev/libA/x.c"),
        );
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert_eq!(node.errors[0].label, RESOLUTION_CONFLICT);
        assert!(node.errors[0].text.starts_with("2 conflicts reported for file"));
        assert_eq!(node.suggestions.len(), 1);
        assert!(!p4.calls().contains(&"resolve //depot/streams/v1.0/libA/y.c".to_string()));
        assert!(!node.cross_component);
    }

    #[tokio::test]
    async fn test_verify_failure_is_logged_only() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        p4.fail_on("verify //depot/streams/v1.0/libA/x.c", "x.c - BAD checksum");
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let calls = p4.calls();
        assert!(!calls.contains(&"sync -q //depot/streams/v1.0/libA/x.c".to_string()));
        assert!(calls.contains(&"resolve //depot/streams/v1.0/libA/x.c".to_string()));
        assert!(tree.requests[0].changes[0].is_success());
    }

    #[tokio::test]
    async fn test_sync_failure_is_logged_only() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        p4.fail_on("sync -q //depot/streams/v1.0/libA/x.c", "x.c - file(s) not in client view.");
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        assert!(p4.calls().contains(&"resolve //depot/streams/v1.0/libA/x.c".to_string()));
        assert!(tree.requests[0].changes[0].is_success());
    }

    #[tokio::test]
    async fn test_resolve_failure_recorded_and_scan_continues() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit"), ("libA/y.c", 2, "edit")]));
        p4.fail_on("resolve //depot/streams/v1.0/libA/x.c", "resolve boom");
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert_eq!(node.errors.len(), 1);
        assert_eq!(node.errors[0].label, RESOLVE_ERROR);
        assert_eq!(node.errors[0].text, "resolve boom");

        let calls = p4.calls();
        for call in [
            "verify //depot/streams/v1.0/libA/y.c",
            "sync -q //depot/streams/v1.0/libA/y.c",
            "resolve //depot/streams/v1.0/libA/y.c",
        ] {
            assert!(calls.contains(&call.to_string()), "missing {}", call);
        }
    }

    #[tokio::test]
    async fn test_empty_resolve_output_is_error() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        p4.set_resolve("//depot/streams/v1.0/libA/x.c", ResolveOutput::default());
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert_eq!(node.errors[0].label, "Error resolving //depot/streams/v1.0/libA/x.c");
        assert_eq!(node.errors[0].text, "Failed to resolve");
        assert!(node.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_cross_component_flagged() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit"), ("libB/y.c", 2, "edit")]));
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let node = &tree.requests[0].changes[0];
        assert!(node.cross_component);
        assert_eq!(node.errors[0].label, CROSS_COMPONENT);
        assert!(node.suggestions[0].text.contains("//depot/streams/dev/libB/y.c"));
    }

    #[tokio::test]
    async fn test_sentinels_flagged_once() {
        let p4 = ScriptedP4::new();
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::from_pairs(vec![("PRQ-1", "0"), ("PRQ-2", "0")]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), tree.requested_changes());
        tester.run_integrations(&mut tree, &target()).await;
        tester.run_integrations(&mut tree, &target()).await;

        for request in &tree.requests {
            assert_eq!(request.changes[0].errors.len(), 1);
            assert_eq!(request.changes[0].errors[0].label, MISSING_CHANGE_LABEL);
        }
        assert!(p4.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shared_change_integrated_once() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::from_pairs(vec![("PRQ-1", "100"), ("PRQ-2", "100")]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), tree.requested_changes());
        tester.run_integrations(&mut tree, &target()).await;

        assert_eq!(tester.created_changelists().len(), 1);
        assert_eq!(tree.requests[1].changes[0].change.as_deref(), Some("1000"));
        assert!(tree.requests[1].changes[0].is_success());
    }

    #[tokio::test]
    async fn test_second_pass_remaps_local_change() {
        let p4 = ScriptedP4::new();
        p4.add_change(described("100", &[("libA/x.c", 3, "edit")]));
        let confirm = AutoConfirm(true);
        let mut tree = RequestTree::local(["100"]);
        let mut tester = PatchTester::new(&p4, &confirm, settings(), vec!["100".into()]);
        tester.run_integrations(&mut tree, &target()).await;

        let next = Branch {
            name: "2.0".into(),
            release_name: "Version 2.0".into(),
            prefix: "//depot/streams/v2.0".into(),
        };
        tester.run_integrations(&mut tree, &next).await;

        let node = &tree.requests[0].changes[0];
        assert_eq!(node.change.as_deref(), Some("1001"));
        assert_eq!(tester.created_changelists(), ["1000", "1001"]);
        assert!(p4
            .calls()
            .contains(&"integ -c 1001 //depot/streams/dev/...@100,100 //depot/streams/v2.0/...".to_string()));
    }
}
