//! End-to-end runs of the patch tester against the scripted Perforce fake.
//!
//! Each test drives the same sequence the CLI does: prepare the workspace,
//! integrate every requested change, build the report, clean up.

use patchtester_core::errors::RunError;
use patchtester_core::fakes::ScriptedP4;
use patchtester_core::integration::{AutoConfirm, PatchTester, RunSettings};
use patchtester_core::model::{Branch, RequestTree};
use patchtester_core::p4::{ChangeDescription, DescribedFile};
use patchtester_core::report::{summary_counts, Outcome, ReportBuilder, ReportSection};
use patchtester_core::requests::{build_tree, FileRequestSource, RequestSource};

// ===========================================================================
// Helpers
// ===========================================================================

const FROM: &str = "//depot/streams/dev";

fn settings() -> RunSettings {
    RunSettings {
        client: "builder-ws".into(),
        from_prefix: FROM.into(),
        excluded_components: vec!["testSpecs".into(), "SCons".into(), "buildMap".into()],
        description_lines: 4,
    }
}

fn branch(version: &str) -> Branch {
    Branch {
        name: version.into(),
        release_name: format!("Version {}", version),
        prefix: format!("//depot/streams/v{}", version),
    }
}

fn change(id: &str, files: &[&str]) -> ChangeDescription {
    ChangeDescription {
        change: id.into(),
        desc: format!("change {}\n", id),
        status: "submitted".into(),
        user: "dev".into(),
        path: None,
        files: files
            .iter()
            .map(|f| DescribedFile {
                depot_file: format!("{}/{}", FROM, f),
                rev: 2,
                action: "edit".into(),
            })
            .collect(),
    }
}

fn integrated_changes(p4: &ScriptedP4) -> Vec<String> {
    p4.calls()
        .iter()
        .filter_map(|c| c.strip_prefix("integ -c "))
        .filter_map(|c| c.split('@').nth(1))
        .filter_map(|r| r.split(',').next())
        .map(String::from)
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_changes_processed_in_ascending_order() {
    let p4 = ScriptedP4::new();
    for id in ["10", "20", "30"] {
        p4.add_change(change(id, &["libA/x.c"]));
    }
    let confirm = AutoConfirm(true);
    let mut tree = RequestTree::local(["30", "10", "20"]);
    let mut tester = PatchTester::new(&p4, &confirm, settings(), tree.requested_changes());

    tester.prepare_for_integration(&branch("1.0")).await.unwrap();
    tester.run_integrations(&mut tree, &branch("1.0")).await;

    assert_eq!(integrated_changes(&p4), vec!["10", "20", "30"]);
}

#[tokio::test]
async fn test_report_has_one_record_per_leaf() {
    let p4 = ScriptedP4::new();
    p4.add_change(change("100", &["libA/x.c"]));
    p4.add_change(change("110", &["libA/x.c", "libB/y.c"]));
    p4.fail_on("describe 120", "120 - no such changelist.");
    let confirm = AutoConfirm(true);
    let mut tree = RequestTree::from_pairs(vec![
        ("PRQ-1", "100"),
        ("PRQ-1", "110"),
        ("PRQ-2", "0"),
        ("PRQ-3", "120"),
        ("PRQ-4", "0"),
    ]);
    let mut tester = PatchTester::new(&p4, &confirm, settings(), tree.requested_changes());
    tester.run_integrations(&mut tree, &branch("1.0")).await;

    let reports = ReportBuilder::build(&tree);
    let records: Vec<_> = reports.iter().flat_map(|r| r.changes.iter()).collect();
    assert_eq!(records.len(), tree.leaf_count());

    let results: Vec<Outcome> = records.iter().map(|r| r.result).collect();
    assert_eq!(
        results,
        vec![Outcome::Success, Outcome::Warning, Outcome::Failed, Outcome::Failed, Outcome::Failed]
    );
    assert_eq!(
        summary_counts(&reports),
        patchtester_core::report::SummaryCounts { success: 1, warning: 1, failed: 3 }
    );
}

#[tokio::test]
async fn test_multi_branch_run_chains_local_changes() {
    let p4 = ScriptedP4::new();
    p4.add_change(change("100", &["libA/x.c"]));
    p4.add_change(change("200", &["libA/y.c"]));
    let confirm = AutoConfirm(true);
    let mut tree = RequestTree::local(["200", "100"]);
    let mut tester = PatchTester::new(&p4, &confirm, settings(), tree.requested_changes());

    let mut sections = Vec::new();
    for target in [branch("1.0"), branch("2.0")] {
        tester.prepare_for_integration(&target).await.unwrap();
        tester.run_integrations(&mut tree, &target).await;
        sections.push(ReportSection::new(FROM, &target.prefix, &tree));
    }

    assert_eq!(tester.created_changelists(), ["1000", "1001", "1002", "1003"]);
    assert_eq!(tester.requested(), ["1002", "1003"]);
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[1].subject, "from //depot/streams/dev to //depot/streams/v2.0");
    for section in &sections {
        assert!(section
            .requests
            .iter()
            .flat_map(|r| r.changes.iter())
            .all(|c| c.result == Outcome::Success));
    }

    tester.cleanup(false).await.unwrap();
    let calls = p4.calls();
    for id in ["1000", "1001", "1002", "1003"] {
        assert!(calls.contains(&format!("change -d {}", id)));
    }
    assert!(tester.created_changelists().is_empty());
}

#[tokio::test]
async fn test_dirty_cleanup_keeps_changelists() {
    let p4 = ScriptedP4::new();
    p4.add_change(change("100", &["libA/x.c"]));
    let accept = AutoConfirm(true);
    let mut tree = RequestTree::local(["100"]);
    let mut tester = PatchTester::new(&p4, &accept, settings(), tree.requested_changes());
    tester.run_integrations(&mut tree, &branch("1.0")).await;
    assert_eq!(tester.created_changelists(), ["1000"]);

    tester.cleanup(true).await.unwrap();
    assert!(!p4.calls().iter().any(|c| c.starts_with("change -d")));
    assert_eq!(tester.created_changelists(), ["1000"]);
}

#[tokio::test]
async fn test_declined_cleanup_keeps_changelists() {
    let p4 = ScriptedP4::new();
    p4.add_change(change("100", &["libA/x.c"]));
    let decline = AutoConfirm(false);
    let mut tree = RequestTree::local(["100"]);
    let mut tester = PatchTester::new(&p4, &decline, settings(), tree.requested_changes());
    tester.run_integrations(&mut tree, &branch("1.0")).await;

    let err = tester.cleanup(false).await.unwrap_err();
    assert!(matches!(err, RunError::Declined(_)));
    let calls = p4.calls();
    assert!(!calls.iter().any(|c| c.starts_with("change -d") || c.starts_with("revert")));
    assert_eq!(tester.created_changelists(), ["1000"]);
}

#[tokio::test]
async fn test_requests_from_ticket_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.toml");
    std::fs::write(
        &path,
        r#"
[[request]]
id = "PRQ-7"
release = "Version 1.0"
status = "accepted"
changes = ["300"]

[[request]]
id = "PRQ-8"
release = "Version 1.0"
status = "accepted"
changes = []
"#,
    )
    .unwrap();

    let source = FileRequestSource::load(&path).unwrap();
    let requests = source.accepted("Version 1.0").unwrap();
    let mut tree = build_tree(&requests);

    let p4 = ScriptedP4::new();
    p4.add_change(change("300", &["libA/x.c", "testSpecs/x.spec"]));
    let confirm = AutoConfirm(true);
    let mut tester = PatchTester::new(&p4, &confirm, settings(), tree.requested_changes());
    tester.run_integrations(&mut tree, &branch("1.0")).await;

    let reports = ReportBuilder::build(&tree);
    assert_eq!(reports[0].changes[0].result, Outcome::Success);
    assert_eq!(reports[1].changes[0].result, Outcome::Failed);
    assert!(reports[1].changes[0].details.contains("No changelist available."));
}
