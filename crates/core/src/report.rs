//! Outcome aggregation and report rendering.
//!
//! [`ReportBuilder::build`] turns a processed request tree into one record
//! per change node. Building only reads the tree, so it can be repeated.

use std::fmt;

use serde::Serialize;

use crate::model::{ChangeNode, Finding, RequestTree};

pub const REPORT_TITLE: &str = "patchTester Report";
pub const SUCCESS_DETAILS: &str = "This change was successfully integrated";

/// Classification of one change node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Warning,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Warning => write!(f, "WARNING"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRecord {
    pub source_change: String,
    pub result: Outcome,
    pub suggestions: Option<String>,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestReport {
    pub request_id: String,
    pub changes: Vec<ReportRecord>,
}

/// The report of one integration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub subject: String,
    pub requests: Vec<RequestReport>,
}

impl ReportSection {
    pub fn new(from_prefix: &str, to_prefix: &str, tree: &RequestTree) -> Self {
        Self { subject: subject(from_prefix, to_prefix), requests: ReportBuilder::build(tree) }
    }
}

/// Result counts for a console summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub success: usize,
    pub warning: usize,
    pub failed: usize,
}

impl SummaryCounts {
    pub fn total(&self) -> usize {
        self.success + self.warning + self.failed
    }
}

pub struct ReportBuilder;

impl ReportBuilder {
    /// One [`RequestReport`] per request, one record per change node, in tree order.
    pub fn build(tree: &RequestTree) -> Vec<RequestReport> {
        tree.requests
            .iter()
            .map(|request| RequestReport {
                request_id: request.id.clone(),
                changes: request.changes.iter().map(Self::record).collect(),
            })
            .collect()
    }

    /// Classify a node. Errors make it FAILED unless it is a cross-component
    /// checkin; warnings alone also make it FAILED.
    pub fn record(node: &ChangeNode) -> ReportRecord {
        let suggestions = (!node.suggestions.is_empty()).then(|| join_findings(&node.suggestions));
        let (result, details) = if !node.errors.is_empty() {
            let result = if node.cross_component { Outcome::Warning } else { Outcome::Failed };
            (result, join_findings(&node.errors))
        } else if !node.warnings.is_empty() {
            (Outcome::Failed, join_findings(&node.warnings))
        } else {
            return ReportRecord {
                source_change: node.requested_change.clone(),
                result: Outcome::Success,
                suggestions: None,
                details: SUCCESS_DETAILS.to_string(),
            };
        };
        ReportRecord { source_change: node.requested_change.clone(), result, suggestions, details }
    }
}

fn join_findings(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| format!("{}: {}", f.label, f.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn subject(from_prefix: &str, to_prefix: &str) -> String {
    format!("from {} to {}", from_prefix, to_prefix)
}

/// Machine-readable form of the report sections.
pub fn to_json(sections: &[ReportSection]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(sections)
}

pub fn summary_counts<'r, I>(reports: I) -> SummaryCounts
where
    I: IntoIterator<Item = &'r RequestReport>,
{
    let mut counts = SummaryCounts::default();
    for record in reports.into_iter().flat_map(|r| r.changes.iter()) {
        match record.result {
            Outcome::Success => counts.success += 1,
            Outcome::Warning => counts.warning += 1,
            Outcome::Failed => counts.failed += 1,
        }
    }
    counts
}

// ---------------------------------------------------------------------------
// HTML rendering
// ---------------------------------------------------------------------------

/// Render a single pass as an HTML email body.
pub fn render_html(subject: &str, reports: &[RequestReport]) -> String {
    render_document(&[ReportSection { subject: subject.to_string(), requests: reports.to_vec() }])
}

/// Render one or more passes as a single HTML document.
pub fn render_document(sections: &[ReportSection]) -> String {
    let mut html = format!(
        "<html><head><title>{title}</title></head><body>\
         <h1>{title}</h1>",
        title = REPORT_TITLE
    );
    for section in sections {
        html.push_str(&render_section(section));
    }
    html.push_str("</body></html>");
    html
}

fn render_section(section: &ReportSection) -> String {
    let mut html = format!("<h2>{}</h2>", html_escape(&section.subject));
    for request in &section.requests {
        html.push_str(&format!(
            "<h3>{}</h3>\
             <table style=\"border-collapse: collapse;\">\
             <tr><th style=\"padding: 4px 12px;\">Change</th>\
                 <th style=\"padding: 4px 12px;\">Result</th>\
                 <th style=\"padding: 4px 12px;\">Details</th>\
                 <th style=\"padding: 4px 12px;\">Suggestions</th></tr>",
            html_escape(&request.request_id)
        ));
        for record in &request.changes {
            html.push_str(&format!(
                "<tr><td style=\"padding: 4px 12px;\">{}</td>\
                 <td style=\"padding: 4px 12px; color: {};\">{}</td>\
                 <td style=\"padding: 4px 12px;\">{}</td>\
                 <td style=\"padding: 4px 12px;\">{}</td></tr>",
                html_escape(&record.source_change),
                outcome_colour(record.result),
                record.result,
                with_breaks(&record.details),
                record.suggestions.as_deref().map(with_breaks).unwrap_or_default(),
            ));
        }
        html.push_str("</table>");
    }
    html
}

fn outcome_colour(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "green",
        Outcome::Warning => "#d4a017",
        Outcome::Failed => "red",
    }
}

fn with_breaks(text: &str) -> String {
    html_escape(text).replace('\n', "<br/>")
}

/// Minimal HTML escaping for backend-provided strings.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> RequestTree {
        let mut tree = RequestTree::from_pairs(vec![
            ("PRQ-1", "10"),
            ("PRQ-1", "20"),
            ("PRQ-2", "30"),
            ("PRQ-2", "40"),
        ]);
        let changes = &mut tree.requests[0].changes;
        changes[1].record_error("Resolution Conflict", "2 conflicts reported for file x.c");
        changes[1].record_suggestion("Resolution Conflict", "look at <x.c>\nthen retry");

        let changes = &mut tree.requests[1].changes;
        changes[0].cross_component = true;
        changes[0].record_error("Cross Component Checkin", "multiple components");
        changes[1].record_warning("p4 integration warning", "can't integrate");
        tree
    }

    #[test]
    fn test_one_record_per_leaf() {
        let tree = tree();
        let reports = ReportBuilder::build(&tree);
        let records: usize = reports.iter().map(|r| r.changes.len()).sum();
        assert_eq!(records, tree.leaf_count());
        assert_eq!(reports[1].request_id, "PRQ-2");
    }

    #[test]
    fn test_classification() {
        let reports = ReportBuilder::build(&tree());
        let success = &reports[0].changes[0];
        assert_eq!(success.result, Outcome::Success);
        assert_eq!(success.details, SUCCESS_DETAILS);
        assert!(success.suggestions.is_none());

        let failed = &reports[0].changes[1];
        assert_eq!(failed.result, Outcome::Failed);
        assert_eq!(failed.details, "Resolution Conflict: 2 conflicts reported for file x.c");
        assert_eq!(
            failed.suggestions.as_deref(),
            Some("Resolution Conflict: look at <x.c>\nthen retry")
        );

        assert_eq!(reports[1].changes[0].result, Outcome::Warning);
        let warned = &reports[1].changes[1];
        assert_eq!(warned.result, Outcome::Failed);
        assert_eq!(warned.details, "p4 integration warning: can't integrate");
    }

    #[test]
    fn test_build_is_idempotent() {
        let tree = tree();
        assert_eq!(ReportBuilder::build(&tree), ReportBuilder::build(&tree));
    }

    #[test]
    fn test_summary_counts() {
        let reports = ReportBuilder::build(&tree());
        let counts = summary_counts(&reports);
        assert_eq!(counts, SummaryCounts { success: 1, warning: 1, failed: 2 });
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_render_html() {
        let reports = ReportBuilder::build(&tree());
        let html = render_html(&subject("//depot/dev", "//depot/v1.0"), &reports);
        assert!(html.contains("<title>patchTester Report</title>"));
        assert!(html.contains("<h2>from //depot/dev to //depot/v1.0</h2>"));
        assert!(html.contains("look at &lt;x.c&gt;<br/>then retry"));
        assert!(html.contains(">FAILED<"));
    }

    #[test]
    fn test_json_uses_upper_case_results() {
        let reports = ReportBuilder::build(&tree());
        let section = ReportSection { subject: "from a to b".into(), requests: reports };
        let json = to_json(&[section]).unwrap();
        assert!(json.contains("\"result\": \"SUCCESS\""));
        assert!(json.contains("\"source_change\": \"30\""));
    }
}
