//! Request tree: root -> request -> requested change.
//!
//! The tree is built once from the request source, mutated node by node by
//! the orchestrator and diagnostician, and read by the report builder.

use serde::{Deserialize, Serialize};

use crate::p4::{ChangeDescription, ResolveOutput};

/// Requested-change value meaning "no changelist available yet".
pub const SENTINEL_CHANGE: &str = "0";

/// Request id used when changes are passed directly on the command line.
pub const LOCAL_REQUEST: &str = "local";

// ---------------------------------------------------------------------------
// Branch descriptor
// ---------------------------------------------------------------------------

/// A target branch of an integration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Short name (release version), e.g. `1.0`.
    pub name: String,
    /// Long release name, used to look up requests.
    pub release_name: String,
    /// Depot path prefix, e.g. `//depot/streams/v1.0`.
    pub prefix: String,
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// One labelled diagnostic entry recorded on a change node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub label: String,
    pub text: String,
}

impl Finding {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self { label: label.into(), text: text.into() }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A requested source change to be tested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNode {
    pub requested_change: String,
    /// Local changelist created for the integration attempt.
    pub change: Option<String>,
    pub change_description: Option<ChangeDescription>,
    pub cross_component: bool,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub suggestions: Vec<Finding>,
    /// Most recent resolve output; transient, used by the diagnostician.
    #[serde(skip)]
    pub resolve_result: Option<ResolveOutput>,
}

impl ChangeNode {
    pub fn new(requested_change: impl Into<String>) -> Self {
        Self { requested_change: requested_change.into(), ..Default::default() }
    }

    pub fn is_sentinel(&self) -> bool {
        self.requested_change == SENTINEL_CHANGE
    }

    /// Clear every outcome field before (re)processing.
    pub fn reset_outcome(&mut self) {
        self.cross_component = false;
        self.errors.clear();
        self.warnings.clear();
        self.suggestions.clear();
        self.resolve_result = None;
    }

    pub fn record_error(&mut self, label: impl Into<String>, text: impl Into<String>) {
        self.errors.push(Finding::new(label, text));
    }

    pub fn record_warning(&mut self, label: impl Into<String>, text: impl Into<String>) {
        self.warnings.push(Finding::new(label, text));
    }

    pub fn record_suggestion(&mut self, label: impl Into<String>, text: impl Into<String>) {
        self.suggestions.push(Finding::new(label, text));
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Copy the outcome of another node that integrated the same change.
    pub fn mirror_outcome(&mut self, other: &ChangeNode) {
        self.change = other.change.clone();
        self.change_description = other.change_description.clone();
        self.cross_component = other.cross_component;
        self.errors = other.errors.clone();
        self.warnings = other.warnings.clone();
        self.suggestions = other.suggestions.clone();
    }
}

/// One originating request (ticket) and its requested changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestNode {
    pub id: String,
    pub changes: Vec<ChangeNode>,
}

/// Position of a change node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub request: usize,
    pub change: usize,
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTree {
    pub requests: Vec<RequestNode>,
}

impl RequestTree {
    /// Build the tree from ordered `(request-id, change-id)` pairs.
    /// Requests keep their first-seen order.
    pub fn from_pairs<I, R, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, C)>,
        R: Into<String>,
        C: Into<String>,
    {
        let mut tree = Self::default();
        for (request, change) in pairs {
            let request = request.into();
            let idx = match tree.requests.iter().position(|r| r.id == request) {
                Some(idx) => idx,
                None => {
                    tree.requests.push(RequestNode { id: request, changes: Vec::new() });
                    tree.requests.len() - 1
                }
            };
            tree.requests[idx].changes.push(ChangeNode::new(change));
        }
        tree
    }

    /// A single `local` request holding changes given directly by the operator.
    pub fn local<I, C>(changes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self::from_pairs(changes.into_iter().map(|c| (LOCAL_REQUEST, c)))
    }

    /// Every requested-change value in tree order.
    pub fn requested_changes(&self) -> Vec<String> {
        self.iter().map(|(_, n)| n.requested_change.clone()).collect()
    }

    pub fn get(&self, id: NodeId) -> Option<&ChangeNode> {
        self.requests.get(id.request)?.changes.get(id.change)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ChangeNode> {
        self.requests.get_mut(id.request)?.changes.get_mut(id.change)
    }

    pub fn request_id(&self, id: NodeId) -> Option<&str> {
        self.requests.get(id.request).map(|r| r.id.as_str())
    }

    /// In-order, depth-first traversal of the change nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ChangeNode)> {
        self.requests.iter().enumerate().flat_map(|(r, req)| {
            req.changes
                .iter()
                .enumerate()
                .map(move |(c, node)| (NodeId { request: r, change: c }, node))
        })
    }

    pub fn leaf_count(&self) -> usize {
        self.requests.iter().map(|r| r.changes.len()).sum()
    }

    /// First node whose requested change equals `value`.
    pub fn find_by_requested(&self, value: &str) -> Option<NodeId> {
        self.iter().find(|(_, n)| n.requested_change == value).map(|(id, _)| id)
    }

    /// Every node whose requested change equals `value`.
    pub fn find_all_by_requested(&self, value: &str) -> Vec<NodeId> {
        self.iter().filter(|(_, n)| n.requested_change == value).map(|(id, _)| id).collect()
    }

    /// First node whose assigned local changelist equals `value`.
    pub fn find_by_local_change(&self, value: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, n)| n.change.as_deref() == Some(value))
            .map(|(id, _)| id)
    }
}

/// Sort requested changes in ascending numeric order.
pub fn sorted_requested(values: &[String]) -> Vec<String> {
    let mut sorted = values.to_vec();
    sorted.sort_by_key(|v| v.trim().parse::<u64>().unwrap_or(u64::MAX));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RequestTree {
        RequestTree::from_pairs(vec![
            ("PRQ-1", "100"),
            ("PRQ-2", "0"),
            ("PRQ-1", "120"),
            ("PRQ-3", "0"),
        ])
    }

    #[test]
    fn test_from_pairs_groups_in_first_seen_order() {
        let tree = sample();
        assert_eq!(tree.requests.len(), 3);
        assert_eq!(tree.requests[0].id, "PRQ-1");
        assert_eq!(tree.requests[0].changes.len(), 2);
        assert_eq!(tree.requests[0].changes[1].requested_change, "120");
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn test_local_tree() {
        let tree = RequestTree::local(["5", "6"]);
        assert_eq!(tree.requests.len(), 1);
        assert_eq!(tree.requests[0].id, LOCAL_REQUEST);
        assert_eq!(tree.requested_changes(), vec!["5", "6"]);
    }

    #[test]
    fn test_lookup_by_requested_and_local_change() {
        let mut tree = sample();
        let id = tree.find_by_requested("120").unwrap();
        assert_eq!(id, NodeId { request: 0, change: 1 });
        assert_eq!(tree.find_all_by_requested(SENTINEL_CHANGE).len(), 2);
        assert!(tree.find_by_requested("999").is_none());

        tree.get_mut(id).unwrap().change = Some("5001".into());
        assert_eq!(tree.find_by_local_change("5001"), Some(id));
        assert!(tree.find_by_local_change("5002").is_none());
    }

    #[test]
    fn test_sorted_requested_numeric() {
        let values: Vec<String> = vec!["30".into(), "10".into(), "20".into(), "100".into()];
        assert_eq!(sorted_requested(&values), vec!["10", "20", "30", "100"]);
    }

    #[test]
    fn test_reset_and_success() {
        let mut node = ChangeNode::new("7");
        assert!(node.is_success());
        node.record_warning("w", "x");
        node.cross_component = true;
        assert!(!node.is_success());
        node.reset_outcome();
        assert!(node.is_success());
        assert!(!node.cross_component);
    }

    #[test]
    fn test_mirror_outcome() {
        let mut a = ChangeNode::new("7");
        a.change = Some("900".into());
        a.record_error("e", "boom");
        let mut b = ChangeNode::new("7");
        b.mirror_outcome(&a);
        assert_eq!(b.change.as_deref(), Some("900"));
        assert_eq!(b.errors, a.errors);
    }
}
