//! Parsers for `p4 -ztag` output and change forms.
//!
//! Tagged output is a sequence of `... key value` lines. Records are separated
//! by blank lines, or start again when a key repeats. Untagged lines are kept
//! as free-text messages, except for the continuation lines of a multi-line
//! `desc` value.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::P4Error;

/// One tagged record: key -> value.
pub type ZtagRecord = BTreeMap<String, String>;

/// An item of tagged output, in the order the server produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZtagItem {
    Record(ZtagRecord),
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedFile {
    pub depot_file: String,
    /// `default` or a numbered changelist.
    pub change: String,
}

impl OpenedFile {
    pub fn in_default_change(&self) -> bool {
        self.change.contains("default")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedFile {
    pub depot_file: String,
    pub rev: u32,
    pub action: String,
}

/// The description record of a changelist (`p4 describe -s`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescription {
    pub change: String,
    pub desc: String,
    pub status: String,
    pub user: String,
    /// Common path of the change's files, when the server reports one.
    pub path: Option<String>,
    pub files: Vec<DescribedFile>,
}

impl ChangeDescription {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }

    pub fn depot_files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.depot_file.as_str())
    }
}

/// An integration record attached to a file revision (`how`, `file`, `srev`, `erev`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub how: String,
    pub file: String,
    pub srev: String,
    pub erev: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRevision {
    pub rev: u32,
    pub change: String,
    pub action: String,
    pub user: String,
    pub integrations: Vec<Integration>,
}

impl FileRevision {
    /// Whether this revision was acquired from another path.
    pub fn has_ancestry(&self) -> bool {
        !self.integrations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLog {
    pub depot_file: String,
    pub revisions: Vec<FileRevision>,
}

/// A structured record reported by `p4 resolve`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRecord {
    pub client_file: Option<String>,
    pub from_file: Option<String>,
    pub base_file: Option<String>,
    pub base_rev: Option<String>,
    pub how: Option<String>,
    pub content_resolve_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveEntry {
    Record(ResolveRecord),
    Message(String),
}

/// Everything `p4 resolve` reported for one file, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOutput {
    pub entries: Vec<ResolveEntry>,
}

impl ResolveOutput {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ResolveRecord> {
        self.entries.iter().filter_map(|e| match e {
            ResolveEntry::Record(r) => Some(r),
            ResolveEntry::Message(_) => None,
        })
    }

    /// The base file used for the merge.
    pub fn base_file(&self) -> Option<&str> {
        self.records().find_map(|r| r.base_file.as_deref())
    }

    /// The workspace path of the resolved file.
    pub fn client_file(&self) -> Option<&str> {
        self.records().find_map(|r| r.client_file.as_deref())
    }

    /// Flatten the output into a log-friendly summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                ResolveEntry::Record(r) => {
                    if let Some(ref t) = r.content_resolve_type {
                        out.push_str(&format!("contentResolveType:{}\n", t));
                    }
                    if let Some(ref b) = r.base_rev {
                        out.push_str(&format!("baseRev:{}\n", b));
                    }
                    if let Some(ref h) = r.how {
                        out.push_str(&format!("how:{}\n", h));
                    }
                }
                ResolveEntry::Message(m) => {
                    out.push_str(m);
                    out.push('\n');
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tagged output
// ---------------------------------------------------------------------------

pub fn parse_ztag(output: &str) -> Vec<ZtagItem> {
    let mut items = Vec::new();
    let mut current = ZtagRecord::new();
    let mut in_desc = false;

    fn flush(items: &mut Vec<ZtagItem>, current: &mut ZtagRecord) {
        if !current.is_empty() {
            if let Some(desc) = current.get_mut("desc") {
                let trimmed = desc.trim_end().to_string();
                *desc = trimmed;
            }
            items.push(ZtagItem::Record(std::mem::take(current)));
        }
    }

    for line in output.lines() {
        if let Some(tagged) = line.strip_prefix("... ") {
            let (key, value) = match tagged.split_once(' ') {
                Some((k, v)) => (k, v),
                None => (tagged, ""),
            };
            if current.contains_key(key) {
                flush(&mut items, &mut current);
            }
            in_desc = key == "desc";
            current.insert(key.to_string(), value.to_string());
            continue;
        }

        if in_desc {
            if let Some(desc) = current.get_mut("desc") {
                desc.push('\n');
                desc.push_str(line);
            }
            continue;
        }

        if line.trim().is_empty() {
            flush(&mut items, &mut current);
            continue;
        }

        flush(&mut items, &mut current);
        items.push(ZtagItem::Message(line.trim().to_string()));
    }
    flush(&mut items, &mut current);
    items
}

fn records(output: &str) -> impl Iterator<Item = ZtagRecord> {
    parse_ztag(output).into_iter().filter_map(|item| match item {
        ZtagItem::Record(r) => Some(r),
        ZtagItem::Message(_) => None,
    })
}

/// Parse a `#3` / `#none` / `3` revision marker.
pub fn parse_rev(s: &str) -> u32 {
    s.trim().trim_start_matches('#').parse::<u32>().unwrap_or(0)
}

pub fn parse_opened(output: &str) -> Vec<OpenedFile> {
    let opened: Vec<OpenedFile> = records(output)
        .filter_map(|r| {
            Some(OpenedFile {
                depot_file: r.get("depotFile")?.clone(),
                change: r.get("change").cloned().unwrap_or_else(|| "default".into()),
            })
        })
        .collect();
    debug!(count = opened.len(), "parsed opened files");
    opened
}

pub fn parse_describe(output: &str) -> Result<ChangeDescription, P4Error> {
    let record = records(output)
        .next()
        .ok_or_else(|| P4Error::ParseError("empty describe output".into()))?;
    let change = record
        .get("change")
        .cloned()
        .ok_or_else(|| P4Error::ParseError("missing change in describe output".into()))?;

    let mut files = Vec::new();
    for idx in 0.. {
        let Some(depot_file) = record.get(&format!("depotFile{}", idx)) else {
            break;
        };
        files.push(DescribedFile {
            depot_file: depot_file.clone(),
            rev: record
                .get(&format!("rev{}", idx))
                .map(|r| parse_rev(r))
                .unwrap_or(0),
            action: record
                .get(&format!("action{}", idx))
                .cloned()
                .unwrap_or_default(),
        });
    }

    debug!(change = %change, files = files.len(), "parsed change description");
    Ok(ChangeDescription {
        change,
        desc: record.get("desc").cloned().unwrap_or_default(),
        status: record.get("status").cloned().unwrap_or_default(),
        user: record.get("user").cloned().unwrap_or_default(),
        path: record.get("path").cloned(),
        files,
    })
}

pub fn parse_have(output: &str) -> Result<u32, P4Error> {
    records(output)
        .find_map(|r| r.get("haveRev").map(|v| parse_rev(v)))
        .ok_or_else(|| P4Error::ParseError("missing haveRev in have output".into()))
}

pub fn parse_filelog(output: &str) -> Vec<FileLog> {
    let mut logs = Vec::new();
    for record in records(output) {
        let Some(depot_file) = record.get("depotFile").cloned() else {
            warn!("skipping filelog record without depotFile");
            continue;
        };
        let mut revisions = Vec::new();
        for r in 0.. {
            let Some(rev) = record.get(&format!("rev{}", r)) else {
                break;
            };
            let mut integrations = Vec::new();
            for i in 0.. {
                let Some(how) = record.get(&format!("how{},{}", r, i)) else {
                    break;
                };
                let field = |name: &str| {
                    record
                        .get(&format!("{}{},{}", name, r, i))
                        .cloned()
                        .unwrap_or_default()
                };
                integrations.push(Integration {
                    how: how.clone(),
                    file: field("file"),
                    srev: field("srev"),
                    erev: field("erev"),
                });
            }
            let field = |name: &str| {
                record
                    .get(&format!("{}{}", name, r))
                    .cloned()
                    .unwrap_or_default()
            };
            revisions.push(FileRevision {
                rev: parse_rev(rev),
                change: field("change"),
                action: field("action"),
                user: field("user"),
                integrations,
            });
        }
        logs.push(FileLog {
            depot_file,
            revisions,
        });
    }
    debug!(count = logs.len(), "parsed filelog records");
    logs
}

pub fn parse_resolve(output: &str) -> ResolveOutput {
    let entries = parse_ztag(output)
        .into_iter()
        .map(|item| match item {
            ZtagItem::Record(r) => ResolveEntry::Record(ResolveRecord {
                client_file: r.get("clientFile").cloned(),
                from_file: r.get("fromFile").cloned(),
                base_file: r.get("baseFile").cloned(),
                base_rev: r.get("baseRev").cloned(),
                how: r.get("how").cloned(),
                content_resolve_type: r.get("contentResolveType").cloned(),
            }),
            ZtagItem::Message(m) => ResolveEntry::Message(m),
        })
        .collect();
    ResolveOutput { entries }
}

// ---------------------------------------------------------------------------
// Change forms
// ---------------------------------------------------------------------------

fn change_created_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Change (\d+) created").expect("valid regex"))
}

/// Extract the changelist id from a `Change <id> created ...` acknowledgment.
pub fn parse_change_created(ack: &str) -> Result<String, P4Error> {
    let line = ack.lines().next().unwrap_or("").trim();
    change_created_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| P4Error::UnexpectedAcknowledgment(ack.trim().to_string()))
}

/// Replace the `Description:` block of a change spec form.
pub fn rewrite_form_description(form: &str, description: &str) -> String {
    let mut out = String::with_capacity(form.len() + description.len());
    let mut skipping = false;
    let mut replaced = false;

    for line in form.lines() {
        if skipping {
            if line.starts_with('\t') || line.trim().is_empty() {
                continue;
            }
            skipping = false;
            out.push('\n');
        }
        if line.starts_with("Description:") {
            out.push_str("Description:\n");
            for desc_line in description.lines() {
                out.push('\t');
                out.push_str(desc_line);
                out.push('\n');
            }
            skipping = true;
            replaced = true;
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }

    if !replaced {
        out.push_str("\nDescription:\n");
        for desc_line in description.lines() {
            out.push('\t');
            out.push_str(desc_line);
            out.push('\n');
        }
    }
    out
}
