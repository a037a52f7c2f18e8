//! Interpretation of `p4 resolve` output.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::p4::{ResolveEntry, ResolveOutput};

/// What a resolve run tells us about one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveVerdict {
    /// Merged without conflicting chunks.
    Clean,
    /// The server skipped the resolve; nothing more to learn.
    Skipped,
    /// The merge left this many conflicting chunks.
    Conflicts(u32),
}

fn conflicting_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+) conflicting").expect("valid regex"))
}

/// Scan resolve entries in order; the first skip or conflict decides.
pub fn interpret(output: &ResolveOutput) -> ResolveVerdict {
    for entry in &output.entries {
        let ResolveEntry::Message(text) = entry else {
            continue;
        };
        if text.contains("resolve skipped") {
            return ResolveVerdict::Skipped;
        }
        if text.contains("Diff chunks:") {
            let count = conflicting_re()
                .captures(text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            if count > 0 {
                return ResolveVerdict::Conflicts(count);
            }
        }
    }
    ResolveVerdict::Clean
}
