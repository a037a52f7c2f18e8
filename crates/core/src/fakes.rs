//! In-memory Perforce fake (testing only)
//!
//! [`ScriptedP4`] answers every [`P4Backend`] command from scripted state and
//! keeps a log of the commands it received. A command can be made to fail
//! with [`ScriptedP4::fail_on`]; the failure text goes through the same
//! no-op classification as the real client.
//!
//! An integration copies the files of the described source change into the
//! local changelist, with the source prefix replaced by the target prefix.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::P4Error;
use crate::p4::{
    ChangeDescription, CommandOutcome, DescribedFile, FileLog, FileRevision, OpenedFile, P4Backend,
    ResolveEntry, ResolveOutput, ResolveRecord, RevRange,
};

/// First changelist id handed out by `create_change`.
const FIRST_CHANGE: u32 = 1000;

#[derive(Debug, Default)]
struct State {
    calls: Vec<String>,
    failures: Vec<(String, String)>,
    clients: HashSet<String>,
    opened: Vec<OpenedFile>,
    acks: VecDeque<String>,
    next_change: u32,
    changes: HashMap<String, ChangeDescription>,
    integrate_output: HashMap<String, Vec<String>>,
    no_copy_in: HashSet<String>,
    resolves: HashMap<String, ResolveOutput>,
    have: HashMap<String, u32>,
    history: HashMap<String, Vec<FileRevision>>,
}

/// Scripted, in-memory [`P4Backend`].
#[derive(Debug)]
pub struct ScriptedP4 {
    state: Mutex<State>,
}

impl Default for ScriptedP4 {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedP4 {
    pub fn new() -> Self {
        Self { state: Mutex::new(State { next_change: FIRST_CHANGE, ..Default::default() }) }
    }

    /// Every command received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Fail every command whose log line starts with `prefix`.
    pub fn fail_on(&self, prefix: &str, stderr: &str) {
        self.state.lock().unwrap().failures.push((prefix.to_string(), stderr.to_string()));
    }

    pub fn add_client(&self, name: &str) {
        self.state.lock().unwrap().clients.insert(name.to_string());
    }

    pub fn set_opened(&self, opened: Vec<OpenedFile>) {
        self.state.lock().unwrap().opened = opened;
    }

    /// Queue the acknowledgment `Change <id> created.` for the next new change.
    pub fn push_created_change(&self, id: &str) {
        self.push_change_ack(&format!("Change {} created.", id));
    }

    /// Queue a raw acknowledgment for the next new change.
    pub fn push_change_ack(&self, ack: &str) {
        self.state.lock().unwrap().acks.push_back(ack.to_string());
    }

    pub fn add_change(&self, description: ChangeDescription) {
        self.state.lock().unwrap().changes.insert(description.change.clone(), description);
    }

    /// Lines returned by a successful integration of `change`.
    pub fn set_integrate_output(&self, change: &str, lines: Vec<String>) {
        self.state.lock().unwrap().integrate_output.insert(change.to_string(), lines);
    }

    /// Integrate `change` without copying any files into the local changelist.
    pub fn skip_copy_in(&self, change: &str) {
        self.state.lock().unwrap().no_copy_in.insert(change.to_string());
    }

    pub fn set_resolve(&self, file: &str, output: ResolveOutput) {
        self.state.lock().unwrap().resolves.insert(file.to_string(), output);
    }

    pub fn set_have(&self, file: &str, rev: u32) {
        self.state.lock().unwrap().have.insert(file.to_string(), rev);
    }

    /// History of `file`, newest revision first.
    pub fn set_history(&self, file: &str, revisions: Vec<FileRevision>) {
        self.state.lock().unwrap().history.insert(file.to_string(), revisions);
    }

    /// Log `call` and return the scripted failure for it, if any.
    fn record(&self, call: String) -> Result<(), P4Error> {
        let mut state = self.state.lock().unwrap();
        let failure = state
            .failures
            .iter()
            .find(|(prefix, _)| call.starts_with(prefix.as_str()))
            .map(|(_, stderr)| stderr.clone());
        state.calls.push(call);
        match failure {
            Some(stderr) => Err(P4Error::CommandFailed { exit_code: 1, stderr }),
            None => Ok(()),
        }
    }
}

/// The change id and path prefix of a `prefix/...@N,N` revision range.
fn split_source(source: &str) -> (&str, &str) {
    let (path, range) = source.split_once('@').unwrap_or((source, ""));
    let change = range.split(',').next().unwrap_or("");
    (path.trim_end_matches("/..."), change)
}

fn clean_resolve(file: &str) -> ResolveOutput {
    ResolveOutput {
        entries: vec![
            ResolveEntry::Record(ResolveRecord {
                client_file: Some(file.to_string()),
                base_file: Some(file.to_string()),
                how: Some("merge from".into()),
                content_resolve_type: Some("3waytext".into()),
                ..Default::default()
            }),
            ResolveEntry::Message("Diff chunks: 1 yours + 0 theirs + 0 both + 0 conflicting".into()),
        ],
    }
}

#[async_trait]
impl P4Backend for ScriptedP4 {
    async fn client_exists(&self, client: &str) -> Result<bool, P4Error> {
        self.record(format!("clients -e {}", client))?;
        Ok(self.state.lock().unwrap().clients.contains(client))
    }

    async fn opened(&self) -> Result<Vec<OpenedFile>, P4Error> {
        self.record("opened".into())?;
        Ok(self.state.lock().unwrap().opened.clone())
    }

    async fn create_change(&self, description: &str) -> Result<String, P4Error> {
        self.record(format!("change -i {}", description))?;
        let mut state = self.state.lock().unwrap();
        if let Some(ack) = state.acks.pop_front() {
            return Ok(ack);
        }
        let id = state.next_change;
        state.next_change += 1;
        Ok(format!("Change {} created.", id))
    }

    async fn delete_change(&self, change: &str) -> Result<(), P4Error> {
        self.record(format!("change -d {}", change))?;
        self.state.lock().unwrap().changes.remove(change);
        Ok(())
    }

    async fn shelve(&self, change: &str) -> Result<(), P4Error> {
        self.record(format!("shelve {}", change))
    }

    async fn revert_all(&self) -> CommandOutcome<()> {
        CommandOutcome::classify(self.record("revert //...".into()))
    }

    async fn sync_path(&self, path: &str) -> CommandOutcome<()> {
        CommandOutcome::classify(self.record(format!("sync {}", path)))
    }

    async fn describe(&self, change: &str) -> Result<ChangeDescription, P4Error> {
        self.record(format!("describe {}", change))?;
        self.state.lock().unwrap().changes.get(change).cloned().ok_or_else(|| {
            P4Error::CommandFailed { exit_code: 1, stderr: format!("{} - no such changelist.", change) }
        })
    }

    async fn integrate(&self, change: &str, source: &str, target: &str) -> Result<Vec<String>, P4Error> {
        self.record(format!("integ -c {} {} {}", change, source, target))?;
        let (from_prefix, requested) = split_source(source);
        let to_prefix = target.trim_end_matches("/...");

        let mut state = self.state.lock().unwrap();
        let files = match state.changes.get(requested) {
            Some(d) if !state.no_copy_in.contains(requested) => d
                .files
                .iter()
                .map(|f| DescribedFile {
                    depot_file: f.depot_file.replacen(from_prefix, to_prefix, 1),
                    rev: f.rev,
                    action: f.action.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        state.changes.insert(
            change.to_string(),
            ChangeDescription {
                change: change.to_string(),
                desc: format!("patchTester: test integrate for {}", requested),
                status: "pending".into(),
                files,
                ..Default::default()
            },
        );
        Ok(state.integrate_output.get(requested).cloned().unwrap_or_default())
    }

    async fn verify(&self, file: &str) -> Result<Vec<String>, P4Error> {
        self.record(format!("verify {}", file))?;
        Ok(Vec::new())
    }

    async fn sync_file(&self, file: &str) -> Result<Vec<String>, P4Error> {
        self.record(format!("sync -q {}", file))?;
        Ok(Vec::new())
    }

    async fn resolve(&self, file: &str) -> CommandOutcome<ResolveOutput> {
        if let Err(e) = self.record(format!("resolve {}", file)) {
            return CommandOutcome::classify(Err(e));
        }
        let state = self.state.lock().unwrap();
        CommandOutcome::Success(state.resolves.get(file).cloned().unwrap_or_else(|| clean_resolve(file)))
    }

    async fn have(&self, file: &str) -> Result<u32, P4Error> {
        self.record(format!("have {}", file))?;
        self.state.lock().unwrap().have.get(file).copied().ok_or_else(|| P4Error::CommandFailed {
            exit_code: 1,
            stderr: format!("{} - file(s) not on client.", file),
        })
    }

    async fn filelog(&self, file: &str, range: RevRange, integrations_only: bool) -> Result<Vec<FileLog>, P4Error> {
        let flags = if integrations_only { "-h " } else { "" };
        self.record(format!("filelog {}{}{}", flags, file, range.spec()))?;
        let state = self.state.lock().unwrap();
        let history = state.history.get(file).ok_or_else(|| P4Error::CommandFailed {
            exit_code: 1,
            stderr: format!("{} - no such file(s).", file),
        })?;
        let mut revisions: Vec<FileRevision> = history
            .iter()
            .filter(|r| r.rev >= range.from && r.rev <= range.to)
            .cloned()
            .collect();
        if integrations_only {
            revisions.truncate(2);
        }
        if revisions.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![FileLog { depot_file: file.to_string(), revisions }])
    }
}
