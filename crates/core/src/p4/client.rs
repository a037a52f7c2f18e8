//! Asynchronous Perforce CLI client.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::backend::{CommandOutcome, P4Backend, RevRange};
use super::parser::{
    parse_describe, parse_filelog, parse_have, parse_opened, parse_resolve, parse_ztag,
    rewrite_form_description, ChangeDescription, FileLog, OpenedFile, ResolveOutput, ZtagItem,
};
use crate::errors::P4Error;

/// Asynchronous client for a Perforce server via the `p4` CLI.
#[derive(Debug, Clone)]
pub struct P4Client {
    port: String,
    user: String,
    client: String,
    password: Option<String>,
}

impl P4Client {
    /// Create a new client bound to the `client` workspace.
    pub fn new(port: impl Into<String>, user: impl Into<String>, client: impl Into<String>) -> Self {
        let p4 = Self { port: port.into(), user: user.into(), client: client.into(), password: None };
        info!(port = %p4.port, user = %p4.user, client = %p4.client, "created P4Client");
        p4
    }

    /// Authenticate with a password or ticket passed as `-P`.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    async fn run_p4(&self, args: &[&str]) -> Result<String, P4Error> {
        self.run_p4_with_input(args, None).await
    }

    /// Run a `p4` command. A non-zero exit or any stderr output is a failure,
    /// matching how the server reports warnings.
    async fn run_p4_with_input(&self, args: &[&str], input: Option<&str>) -> Result<String, P4Error> {
        let mut cmd = Command::new("p4");
        if !self.port.is_empty() {
            cmd.arg("-p").arg(&self.port);
        }
        if !self.user.is_empty() {
            cmd.arg("-u").arg(&self.user);
        }
        cmd.arg("-c").arg(&self.client);
        if let Some(ref password) = self.password {
            cmd.arg("-P").arg(password);
        }
        cmd.args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = ?format!("p4 {}", args.join(" ")), "running p4 command");
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                P4Error::BinaryNotFound("p4".into())
            } else {
                P4Error::IoError(e)
            }
        })?;

        if let Some(text) = input {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(text.as_bytes()).await?;
                stdin.shutdown().await?;
            }
        }

        let output = child.wait_with_output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() || !stderr.is_empty() {
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "p4 command failed");
            return Err(P4Error::CommandFailed { exit_code, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn output_lines(output: &str) -> Vec<String> {
    output.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect()
}

#[async_trait]
impl P4Backend for P4Client {
    #[instrument(skip(self))]
    async fn client_exists(&self, client: &str) -> Result<bool, P4Error> {
        let output = self.run_p4(&["-ztag", "clients", "-e", client]).await?;
        Ok(parse_ztag(&output).iter().any(|item| match item {
            ZtagItem::Record(r) => r.get("client").map(String::as_str) == Some(client),
            ZtagItem::Message(_) => false,
        }))
    }

    #[instrument(skip(self), fields(client = %self.client))]
    async fn opened(&self) -> Result<Vec<OpenedFile>, P4Error> {
        let output = self.run_p4(&["-ztag", "opened"]).await?;
        Ok(parse_opened(&output))
    }

    #[instrument(skip(self, description), fields(client = %self.client))]
    async fn create_change(&self, description: &str) -> Result<String, P4Error> {
        let form = self.run_p4(&["change", "-o"]).await?;
        let form = rewrite_form_description(&form, description);
        let ack = self.run_p4_with_input(&["change", "-i"], Some(&form)).await?;
        debug!(ack = %ack.trim(), "change form submitted");
        Ok(ack)
    }

    #[instrument(skip(self))]
    async fn delete_change(&self, change: &str) -> Result<(), P4Error> {
        self.run_p4(&["change", "-d", change]).await?;
        info!(change, "deleted changelist");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn shelve(&self, change: &str) -> Result<(), P4Error> {
        self.run_p4(&["shelve", "-c", change, "-f", "-a", "submitunchanged"]).await?;
        info!(change, "shelved changelist");
        Ok(())
    }

    #[instrument(skip(self), fields(client = %self.client))]
    async fn revert_all(&self) -> CommandOutcome<()> {
        CommandOutcome::classify(self.run_p4(&["revert", "//..."]).await.map(|_| ()))
    }

    #[instrument(skip(self))]
    async fn sync_path(&self, path: &str) -> CommandOutcome<()> {
        CommandOutcome::classify(self.run_p4(&["sync", path]).await.map(|_| ()))
    }

    #[instrument(skip(self))]
    async fn describe(&self, change: &str) -> Result<ChangeDescription, P4Error> {
        let output = self.run_p4(&["-ztag", "describe", "-s", change]).await?;
        parse_describe(&output)
    }

    #[instrument(skip(self))]
    async fn integrate(&self, change: &str, source: &str, target: &str) -> Result<Vec<String>, P4Error> {
        let output = self.run_p4(&["integ", "-q", "-c", change, "-f", source, target]).await?;
        Ok(output_lines(&output))
    }

    #[instrument(skip(self))]
    async fn verify(&self, file: &str) -> Result<Vec<String>, P4Error> {
        let output = self.run_p4(&["verify", "-q", "-s", file]).await?;
        Ok(output_lines(&output))
    }

    #[instrument(skip(self))]
    async fn sync_file(&self, file: &str) -> Result<Vec<String>, P4Error> {
        let output = self.run_p4(&["sync", "-q", file]).await?;
        Ok(output_lines(&output))
    }

    #[instrument(skip(self))]
    async fn resolve(&self, file: &str) -> CommandOutcome<ResolveOutput> {
        let result = self.run_p4(&["-ztag", "resolve", "-am", "-o", file]).await;
        CommandOutcome::classify(result.map(|output| parse_resolve(&output)))
    }

    #[instrument(skip(self))]
    async fn have(&self, file: &str) -> Result<u32, P4Error> {
        let output = self.run_p4(&["-ztag", "have", file]).await?;
        parse_have(&output)
    }

    #[instrument(skip(self))]
    async fn filelog(&self, file: &str, range: RevRange, integrations_only: bool) -> Result<Vec<FileLog>, P4Error> {
        let spec = format!("{}{}", file, range.spec());
        let output = if integrations_only {
            self.run_p4(&["-ztag", "filelog", "-h", "-m2", &spec]).await?
        } else {
            self.run_p4(&["-ztag", "filelog", &spec]).await?
        };
        Ok(parse_filelog(&output))
    }
}
