//! Workspace preparation before a pass and cleanup after the run.

use tracing::{debug, info, instrument, warn};

use super::{Confirmer, PatchTester};
use crate::errors::RunError;
use crate::model::Branch;
use crate::p4::{parse_change_created, CommandOutcome, NoOp, OpenedFile, P4Backend};

/// Description of the changelist that receives files from the default changelist.
pub const SHELVE_DESCRIPTION: &str = "PatchTester shelved \ndefault changelist";

impl<'a, B: P4Backend + ?Sized, C: Confirmer + ?Sized> PatchTester<'a, B, C> {
    /// Make the client safe to integrate into `target`.
    ///
    /// Pending opens under the target prefix are shelved (after confirmation)
    /// and everything is reverted; then, if the operator agrees, the target
    /// branch is synced to head.
    #[instrument(skip(self, target), fields(target = %target.prefix))]
    pub async fn prepare_for_integration(&mut self, target: &Branch) -> Result<(), RunError> {
        let opened = self
            .backend
            .opened()
            .await
            .map_err(|source| RunError::Backend { stage: "listing opened files", source })?;

        let pending = opened.iter().any(|f| f.depot_file.starts_with(&target.prefix));
        if pending {
            info!(count = opened.len(), "workspace has pending changes");
            let prompt = format!(
                "Pending changes in client {} will be shelved and reverted. Continue?",
                self.settings.client
            );
            if !self.confirmer.ask(&prompt) {
                return Err(RunError::Declined("shelve pending changes".into()));
            }
            self.shelve_opened(&opened).await?;
            match self.backend.revert_all().await {
                CommandOutcome::Success(()) | CommandOutcome::BenignNoOp(_) => {}
                CommandOutcome::Failure(source) => {
                    return Err(RunError::Backend { stage: "reverting workspace", source })
                }
            }
        }

        let prompt = format!("Ready to sync branch: {}, Continue with sync?", target.prefix);
        if !self.confirmer.ask(&prompt) {
            info!("sync skipped by operator");
            return Ok(());
        }
        match self.backend.sync_path(&format!("{}/...", target.prefix)).await {
            CommandOutcome::Success(()) => info!("target branch synced"),
            CommandOutcome::BenignNoOp(NoOp::UpToDate) => info!("tree up-to-date"),
            CommandOutcome::BenignNoOp(other) => debug!(%other, "sync reported no-op"),
            CommandOutcome::Failure(source) => {
                warn!(error = %source, "sync failed");
                return Err(RunError::Backend { stage: "syncing target branch", source });
            }
        }
        Ok(())
    }

    /// Shelve every distinct changelist holding open files.
    async fn shelve_opened(&self, opened: &[OpenedFile]) -> Result<(), RunError> {
        let mut containers: Vec<&str> = Vec::new();
        for file in opened {
            if !containers.contains(&file.change.as_str()) {
                containers.push(&file.change);
            }
        }

        for container in containers {
            let change = if container == "default" {
                let ack = self
                    .backend
                    .create_change(SHELVE_DESCRIPTION)
                    .await
                    .map_err(|source| RunError::Backend { stage: "creating shelve changelist", source })?;
                let change = parse_change_created(&ack)
                    .map_err(|source| RunError::Backend { stage: "creating shelve changelist", source })?;
                info!(%change, "default changelist moved to new change");
                change
            } else {
                container.to_string()
            };
            self.backend
                .shelve(&change)
                .await
                .map_err(|source| RunError::Backend { stage: "shelving changelist", source })?;
            info!(%change, "changelist shelved");
        }
        Ok(())
    }

    /// Revert the client and delete every changelist the run created.
    /// With `dirty` set the client is left untouched for inspection.
    #[instrument(skip(self))]
    pub async fn cleanup(&mut self, dirty: bool) -> Result<(), RunError> {
        if dirty {
            info!(changes = ?self.created_changelists, "leaving client dirty");
            return Ok(());
        }

        let prompt = format!(
            "Client {} will be reverted and {} changelists deleted. Continue?",
            self.settings.client,
            self.created_changelists.len()
        );
        if !self.confirmer.ask(&prompt) {
            return Err(RunError::Declined("clean up client".into()));
        }

        match self.backend.revert_all().await {
            CommandOutcome::Success(()) => info!("client reverted"),
            CommandOutcome::BenignNoOp(reason) => debug!(%reason, "nothing to revert"),
            CommandOutcome::Failure(source) => {
                return Err(RunError::Backend { stage: "reverting client", source })
            }
        }

        for change in std::mem::take(&mut self.created_changelists) {
            match self.backend.delete_change(&change).await {
                Ok(()) => debug!(%change, "changelist deleted"),
                Err(e) => warn!(%change, error = %e, "could not delete changelist"),
            }
        }
        Ok(())
    }
}
