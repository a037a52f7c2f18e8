//! Interactive confirmation for destructive workspace steps.

use dialoguer::Confirm;
use patchtester_core::Confirmer;
use tracing::warn;

/// Asks on the terminal. Anything but an explicit yes is a no.
pub struct TerminalConfirm;

impl Confirmer for TerminalConfirm {
    fn ask(&self, prompt: &str) -> bool {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not read confirmation");
                false
            })
    }
}
