//! The account-selection prompt, the only view surface the broadcaster drives.

use tracing::{debug, info, warn};

use crate::{account::Account, api::FailureNotice};

/// Host-provided selection UI (a modal dialog on the web, a terminal menu in
/// the CLI).
///
/// `show_loading` is always followed by exactly one `finish_loading`.
pub trait AccountPrompt: Send + Sync {
    fn show_loading(&self);

    /// Offer `accounts` for selection. The host reports the pick through
    /// [`crate::AccountContextBroadcaster::choose`].
    fn present_accounts(&self, accounts: &[Account]);

    fn show_failure(&self, notice: &FailureNotice);

    fn finish_loading(&self);

    /// Dismiss the prompt after a selection has been made.
    fn hide(&self);
}

/// Prompt that only logs. Used when nothing interactive is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessPrompt;

impl AccountPrompt for HeadlessPrompt {
    fn show_loading(&self) {
        debug!("loading accounts");
    }

    fn present_accounts(&self, accounts: &[Account]) {
        info!(count = accounts.len(), "account selection required");
    }

    fn show_failure(&self, notice: &FailureNotice) {
        warn!(kind = ?notice.kind, message = %notice.message, "account load failed");
    }

    fn finish_loading(&self) {}

    fn hide(&self) {}
}
