use async_trait::async_trait;

use regpilot_core::AccountInfo;

use crate::AutomationError;

/// Outcome of asking the host for a verification code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeReply {
    /// Code retrieved, ready to fill.
    Code(String),
    /// The host wants the operator to type the code by hand; the page
    /// counts as handled so automation stops touching it.
    ManualInput,
    /// Retrieval failed for the given reason. The page stays
    /// unhandled and is retried on a later pass.
    Failed(String),
}

/// Channel back to whatever drives the automation: it owns the
/// registration task, fetches verification codes, and receives
/// progress and error reports.
#[async_trait]
pub trait HostCoordinator: Send + Sync {
    /// Account data for the active registration task, or `None` when
    /// no task is running.
    async fn account_info(&self) -> Result<Option<AccountInfo>, AutomationError>;

    async fn verification_code(&self) -> Result<CodeReply, AutomationError>;

    /// Progress note, fire and forget.
    async fn update_step(&self, text: &str);

    async fn report_error(&self, text: &str);

    /// The final allow-access step was clicked; the flow is done.
    async fn auth_completed(&self);
}
