use std::collections::HashSet;

use regpilot_core::AccountInfo;

/// Busy guard for the periodic tick. A tick that is still awaiting a
/// verification code must not be overlapped by the next timer fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickState {
    #[default]
    Idle,
    Running,
}

/// Mutable state of one registration flow. Everything here is scoped
/// to a single account attempt and dropped on [`FlowSession::reset`].
#[derive(Debug, Default)]
pub struct FlowSession {
    account: Option<AccountInfo>,
    code: Option<String>,
    processed: HashSet<String>,
    tick_state: TickState,
}

impl FlowSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the tick. Returns false when a previous tick is still in
    /// flight, in which case the caller must skip this round.
    pub fn begin_tick(&mut self) -> bool {
        if self.tick_state == TickState::Running {
            return false;
        }
        self.tick_state = TickState::Running;
        true
    }

    pub fn end_tick(&mut self) {
        self.tick_state = TickState::Idle;
    }

    pub fn account(&self) -> Option<&AccountInfo> {
        self.account.as_ref()
    }

    pub fn set_account(&mut self, account: AccountInfo) {
        self.account = Some(account);
    }

    /// Verification code already fetched for this flow, if any. Cached
    /// so a reloaded verify page never triggers a second retrieval.
    pub fn cached_code(&self) -> Option<String> {
        self.code.clone()
    }

    pub fn cache_code(&mut self, code: &str) {
        self.code = Some(code.to_string());
    }

    pub fn is_processed(&self, page_id: &str) -> bool {
        self.processed.contains(page_id)
    }

    pub fn mark_processed(&mut self, page_id: String) {
        self.processed.insert(page_id);
    }

    /// Forget everything for a fresh flow.
    pub fn reset(&mut self) {
        self.account = None;
        self.code = None;
        self.processed.clear();
        self.tick_state = TickState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_guard_rejects_overlap() {
        let mut session = FlowSession::new();
        assert!(session.begin_tick());
        assert!(!session.begin_tick());
        session.end_tick();
        assert!(session.begin_tick());
    }

    #[test]
    fn test_reset_clears_flow_state() {
        let mut session = FlowSession::new();
        session.set_account(AccountInfo {
            email: "a@b.c".into(),
            full_name: None,
            password: None,
        });
        session.cache_code("482913");
        session.mark_processed("login:https://x/".into());

        session.reset();
        assert!(session.account().is_none());
        assert!(session.cached_code().is_none());
        assert!(!session.is_processed("login:https://x/"));
    }
}
