use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use regpilot_core::AccountInfo;

use crate::classify::{self, PageKind};
use crate::coordinator::{CodeReply, HostCoordinator};
use crate::page::PageAccessor;
use crate::selectors;
use crate::session::FlowSession;
use crate::AutomationError;

/// Pause between filling a field and submitting, so page-side
/// validation sees the new value.
const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Longer pause on confirmation pages, which enable their button only
/// after a server round trip.
const CONFIRM_DELAY: Duration = Duration::from_millis(300);

/// Drives one page through the sign-up flow. Each [`tick`] classifies
/// the current page and performs at most one action; pages that were
/// handled successfully are remembered by id and skipped afterwards.
///
/// [`tick`]: Controller::tick
pub struct Controller<P: PageAccessor, C: HostCoordinator> {
    page: P,
    coordinator: C,
    session: FlowSession,
}

impl<P: PageAccessor, C: HostCoordinator> Controller<P, C> {
    pub fn new(page: P, coordinator: C) -> Self {
        Self {
            page,
            coordinator,
            session: FlowSession::new(),
        }
    }

    pub fn session(&self) -> &FlowSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut FlowSession {
        &mut self.session
    }

    /// Tick until the teardown signal flips to true or its sender is
    /// dropped.
    pub async fn run(&mut self, tick_interval: Duration, mut teardown: watch::Receiver<bool>) {
        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = teardown.changed() => {
                    if changed.is_err() || *teardown.borrow() {
                        info!("automation loop stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One classification-and-act pass. Never returns an error: handler
    /// failures are reported to the coordinator and the page is left
    /// unrecorded so a later tick retries it.
    pub async fn tick(&mut self) {
        if !self.session.begin_tick() {
            debug!("previous tick still running, skipping");
            return;
        }
        if let Err(e) = self.process_page().await {
            warn!(error = %e, "page handler failed");
            self.coordinator.report_error(&e.to_string()).await;
        }
        self.session.end_tick();
    }

    async fn process_page(&mut self) -> Result<(), AutomationError> {
        let Some(account) = self.ensure_account().await else {
            debug!("no active registration task");
            return Ok(());
        };

        // Classify exactly once per tick; the recorded id and the
        // dispatched handler must agree even if the page mutates.
        let kind = classify::classify(&self.page);
        let page_id = classify::page_id(kind, &self.page.url());
        if self.session.is_processed(&page_id) {
            return Ok(());
        }

        // Consent overlays sit on top of every page; dismiss before acting.
        if self.page.click(selectors::COOKIE_ACCEPT) {
            debug!("dismissed cookie consent overlay");
        }

        debug!(%kind, %page_id, "classified page");

        let handled = match kind {
            PageKind::Login => self.handle_login(&account).await,
            PageKind::Name => self.handle_name(&account).await,
            PageKind::Verify => self.handle_verify(&account).await?,
            PageKind::Password => self.handle_password(&account).await,
            PageKind::DeviceConfirm => self.handle_device_confirm().await,
            PageKind::AllowAccess => self.handle_allow_access().await,
            PageKind::Complete => self.handle_complete().await,
            PageKind::Unknown => return Ok(()),
        };

        if handled {
            info!(%kind, "page handled");
            self.session.mark_processed(page_id);
        }
        Ok(())
    }

    /// Account data for the flow, fetched once and cached. A failed
    /// fetch is treated as "no task yet" and retried next tick.
    async fn ensure_account(&mut self) -> Option<AccountInfo> {
        if let Some(account) = self.session.account() {
            return Some(account.clone());
        }
        match self.coordinator.account_info().await {
            Ok(Some(account)) if account.has_email() => {
                info!(email = %account.email, "registration task attached");
                self.session.set_account(account.clone());
                Some(account)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "account lookup failed, will retry");
                None
            }
        }
    }

    async fn handle_login(&self, account: &AccountInfo) -> bool {
        self.coordinator.update_step("filling email address").await;
        if !self.page.fill(selectors::EMAIL_INPUT, &account.email) {
            return false;
        }
        sleep(SETTLE_DELAY).await;
        self.coordinator.update_step("submitting email").await;
        self.page.click(selectors::PRIMARY_BUTTON);
        true
    }

    async fn handle_name(&self, account: &AccountInfo) -> bool {
        let Some(name) = account.full_name.as_deref().filter(|n| !n.is_empty()) else {
            self.coordinator
                .report_error("name page shown but the task has no full name")
                .await;
            return false;
        };
        self.coordinator.update_step("filling full name").await;
        if !self.page.fill(selectors::NAME_INPUT, name) {
            return false;
        }
        sleep(SETTLE_DELAY).await;
        self.page.click(selectors::NAME_NEXT_BUTTON);
        true
    }

    async fn handle_verify(&mut self, _account: &AccountInfo) -> Result<bool, AutomationError> {
        let reply = match self.session.cached_code() {
            Some(code) => CodeReply::Code(code),
            None => {
                self.coordinator
                    .update_step("waiting for verification code")
                    .await;
                self.coordinator.verification_code().await?
            }
        };

        match reply {
            CodeReply::Code(code) => {
                self.session.cache_code(&code);
                self.coordinator.update_step("filling verification code").await;
                if !self.page.fill(selectors::CODE_INPUT, &code) {
                    return Ok(false);
                }
                sleep(SETTLE_DELAY).await;
                self.page.click(selectors::VERIFY_BUTTON);
                Ok(true)
            }
            CodeReply::ManualInput => {
                self.coordinator
                    .update_step("enter the emailed code manually")
                    .await;
                Ok(true)
            }
            CodeReply::Failed(reason) => {
                self.coordinator
                    .report_error(&format!("verification code retrieval failed: {reason}"))
                    .await;
                Ok(false)
            }
        }
    }

    async fn handle_password(&self, account: &AccountInfo) -> bool {
        let Some(password) = account.password.as_deref().filter(|p| !p.is_empty()) else {
            self.coordinator
                .report_error("password page shown but the task has no password")
                .await;
            return false;
        };
        self.coordinator.update_step("setting password").await;
        if !self.page.fill(selectors::PASSWORD_INPUT, password) {
            return false;
        }
        if self.page.is_visible(selectors::CONFIRM_PASSWORD_INPUT) {
            self.page.fill(selectors::CONFIRM_PASSWORD_INPUT, password);
        }
        sleep(SETTLE_DELAY).await;
        self.page.click(selectors::PRIMARY_BUTTON);
        true
    }

    async fn handle_device_confirm(&self) -> bool {
        sleep(CONFIRM_DELAY).await;
        if self.page.click(selectors::CONFIRM_DEVICE_SUBMIT)
            || self.page.click_button_with_text("Confirm")
        {
            self.coordinator.update_step("confirmed device code").await;
            return true;
        }
        false
    }

    async fn handle_allow_access(&self) -> bool {
        sleep(CONFIRM_DELAY).await;
        if self.page.click(selectors::ALLOW_BUTTON) || self.page.click_button_with_text("Allow") {
            self.coordinator.update_step("granted access").await;
            self.coordinator.auth_completed().await;
            return true;
        }
        false
    }

    async fn handle_complete(&self) -> bool {
        self.coordinator.update_step("authorization complete").await;
        self.coordinator.auth_completed().await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::FakePage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct FakeCoordinator {
        inner: Arc<CoordinatorInner>,
    }

    struct CoordinatorInner {
        account: Mutex<Option<AccountInfo>>,
        code_reply: Mutex<Option<CodeReply>>,
        steps: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
        completed: AtomicBool,
        code_calls: AtomicU32,
    }

    impl FakeCoordinator {
        fn with_account(email: &str, full_name: Option<&str>, password: Option<&str>) -> Self {
            Self {
                inner: Arc::new(CoordinatorInner {
                    account: Mutex::new(Some(AccountInfo {
                        email: email.to_string(),
                        full_name: full_name.map(String::from),
                        password: password.map(String::from),
                    })),
                    code_reply: Mutex::new(None),
                    steps: Mutex::new(Vec::new()),
                    errors: Mutex::new(Vec::new()),
                    completed: AtomicBool::new(false),
                    code_calls: AtomicU32::new(0),
                }),
            }
        }

        fn set_code_reply(&self, reply: CodeReply) {
            *self.inner.code_reply.lock().unwrap() = Some(reply);
        }
    }

    #[async_trait]
    impl HostCoordinator for FakeCoordinator {
        async fn account_info(&self) -> Result<Option<AccountInfo>, AutomationError> {
            Ok(self.inner.account.lock().unwrap().clone())
        }

        async fn verification_code(&self) -> Result<CodeReply, AutomationError> {
            self.inner.code_calls.fetch_add(1, Ordering::SeqCst);
            match self.inner.code_reply.lock().unwrap().clone() {
                Some(reply) => Ok(reply),
                None => Err(AutomationError::Coordinator("code channel down".into())),
            }
        }

        async fn update_step(&self, text: &str) {
            self.inner.steps.lock().unwrap().push(text.to_string());
        }

        async fn report_error(&self, text: &str) {
            self.inner.errors.lock().unwrap().push(text.to_string());
        }

        async fn auth_completed(&self) {
            self.inner.completed.store(true, Ordering::SeqCst);
        }
    }

    fn login_page() -> FakePage {
        let page = FakePage::new("https://signin.example.com/oauth", "signin.example.com", "");
        page.add_input(r#"input[type="email"]"#);
        page.add_button(r#"button[type="submit"]"#, "Next");
        page
    }

    #[tokio::test]
    async fn test_login_page_filled_and_submitted_once() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        let mut controller = Controller::new(login_page(), coordinator.clone());

        controller.tick().await;

        let email = controller.page.element(r#"input[type="email"]"#).unwrap();
        assert_eq!(email.value, "user@example.com");
        assert_eq!(email.fill_count, 1);
        let submit = controller.page.element(r#"button[type="submit"]"#).unwrap();
        assert_eq!(submit.click_count, 1);
    }

    #[tokio::test]
    async fn test_recorded_id_carries_dispatched_kind() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        let mut controller = Controller::new(login_page(), coordinator.clone());

        controller.tick().await;

        // The id written to the session names the kind that was handled.
        assert!(controller
            .session()
            .is_processed("login:https://signin.example.com/oauth"));
        assert_eq!(
            controller
                .page
                .element(r#"input[type="email"]"#)
                .unwrap()
                .fill_count,
            1
        );
    }

    #[tokio::test]
    async fn test_handled_page_not_reprocessed() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        let mut controller = Controller::new(login_page(), coordinator.clone());

        controller.tick().await;
        controller.tick().await;
        controller.tick().await;

        let email = controller.page.element(r#"input[type="email"]"#).unwrap();
        assert_eq!(email.fill_count, 1);
        let submit = controller.page.element(r#"button[type="submit"]"#).unwrap();
        assert_eq!(submit.click_count, 1);
    }

    #[tokio::test]
    async fn test_failed_page_retried_next_tick() {
        let coordinator = FakeCoordinator::with_account("user@example.com", Some("Dana Fox"), None);
        let page = FakePage::new(
            "https://signin.example.com/signup/enter",
            "signin.example.com",
            "",
        );
        // Name input not rendered yet.
        page.add_button(r#"button[type="submit"]"#, "Continue");
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;
        assert!(controller
            .page
            .element(r#"button[type="submit"]"#)
            .unwrap()
            .click_count
            == 0);

        controller.page.add_input(r#"input[name="fullName"]"#);
        controller.tick().await;

        let name = controller.page.element(r#"input[name="fullName"]"#).unwrap();
        assert_eq!(name.value, "Dana Fox");
        assert_eq!(
            controller
                .page
                .element(r#"button[type="submit"]"#)
                .unwrap()
                .click_count,
            1
        );
    }

    #[tokio::test]
    async fn test_verify_page_fills_fetched_code() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        coordinator.set_code_reply(CodeReply::Code("482913".into()));
        let page = FakePage::new(
            "https://signin.example.com/verify-otp",
            "signin.example.com",
            "",
        );
        page.add_input(r#"input[name="code"]"#);
        page.add_button(r#"button[type="submit"]"#, "Verify");
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;

        let code = controller.page.element(r#"input[name="code"]"#).unwrap();
        assert_eq!(code.value, "482913");
        assert_eq!(controller.session().cached_code().as_deref(), Some("482913"));
        assert_eq!(coordinator.inner.code_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_manual_input_marks_page_handled() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        coordinator.set_code_reply(CodeReply::ManualInput);
        let page = FakePage::new(
            "https://signin.example.com/verify-otp",
            "signin.example.com",
            "",
        );
        page.add_input(r#"input[name="code"]"#);
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;
        controller.tick().await;

        // Asked once, then left alone for the operator.
        assert_eq!(coordinator.inner.code_calls.load(Ordering::SeqCst), 1);
        let code = controller.page.element(r#"input[name="code"]"#).unwrap();
        assert_eq!(code.fill_count, 0);
        let steps = coordinator.inner.steps.lock().unwrap();
        assert!(steps.iter().any(|s| s.contains("manually")));
    }

    #[tokio::test]
    async fn test_code_failure_reported_and_retried() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        coordinator.set_code_reply(CodeReply::Failed("mailbox timeout".into()));
        let page = FakePage::new(
            "https://signin.example.com/verify-otp",
            "signin.example.com",
            "",
        );
        page.add_input(r#"input[name="code"]"#);
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;
        controller.tick().await;

        assert_eq!(coordinator.inner.code_calls.load(Ordering::SeqCst), 2);
        let errors = coordinator.inner.errors.lock().unwrap();
        assert!(errors.iter().any(|e| e.contains("mailbox timeout")));
    }

    #[tokio::test]
    async fn test_coordinator_error_reported_page_unrecorded() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        // No scripted reply, so verification_code errors.
        let page = FakePage::new(
            "https://signin.example.com/verify-otp",
            "signin.example.com",
            "",
        );
        page.add_input(r#"input[name="code"]"#);
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;

        let errors = coordinator.inner.errors.lock().unwrap();
        assert!(errors.iter().any(|e| e.contains("code channel down")));
        assert!(!controller
            .session()
            .is_processed("verify:https://signin.example.com/verify-otp"));
    }

    #[tokio::test]
    async fn test_password_pair_both_filled() {
        let coordinator =
            FakeCoordinator::with_account("user@example.com", None, Some("hunter2hunter2"));
        let page = FakePage::new("https://signin.example.com/pw", "signin.example.com", "");
        page.add_input(r#"input[name="password"]"#);
        page.add_input(r#"input[name="confirmPassword"]"#);
        page.add_button(r#"button[type="submit"]"#, "Continue");
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;

        let first = controller.page.element(r#"input[name="password"]"#).unwrap();
        let second = controller
            .page
            .element(r#"input[name="confirmPassword"]"#)
            .unwrap();
        assert_eq!(first.value, "hunter2hunter2");
        assert_eq!(second.value, "hunter2hunter2");
    }

    #[tokio::test]
    async fn test_device_confirm_falls_back_to_text_scan() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        let page = FakePage::new(
            "https://device.sso.awsapps.com/device",
            "device.sso.awsapps.com",
            "Please confirm this code matches",
        );
        // No known selector, only a label to find.
        page.add_button("button.odd-markup", "Confirm and continue");
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;

        let button = controller.page.element("button.odd-markup").unwrap();
        assert_eq!(button.click_count, 1);
    }

    #[tokio::test]
    async fn test_allow_access_signals_completion() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        let page = FakePage::new(
            "https://device.sso.awsapps.com/authorize",
            "device.sso.awsapps.com",
            "Allow access",
        );
        page.add_button("button#cli_login_button", "Allow access");
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;

        assert!(coordinator.inner.completed.load(Ordering::SeqCst));
        assert_eq!(
            controller
                .page
                .element("button#cli_login_button")
                .unwrap()
                .click_count,
            1
        );
    }

    #[tokio::test]
    async fn test_cookie_overlay_dismissed_before_acting() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        let page = login_page();
        page.add_button(r#"button[data-id="awsccc-cb-btn-accept"]"#, "Accept all");
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;

        let consent = controller
            .page
            .element(r#"button[data-id="awsccc-cb-btn-accept"]"#)
            .unwrap();
        assert_eq!(consent.click_count, 1);
    }

    #[tokio::test]
    async fn test_no_task_means_no_action() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        *coordinator.inner.account.lock().unwrap() = None;
        let mut controller = Controller::new(login_page(), coordinator.clone());

        controller.tick().await;

        let email = controller.page.element(r#"input[type="email"]"#).unwrap();
        assert_eq!(email.fill_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_page_left_alone() {
        let coordinator = FakeCoordinator::with_account("user@example.com", None, None);
        let page = FakePage::new("https://signin.example.com/help", "signin.example.com", "");
        let mut controller = Controller::new(page, coordinator.clone());

        controller.tick().await;

        assert!(coordinator.inner.steps.lock().unwrap().is_empty());
        assert!(coordinator.inner.errors.lock().unwrap().is_empty());
    }
}
