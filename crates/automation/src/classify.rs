use std::fmt;

use url::Url;

use crate::page::PageAccessor;
use crate::selectors;

/// Which step of the sign-up flow a page shows. Ordering of the
/// detection rules matters: later pages carry leftovers of earlier
/// ones (a verify page still has text inputs, the completion page may
/// still show an allow button), so the most specific checks run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Login,
    Name,
    Verify,
    Password,
    DeviceConfirm,
    AllowAccess,
    Complete,
    Unknown,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageKind::Login => "login",
            PageKind::Name => "name",
            PageKind::Verify => "verify",
            PageKind::Password => "password",
            PageKind::DeviceConfirm => "device-confirm",
            PageKind::AllowAccess => "allow-access",
            PageKind::Complete => "complete",
            PageKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

const VERIFY_URL_MARKERS: &[&str] = &["verify-otp", "verification", "verifyEmail"];
const NAME_URL_MARKERS: &[&str] = &["enter-email", "signup/enter", "createAccount"];

pub fn classify(page: &dyn PageAccessor) -> PageKind {
    let url = page.url();
    let body = page.body_text();
    let body_lower = body.to_lowercase();

    if body.contains("successfully authorized") || body.contains("Authorization complete") {
        return PageKind::Complete;
    }

    if page.is_visible(selectors::ALLOW_BUTTON)
        || (body_lower.contains("allow access") && page.hostname().contains("awsapps.com"))
    {
        return PageKind::AllowAccess;
    }

    if page.is_visible(selectors::CONFIRM_DEVICE_BUTTON)
        || body.contains("Confirm and continue")
        || body_lower.contains("confirm this code")
    {
        return PageKind::DeviceConfirm;
    }

    if VERIFY_URL_MARKERS.iter().any(|m| url.contains(m)) {
        return PageKind::Verify;
    }

    if NAME_URL_MARKERS.iter().any(|m| url.contains(m)) {
        return PageKind::Name;
    }

    // The set-password step is the only one showing the new-password
    // pair together.
    if page.is_visible(selectors::PASSWORD_INPUT_DETECT)
        && page.is_visible(selectors::CONFIRM_PASSWORD_INPUT)
    {
        return PageKind::Password;
    }

    if page.is_visible(selectors::EMAIL_INPUT) {
        return PageKind::Login;
    }

    PageKind::Unknown
}

/// Stable identity of a page within one flow: a kind plus the URL with
/// its query stripped but the fragment kept. Query parameters churn on
/// reload (nonces, state tokens) while the fragment routes in-app
/// views, so two loads of the same step compare equal. Takes the kind
/// the caller already classified so the recorded id and the dispatched
/// handler always agree on one page read.
pub fn page_id(kind: PageKind, url: &str) -> String {
    let normalized = match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => url.split('?').next().unwrap_or("").to_string(),
    };
    format!("{}:{}", kind, normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::FakePage;

    #[test]
    fn test_email_field_means_login() {
        let page = FakePage::new("https://signin.example.com/oauth", "signin.example.com", "");
        page.add_input(r#"input[type="email"]"#);
        assert_eq!(classify(&page), PageKind::Login);
    }

    #[test]
    fn test_verify_url_beats_inputs() {
        let page = FakePage::new(
            "https://signin.example.com/verify-otp?sid=1",
            "signin.example.com",
            "",
        );
        page.add_input(r#"input[type="email"]"#);
        assert_eq!(classify(&page), PageKind::Verify);
    }

    #[test]
    fn test_name_page_by_url() {
        let page = FakePage::new(
            "https://signin.example.com/signup/enter?step=2",
            "signin.example.com",
            "",
        );
        assert_eq!(classify(&page), PageKind::Name);
    }

    #[test]
    fn test_password_pair_required() {
        let page = FakePage::new("https://signin.example.com/pw", "signin.example.com", "");
        page.add_input(r#"input[name="password"]"#);
        assert_eq!(classify(&page), PageKind::Unknown);

        page.add_input(r#"input[name="confirmPassword"]"#);
        assert_eq!(classify(&page), PageKind::Password);
    }

    #[test]
    fn test_allow_text_requires_awsapps_host() {
        let elsewhere = FakePage::new("https://x.example.com/", "x.example.com", "Allow access");
        assert_eq!(classify(&elsewhere), PageKind::Unknown);

        let device = FakePage::new(
            "https://device.sso.awsapps.com/",
            "device.sso.awsapps.com",
            "Allow access",
        );
        assert_eq!(classify(&device), PageKind::AllowAccess);
    }

    #[test]
    fn test_complete_text_beats_allow_button() {
        let page = FakePage::new(
            "https://device.sso.awsapps.com/",
            "device.sso.awsapps.com",
            "You have successfully authorized the request",
        );
        page.add_button("button#cli_login_button", "Allow access");
        assert_eq!(classify(&page), PageKind::Complete);
    }

    #[test]
    fn test_allow_button_beats_confirm_text() {
        let page = FakePage::new(
            "https://device.sso.awsapps.com/",
            "device.sso.awsapps.com",
            "Confirm and continue",
        );
        page.add_button(r#"button[data-testid="allow-access-button"]"#, "Allow");
        assert_eq!(classify(&page), PageKind::AllowAccess);
    }

    #[test]
    fn test_page_id_strips_query_keeps_fragment() {
        let page = FakePage::new(
            "https://signin.example.com/verify-otp?nonce=abc123#panel",
            "signin.example.com",
            "",
        );
        let kind = classify(&page);
        assert_eq!(
            page_id(kind, &page.url()),
            "verify:https://signin.example.com/verify-otp#panel"
        );

        page.set_url("https://signin.example.com/verify-otp?nonce=zzz999#panel");
        assert_eq!(
            page_id(kind, &page.url()),
            "verify:https://signin.example.com/verify-otp#panel"
        );
    }
}
