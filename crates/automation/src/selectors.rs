//! CSS selector groups for the sign-up pages. Each constant is a
//! comma-separated candidate list; [`crate::PageAccessor`] implementations
//! try them left to right and act on the first visible match.

pub const COOKIE_ACCEPT: &str = r#"button[data-id="awsccc-cb-btn-accept"]"#;

pub const EMAIL_INPUT: &str = r#"input[placeholder="username@example.com"], input[name="email"], input[type="email"], input[autocomplete="username"]"#;

pub const NAME_INPUT: &str = r#"input[placeholder*="name" i], input[name="name"], input[name="fullName"]"#;

pub const CODE_INPUT: &str = r#"input[placeholder*="digit" i], input[type="text"][maxlength="6"], input[name="code"], input[name="otp"]"#;

pub const PASSWORD_INPUT: &str = r#"input[placeholder="Enter password"], input[name="password"], input[type="password"]:not([name="confirmPassword"])"#;

/// Stricter variant used for page detection, where an ordinary login
/// password field must not count as the set-password step.
pub const PASSWORD_INPUT_DETECT: &str = r#"input[placeholder="Enter password"], input[name="password"], input[type="password"][autocomplete="new-password"]"#;

pub const CONFIRM_PASSWORD_INPUT: &str = r#"input[placeholder="Re-enter password"], input[name="confirmPassword"]"#;

pub const PRIMARY_BUTTON: &str = r#"button[data-testid="test-primary-button"], button[type="submit"], button.awsui-button-variant-primary"#;

pub const NAME_NEXT_BUTTON: &str = r#"button[data-testid="signup-next-button"], button[type="submit"], button.awsui-button-variant-primary"#;

pub const VERIFY_BUTTON: &str = r#"button[data-testid="email-verification-verify-button"], button[type="submit"], button.awsui-button-variant-primary"#;

pub const ALLOW_BUTTON: &str = r#"button#cli_login_button, button[data-testid="allow-access-button"], input[type="submit"][value*="Allow"]"#;

pub const CONFIRM_DEVICE_BUTTON: &str = r#"button#cli_verification_btn, button[data-testid="confirm-device-button"]"#;

/// Click targets for the device-confirm step, broadened with a plain
/// submit button before falling back to a text scan.
pub const CONFIRM_DEVICE_SUBMIT: &str = r#"button#cli_verification_btn, button[data-testid="confirm-device-button"], button[type="submit"]"#;
