use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
}

/// Disposable-inbox service (mail worker) settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MailboxConfig {
    pub worker_domain: String,
    pub email_domain: String,
    pub admin_password: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CaptchaConfig {
    /// One of: yescaptcha | 2captcha | capsolver | local
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Only used by the local solver.
    #[serde(default)]
    pub solver_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    /// sequential | random
    #[serde(default = "default_rotate_mode")]
    pub rotate_mode: String,
    /// Newline-delimited endpoint list, one per line.
    #[serde(default)]
    pub endpoint_list: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutomationConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_code_wait_timeout_ms")]
    pub code_wait_timeout_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            code_wait_timeout_ms: default_code_wait_timeout_ms(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_rotate_mode() -> String {
    "sequential".to_string()
}
fn default_tick_interval_ms() -> u64 {
    500
}
fn default_code_wait_timeout_ms() -> u64 {
    30_000
}
