pub mod transport;

pub use transport::{HttpTransport, VendorTransport};

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};
use url::Url;

use regpilot_core::config::CaptchaConfig;

#[derive(Error, Debug)]
pub enum CaptchaError {
    /// Transport failure. Fatal when creating a task; logged and skipped
    /// while polling for a result.
    #[error("captcha network error: {0}")]
    Network(String),

    /// Vendor-reported business failure (malformed task, bad key). Not
    /// retried within a solve attempt.
    #[error("captcha provider error: {0}")]
    Provider(String),

    /// Construction-time misconfiguration.
    #[error("captcha config error: {0}")]
    Config(String),
}

/// Solving vendors, closed set. Each variant holds only its own settings.
#[derive(Debug, Clone)]
pub enum SolverBackend {
    YesCaptcha { api_key: String },
    TwoCaptcha { api_key: String },
    CapSolver { api_key: String },
    LocalSolver { base_url: String },
}

impl SolverBackend {
    pub fn name(&self) -> &'static str {
        match self {
            SolverBackend::YesCaptcha { .. } => "yescaptcha",
            SolverBackend::TwoCaptcha { .. } => "2captcha",
            SolverBackend::CapSolver { .. } => "capsolver",
            SolverBackend::LocalSolver { .. } => "local",
        }
    }

    fn api_base(&self) -> &str {
        match self {
            SolverBackend::YesCaptcha { .. } => "https://api.yescaptcha.com",
            SolverBackend::TwoCaptcha { .. } => "https://2captcha.com",
            SolverBackend::CapSolver { .. } => "https://api.capsolver.com",
            SolverBackend::LocalSolver { base_url } => base_url,
        }
    }
}

/// Extra per-task options forwarded to the vendor.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Vendor task type; each vendor has its own default.
    pub task_type: Option<String>,
    pub action: Option<String>,
    pub data: Option<String>,
}

/// One unit of work submitted to a vendor, polled by id.
#[derive(Debug, Clone)]
pub struct CaptchaTask {
    pub provider: &'static str,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
}

enum PollOutcome {
    Ready(String),
    Pending,
    Failed(String),
}

pub const DEFAULT_MAX_RETRIES: u32 = 30;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(5_000);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2_000);

const VENDOR_TIMEOUT: Duration = Duration::from_secs(30);

/// One create-task/poll-result/solve contract over all vendors.
pub struct CaptchaSolver {
    backend: SolverBackend,
    transport: Box<dyn VendorTransport>,
}

impl CaptchaSolver {
    /// Select the backend from config. An unrecognized provider name is a
    /// hard construction-time failure.
    pub fn from_config(config: &CaptchaConfig) -> Result<Self, CaptchaError> {
        let require_key = |name: &str| {
            config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| CaptchaError::Config(format!("{} requires api_key", name)))
        };

        let backend = match config.provider.to_lowercase().as_str() {
            "yescaptcha" => SolverBackend::YesCaptcha {
                api_key: require_key("yescaptcha")?,
            },
            "2captcha" => SolverBackend::TwoCaptcha {
                api_key: require_key("2captcha")?,
            },
            "capsolver" => SolverBackend::CapSolver {
                api_key: require_key("capsolver")?,
            },
            "local" => SolverBackend::LocalSolver {
                base_url: config
                    .solver_url
                    .clone()
                    .unwrap_or_else(|| "http://127.0.0.1:5072".to_string()),
            },
            other => {
                return Err(CaptchaError::Config(format!(
                    "unknown captcha provider: {}",
                    other
                )))
            }
        };

        Ok(Self {
            backend,
            transport: Box::new(HttpTransport::new(VENDOR_TIMEOUT)?),
        })
    }

    pub fn with_transport(backend: SolverBackend, transport: Box<dyn VendorTransport>) -> Self {
        Self { backend, transport }
    }

    /// Submit a task to the vendor. One synchronous request; a non-success
    /// status or vendor error code fails the solve attempt.
    pub async fn create_task(
        &self,
        site_url: &str,
        site_key: &str,
        options: &TaskOptions,
    ) -> Result<CaptchaTask, CaptchaError> {
        info!(provider = self.backend.name(), site_url, "creating captcha task");

        let task_id = match &self.backend {
            SolverBackend::YesCaptcha { api_key } => {
                let task_type = options
                    .task_type
                    .as_deref()
                    .unwrap_or("TurnstileTaskProxyless");
                let mut task = json!({
                    "type": task_type,
                    "websiteURL": site_url,
                    "websiteKey": site_key,
                });
                if let Some(action) = &options.action {
                    task["action"] = json!(action);
                }
                if let Some(data) = &options.data {
                    task["data"] = json!(data);
                }
                let url = format!("{}/createTask", self.backend.api_base());
                let reply = self
                    .transport
                    .post_json(&url, json!({ "clientKey": api_key, "task": task }))
                    .await?;
                parse_error_id(&reply)?;
                take_task_id(&reply)?
            }
            SolverBackend::CapSolver { api_key } => {
                let task_type = options
                    .task_type
                    .as_deref()
                    .unwrap_or("AntiTurnstileTaskProxyLess");
                let mut task = json!({
                    "type": task_type,
                    "websiteURL": site_url,
                    "websiteKey": site_key,
                });
                if let Some(data) = &options.data {
                    task["metadata"] = json!(data);
                }
                let url = format!("{}/createTask", self.backend.api_base());
                let reply = self
                    .transport
                    .post_json(&url, json!({ "clientKey": api_key, "task": task }))
                    .await?;
                parse_error_id(&reply)?;
                take_task_id(&reply)?
            }
            SolverBackend::TwoCaptcha { api_key } => {
                let mut url = Url::parse(&format!("{}/in.php", self.backend.api_base()))
                    .map_err(|e| CaptchaError::Config(e.to_string()))?;
                {
                    let mut pairs = url.query_pairs_mut();
                    pairs
                        .append_pair("key", api_key)
                        .append_pair("method", options.task_type.as_deref().unwrap_or("turnstile"))
                        .append_pair("sitekey", site_key)
                        .append_pair("pageurl", site_url)
                        .append_pair("json", "1");
                    if let Some(action) = &options.action {
                        pairs.append_pair("action", action);
                    }
                    if let Some(data) = &options.data {
                        pairs.append_pair("data", data);
                    }
                }
                let reply = self.transport.get_json(url.as_str()).await?;
                if reply.get("status").and_then(Value::as_i64) != Some(1) {
                    return Err(CaptchaError::Provider(format!(
                        "task rejected: {}",
                        reply.get("request").and_then(Value::as_str).unwrap_or("?")
                    )));
                }
                reply
                    .get("request")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .ok_or_else(|| CaptchaError::Provider("missing task id".into()))?
            }
            SolverBackend::LocalSolver { base_url } => {
                let mut url = Url::parse(&format!("{}/turnstile", base_url))
                    .map_err(|e| CaptchaError::Config(e.to_string()))?;
                url.query_pairs_mut()
                    .append_pair("url", site_url)
                    .append_pair("sitekey", site_key);
                let reply = self.transport.get_json(url.as_str()).await?;
                take_task_id(&reply)?
            }
        };

        Ok(CaptchaTask {
            provider: self.backend.name(),
            task_id,
            created_at: Utc::now(),
        })
    }

    /// Poll the vendor until a token or a terminal failure. Transport
    /// failures are logged and consume a retry slot; exhaustion yields
    /// `None`.
    pub async fn poll_result(
        &self,
        task_id: &str,
        max_retries: u32,
        initial_delay: Duration,
        retry_delay: Duration,
    ) -> Option<String> {
        sleep(initial_delay).await;

        for attempt in 1..=max_retries {
            match self.poll_once(task_id).await {
                Ok(PollOutcome::Ready(token)) => return Some(token),
                Ok(PollOutcome::Pending) => {}
                Ok(PollOutcome::Failed(reason)) => {
                    error!(provider = self.backend.name(), "solve failed: {}", reason);
                    return None;
                }
                Err(e) => {
                    warn!(provider = self.backend.name(), attempt, "poll failed: {}", e);
                }
            }
            sleep(retry_delay).await;
        }

        warn!(
            provider = self.backend.name(),
            max_retries, "no captcha token after retries"
        );
        None
    }

    async fn poll_once(&self, task_id: &str) -> Result<PollOutcome, CaptchaError> {
        match &self.backend {
            SolverBackend::YesCaptcha { api_key } | SolverBackend::CapSolver { api_key } => {
                let url = format!("{}/getTaskResult", self.backend.api_base());
                let reply = self
                    .transport
                    .post_json(&url, json!({ "clientKey": api_key, "taskId": task_id }))
                    .await?;

                if reply.get("errorId").and_then(Value::as_i64).unwrap_or(0) != 0 {
                    let reason = reply
                        .get("errorDescription")
                        .and_then(Value::as_str)
                        .unwrap_or("vendor error");
                    return Ok(PollOutcome::Failed(reason.to_string()));
                }
                match reply.get("status").and_then(Value::as_str) {
                    Some("ready") => match solution_token(&reply) {
                        Some(token) => Ok(PollOutcome::Ready(token)),
                        None => Ok(PollOutcome::Failed("ready but no token".into())),
                    },
                    Some("processing") => Ok(PollOutcome::Pending),
                    other => {
                        warn!(status = ?other, "unexpected vendor status");
                        Ok(PollOutcome::Pending)
                    }
                }
            }
            SolverBackend::TwoCaptcha { api_key } => {
                let mut url = Url::parse(&format!("{}/res.php", self.backend.api_base()))
                    .map_err(|e| CaptchaError::Config(e.to_string()))?;
                url.query_pairs_mut()
                    .append_pair("key", api_key)
                    .append_pair("action", "get")
                    .append_pair("id", task_id)
                    .append_pair("json", "1");
                let reply = self.transport.get_json(url.as_str()).await?;

                if reply.get("status").and_then(Value::as_i64) == Some(1) {
                    match reply.get("request").and_then(Value::as_str) {
                        Some(token) => Ok(PollOutcome::Ready(token.to_string())),
                        None => Ok(PollOutcome::Failed("ready but no token".into())),
                    }
                } else {
                    match reply.get("request").and_then(Value::as_str) {
                        Some("CAPCHA_NOT_READY") => Ok(PollOutcome::Pending),
                        Some(other) => Ok(PollOutcome::Failed(other.to_string())),
                        None => Ok(PollOutcome::Pending),
                    }
                }
            }
            SolverBackend::LocalSolver { base_url } => {
                let mut url = Url::parse(&format!("{}/result", base_url))
                    .map_err(|e| CaptchaError::Config(e.to_string()))?;
                url.query_pairs_mut().append_pair("id", task_id);
                let reply = self.transport.get_json(url.as_str()).await?;

                match solution_token(&reply) {
                    Some(token) if token != "CAPTCHA_FAIL" => Ok(PollOutcome::Ready(token)),
                    Some(_) => Ok(PollOutcome::Failed("local solver gave up".into())),
                    None => Ok(PollOutcome::Pending),
                }
            }
        }
    }

    /// Create a task and poll for its token with the vendor defaults.
    pub async fn solve(
        &self,
        site_url: &str,
        site_key: &str,
        options: &TaskOptions,
    ) -> Result<Option<String>, CaptchaError> {
        let task = self.create_task(site_url, site_key, options).await?;
        Ok(self
            .poll_result(
                &task.task_id,
                DEFAULT_MAX_RETRIES,
                DEFAULT_INITIAL_DELAY,
                DEFAULT_RETRY_DELAY,
            )
            .await)
    }
}

fn parse_error_id(reply: &Value) -> Result<(), CaptchaError> {
    if reply.get("errorId").and_then(Value::as_i64).unwrap_or(0) != 0 {
        let reason = reply
            .get("errorDescription")
            .and_then(Value::as_str)
            .unwrap_or("vendor error");
        return Err(CaptchaError::Provider(reason.to_string()));
    }
    Ok(())
}

/// Task ids come back as strings or numbers depending on the vendor.
fn take_task_id(reply: &Value) -> Result<String, CaptchaError> {
    match reply.get("taskId") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(CaptchaError::Provider("missing taskId".into())),
    }
}

fn solution_token(reply: &Value) -> Option<String> {
    reply
        .get("solution")
        .and_then(|s| s.get("token"))
        .and_then(Value::as_str)
        .map(String::from)
}
