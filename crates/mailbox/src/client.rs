use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use regpilot_core::config::MailboxConfig;

use crate::extract::extract_code;
use crate::MailboxError;

/// A freshly created disposable inbox.
#[derive(Debug, Clone)]
pub struct NewInbox {
    pub token: String,
    pub address: String,
}

/// One inbox plus its bearer token. Lives for a single polling wait and is
/// discarded after code extraction or timeout.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub token: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// Result of the composed create + wait + extract call.
#[derive(Debug, Clone)]
pub struct FetchedCode {
    pub address: String,
    pub code: String,
    pub token: String,
}

/// Low-level mail worker API. Split out so the polling/retry logic can be
/// exercised against a scripted implementation.
#[async_trait]
pub trait MailApi: Send + Sync {
    async fn create_address(&self) -> Result<NewInbox, MailboxError>;

    /// Raw content of the newest message, or `None` if the inbox is empty.
    async fn first_message(&self, token: &str) -> Result<Option<String>, MailboxError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewAddressRequest<'a> {
    enable_prefix: bool,
    name: &'a str,
    domain: &'a str,
}

#[derive(Deserialize)]
struct NewAddressReply {
    jwt: String,
    address: String,
}

#[derive(Deserialize)]
struct MailListReply {
    #[serde(default)]
    results: Vec<MailEntry>,
}

#[derive(Deserialize, Default)]
struct MailEntry {
    raw: Option<String>,
    text: Option<String>,
    body: Option<String>,
    content: Option<String>,
    html: Option<String>,
}

impl MailEntry {
    /// Workers differ in which field carries the payload.
    fn into_content(self) -> Option<String> {
        self.raw
            .or(self.text)
            .or(self.body)
            .or(self.content)
            .or(self.html)
    }
}

/// HTTP client for the mail worker admin/inbox API.
pub struct HttpMailApi {
    http: reqwest::Client,
    worker_domain: String,
    email_domain: String,
    admin_password: String,
}

impl HttpMailApi {
    pub fn new(config: &MailboxConfig) -> Result<Self, MailboxError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| MailboxError::Network(e.to_string()))?;

        Ok(Self {
            http,
            worker_domain: config.worker_domain.clone(),
            email_domain: config.email_domain.clone(),
            admin_password: config.admin_password.clone(),
        })
    }

    /// Random local part: a few letters, some digits, optional letter tail.
    fn random_local_part() -> String {
        let mut rng = rand::thread_rng();
        let mut name = String::new();
        for _ in 0..rng.gen_range(4..=6) {
            name.push(rng.gen_range(b'a'..=b'z') as char);
        }
        for _ in 0..rng.gen_range(1..=3) {
            name.push(rng.gen_range(b'0'..=b'9') as char);
        }
        for _ in 0..rng.gen_range(0..=5) {
            name.push(rng.gen_range(b'a'..=b'z') as char);
        }
        name
    }
}

#[async_trait]
impl MailApi for HttpMailApi {
    async fn create_address(&self) -> Result<NewInbox, MailboxError> {
        let url = format!("https://{}/admin/new_address", self.worker_domain);
        let name = Self::random_local_part();

        let response = self
            .http
            .post(&url)
            .header("x-admin-auth", &self.admin_password)
            .json(&NewAddressRequest {
                enable_prefix: true,
                name: &name,
                domain: &self.email_domain,
            })
            .send()
            .await
            .map_err(|e| MailboxError::Network(format!("create inbox: {}", e)))?;

        match response.status().as_u16() {
            200 => {
                let reply: NewAddressReply = response
                    .json()
                    .await
                    .map_err(|e| MailboxError::Network(format!("create inbox body: {}", e)))?;
                Ok(NewInbox {
                    token: reply.jwt,
                    address: reply.address,
                })
            }
            401 => {
                let text = response.text().await.unwrap_or_default();
                Err(MailboxError::Auth(format!("admin credential rejected: {}", text)))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                error!(status, "create inbox returned error: {}", text);
                Err(MailboxError::Network(format!("create inbox: HTTP {}", status)))
            }
        }
    }

    async fn first_message(&self, token: &str) -> Result<Option<String>, MailboxError> {
        let url = format!("https://{}/api/mails?limit=10&offset=0", self.worker_domain);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MailboxError::Network(format!("fetch mail: {}", e)))?;

        match response.status().as_u16() {
            200 => {
                let reply: MailListReply = response
                    .json()
                    .await
                    .map_err(|e| MailboxError::Network(format!("fetch mail body: {}", e)))?;
                Ok(reply
                    .results
                    .into_iter()
                    .next()
                    .and_then(MailEntry::into_content))
            }
            401 => {
                let text = response.text().await.unwrap_or_default();
                Err(MailboxError::Auth(format!("inbox token invalid or expired: {}", text)))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                error!(status, "fetch mail returned error: {}", text);
                Err(MailboxError::Network(format!("fetch mail: HTTP {}", status)))
            }
        }
    }
}

/// Maximum backoff between polls after consecutive network failures.
const MAX_POLL_BACKOFF: Duration = Duration::from_secs(10);

/// Disposable-inbox client: create an inbox, wait for a delivered message,
/// extract a numeric code.
pub struct MailboxClient {
    api: Box<dyn MailApi>,
    max_retries: u32,
    retry_delay: Duration,
}

impl MailboxClient {
    pub fn new(config: &MailboxConfig) -> Result<Self, MailboxError> {
        Ok(Self {
            api: Box::new(HttpMailApi::new(config)?),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn with_api(api: Box<dyn MailApi>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            api,
            max_retries,
            retry_delay,
        }
    }

    /// Create a disposable inbox. The initial attempt plus up to
    /// `max_retries` retries on network failures, with linearly increasing
    /// backoff; auth failures surface immediately.
    pub async fn create_inbox(&self) -> Result<VerificationSession, MailboxError> {
        let mut last = String::new();
        for attempt in 0..=self.max_retries {
            match self.api.create_address().await {
                Ok(inbox) => {
                    return Ok(VerificationSession {
                        token: inbox.token,
                        address: inbox.address,
                        created_at: Utc::now(),
                    })
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, "create inbox failed: {}", e);
                    last = e.to_string();
                    if attempt < self.max_retries {
                        sleep(self.retry_delay * (attempt + 1)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(MailboxError::Network(format!(
            "create inbox failed after {} retries: {}",
            self.max_retries, last
        )))
    }

    /// One retry-wrapped fetch of the newest message. Same budget as
    /// `create_inbox`: one attempt plus `max_retries` retries.
    pub async fn fetch_first_message(&self, token: &str) -> Result<Option<String>, MailboxError> {
        let mut last = String::new();
        for attempt in 0..=self.max_retries {
            match self.api.first_message(token).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() => {
                    warn!(attempt, "fetch message failed: {}", e);
                    last = e.to_string();
                    if attempt < self.max_retries {
                        sleep(self.retry_delay * (attempt + 1)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(MailboxError::Network(format!(
            "fetch message failed after {} retries: {}",
            self.max_retries, last
        )))
    }

    /// Poll until a message arrives or `timeout` elapses. Returns `Ok(None)`
    /// on timeout or when consecutive network failures hit the retry bound;
    /// auth errors propagate immediately.
    pub async fn wait_for_message(
        &self,
        token: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Option<String>, MailboxError> {
        let start = Instant::now();
        let mut failures: u32 = 0;

        while start.elapsed() < timeout {
            match self.fetch_first_message(token).await {
                Ok(Some(content)) => return Ok(Some(content)),
                Ok(None) => {
                    failures = 0;
                }
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    if failures >= self.max_retries {
                        error!("network failures hit retry bound while polling: {}", e);
                        return Ok(None);
                    }
                    let backoff = (interval * 2u32.pow(failures)).min(MAX_POLL_BACKOFF);
                    sleep(backoff).await;
                    continue;
                }
                Err(e) => return Err(e),
            }

            sleep(interval).await;
        }

        Ok(None)
    }

    /// Create an inbox, wait for the first message, extract the code.
    pub async fn get_verification_code(
        &self,
        timeout: Duration,
        pattern: Option<&Regex>,
    ) -> Result<FetchedCode, MailboxError> {
        let session = self.create_inbox().await?;
        info!(address = %session.address, "created disposable inbox");

        let content = self
            .wait_for_message(&session.token, timeout, Duration::from_secs(1))
            .await?
            .ok_or(MailboxError::Timeout(timeout.as_millis() as u64))?;

        let code = extract_code(&content, pattern).ok_or(MailboxError::CodeNotFound)?;
        info!(code = %code, "extracted verification code");

        Ok(FetchedCode {
            address: session.address,
            code,
            token: session.token,
        })
    }
}
