use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::CaptchaError;

/// JSON transport to a solving vendor. A trait so the poll loop can be
/// exercised against scripted replies.
#[async_trait]
pub trait VendorTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: Value) -> Result<Value, CaptchaError>;
    async fn get_json(&self, url: &str) -> Result<Value, CaptchaError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, CaptchaError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaptchaError::Network(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl VendorTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: Value) -> Result<Value, CaptchaError> {
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CaptchaError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CaptchaError::Network(format!(
                "vendor returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CaptchaError::Network(format!("vendor body: {}", e)))
    }

    async fn get_json(&self, url: &str) -> Result<Value, CaptchaError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CaptchaError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CaptchaError::Network(format!(
                "vendor returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CaptchaError::Network(format!("vendor body: {}", e)))
    }
}
