use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;

use regpilot_core::config::AppConfig;
use regpilot_mailbox::MailboxClient;

pub async fn run(config: AppConfig, timeout: Option<u64>, pattern: Option<String>) -> Result<()> {
    let timeout = timeout
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_millis(config.automation.code_wait_timeout_ms));

    let pattern = pattern
        .map(|p| Regex::new(&p))
        .transpose()
        .context("invalid extraction pattern")?;

    let client = MailboxClient::new(&config.mailbox)?;
    let fetched = client.get_verification_code(timeout, pattern.as_ref()).await?;

    println!("Address: {}", fetched.address);
    println!("Code:    {}", fetched.code);

    Ok(())
}
