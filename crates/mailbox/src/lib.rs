pub mod client;
pub mod extract;

pub use client::{HttpMailApi, MailApi, MailboxClient, NewInbox, VerificationSession};
pub use extract::extract_code;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailboxError {
    /// Transient transport failure. Retried with backoff up to a bound.
    #[error("mailbox network error: {0}")]
    Network(String),

    /// 401 / invalid credential. Never retried.
    #[error("mailbox auth error: {0}")]
    Auth(String),

    #[error("no message arrived within {0} ms")]
    Timeout(u64),

    #[error("no verification code found in message")]
    CodeNotFound,
}

impl MailboxError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MailboxError::Network(_))
    }
}
