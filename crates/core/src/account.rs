use serde::{Deserialize, Serialize};

/// Account data supplied by the host coordinator. Read-only to the
/// automation core: the controller caches one copy per registration flow
/// and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl AccountInfo {
    /// A flow is active only when the coordinator handed us an email.
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}
