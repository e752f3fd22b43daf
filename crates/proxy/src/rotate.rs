use rand::Rng;
use tracing::{debug, info};

use regpilot_core::config::ProxyConfig;

use crate::endpoint::{parse_list, ProxyEndpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateMode {
    Sequential,
    Random,
}

impl RotateMode {
    /// Unrecognized mode names fall back to sequential.
    pub fn from_name(name: &str) -> Self {
        match name {
            "random" => RotateMode::Random,
            _ => RotateMode::Sequential,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RotatorStats {
    pub enabled: bool,
    pub total: usize,
    pub cursor: usize,
    pub mode: RotateMode,
}

/// Endpoint selection with a persistent cursor. The cursor deliberately
/// outlives individual registration flows so load spreads across the list.
pub struct ProxyRotator {
    endpoints: Vec<ProxyEndpoint>,
    cursor: usize,
    mode: RotateMode,
    enabled: bool,
}

impl ProxyRotator {
    pub fn new(endpoints: Vec<ProxyEndpoint>, mode: RotateMode, enabled: bool) -> Self {
        info!(total = endpoints.len(), ?mode, enabled, "proxy rotator configured");
        Self {
            endpoints,
            cursor: 0,
            mode,
            enabled,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            parse_list(&config.endpoint_list),
            RotateMode::from_name(&config.rotate_mode),
            config.enabled,
        )
    }

    /// Next endpoint, or `None` when disabled or the list is empty.
    pub fn next_endpoint(&mut self) -> Option<ProxyEndpoint> {
        if !self.enabled || self.endpoints.is_empty() {
            return None;
        }

        let endpoint = match self.mode {
            RotateMode::Random => {
                let index = rand::thread_rng().gen_range(0..self.endpoints.len());
                self.endpoints[index].clone()
            }
            RotateMode::Sequential => {
                let endpoint = self.endpoints[self.cursor].clone();
                self.cursor = (self.cursor + 1) % self.endpoints.len();
                endpoint
            }
        };

        debug!(endpoint = %endpoint, "selected proxy endpoint");
        Some(endpoint)
    }

    pub fn stats(&self) -> RotatorStats {
        RotatorStats {
            enabled: self.enabled,
            total: self.endpoints.len(),
            cursor: self.cursor,
            mode: self.mode,
        }
    }
}
