use anyhow::{Context, Result};

use regpilot_core::config::AppConfig;
use regpilot_proxy::ProxyRotator;

pub async fn run(mut config: AppConfig, list: Option<String>, picks: usize) -> Result<()> {
    if let Some(path) = list {
        config.proxy.endpoint_list = std::fs::read_to_string(&path)
            .with_context(|| format!("reading proxy list {}", path))?;
        config.proxy.enabled = true;
    }
    let mut rotator = ProxyRotator::from_config(&config.proxy);
    let stats = rotator.stats();

    println!(
        "Endpoints: {} (enabled: {}, mode: {:?})",
        stats.total, stats.enabled, stats.mode
    );

    for i in 1..=picks {
        match rotator.next_endpoint() {
            Some(endpoint) => println!("  pick {}: {}", i, endpoint),
            None => {
                println!("  pick {}: none (rotation disabled or list empty)", i);
                break;
            }
        }
    }

    Ok(())
}
