use anyhow::{bail, Result};

use regpilot_captcha::{CaptchaSolver, TaskOptions};
use regpilot_core::config::AppConfig;

pub async fn run(
    config: AppConfig,
    site_url: String,
    site_key: String,
    task_type: Option<String>,
    action: Option<String>,
) -> Result<()> {
    let solver = CaptchaSolver::from_config(&config.captcha)?;
    let options = TaskOptions {
        task_type,
        action,
        data: None,
    };

    match solver.solve(&site_url, &site_key, &options).await? {
        Some(token) => {
            println!("{}", token);
            Ok(())
        }
        None => bail!("vendor returned no token"),
    }
}
