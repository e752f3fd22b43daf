use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "regpilot", about = "Sign-up flow automation toolkit")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a disposable inbox and wait for a verification code
    FetchCode {
        /// Wait timeout in seconds (overrides config)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Custom extraction regex; first capture group is the code
        #[arg(short, long)]
        pattern: Option<String>,
    },
    /// Submit a captcha challenge and print the solved token
    Solve {
        /// URL of the page carrying the challenge
        #[arg(long)]
        site_url: String,

        /// Site key of the challenge widget
        #[arg(long)]
        site_key: String,

        /// Vendor task type override
        #[arg(long)]
        task_type: Option<String>,

        /// Challenge action parameter
        #[arg(long)]
        action: Option<String>,
    },
    /// Parse a proxy list and preview the rotation order
    ProxyCheck {
        /// Endpoint list file, one per line (defaults to the config list)
        #[arg(short, long)]
        list: Option<String>,

        /// Number of picks to preview
        #[arg(short = 'n', long, default_value = "5")]
        picks: usize,
    },
}
