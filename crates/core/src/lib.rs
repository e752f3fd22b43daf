pub mod account;
pub mod config;

pub use account::AccountInfo;
pub use config::AppConfig;
