pub mod fetch_code;
pub mod proxy_check;
pub mod solve;
