pub mod egress;
pub mod endpoint;
pub mod rotate;

pub use egress::{EgressConfig, EgressController, NetworkConfigurator};
pub use endpoint::{parse_endpoint, parse_list, ProxyEndpoint, Scheme};
pub use rotate::{ProxyRotator, RotateMode, RotatorStats};
