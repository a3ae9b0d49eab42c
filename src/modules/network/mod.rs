pub mod real_connect_info;

pub use real_connect_info::{RealConnectInfo, real_ip_middleware};
