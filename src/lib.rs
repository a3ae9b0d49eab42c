pub mod commands;
pub mod config;
pub mod container;
pub mod docs;
pub mod error;
pub mod metrics;
pub mod models;
pub mod modules;
pub mod region;
pub mod responses;
pub mod routes;
pub mod services;
pub mod tasks;

#[cfg(test)]
pub mod tests;

pub use modules::network::RealConnectInfo;
