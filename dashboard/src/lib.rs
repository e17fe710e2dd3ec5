/// Version the served pages belong to.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod chart;
pub mod client;
pub mod config;
pub mod context;
pub mod devices;
pub mod errors;
pub mod forms;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod paging;
pub mod render;
pub mod routes;
pub mod statistics;
pub mod things;
pub mod views;
