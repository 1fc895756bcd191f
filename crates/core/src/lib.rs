// Describer Core - Domain Logic & Ports
// NO infrastructure dependencies: adapters implement the ports in their own crates

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
pub mod telemetry;

pub use config::SchedulerConfig;
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
