pub mod config;
pub mod error;
pub mod observability;
pub mod server;
pub mod tasks;

// Domain data shapes shared across layers
pub mod domain;

// Use cases and their ports; infrastructure adapters behind the ports
pub mod app;
pub mod infra;

pub use error::{Result, WeatherError};
