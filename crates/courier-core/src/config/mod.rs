//! Configuration loading, schema, and validation.

mod loader;
mod schema;

pub use schema::{Config, ExperimentalFlags, LogLevel, LoggingConfig, MessengerConfig};
