//! Core chat model, channel traits, and configuration for Courier.
//!
//! Courier bridges IM networks into a common chat model. Slave channels
//! implement [`SlaveChannel`] against the types in [`types`] and deliver
//! inbound traffic through a [`Coordinator`].

pub mod channel;
pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use channel::{Coordinator, CoordinatorReceiver, ExtraFunction, SlaveChannel};
pub use config::Config;
pub use error::{ConfigError, CoreError, Result};
