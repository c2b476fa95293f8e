//! Shared utilities for YenSense
//!
//! Tracing setup and the application configuration file used by the
//! `yensense` binary.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError, LlmSettings, LoggingSettings, MarketSettings, OutputSettings};
pub use logging::{LogFormat, init_tracing};
