//! Process configuration for the contact relay, resolved from the environment.

pub mod config;

pub use config::{
    AppConfig, ConfigError, Environment, SmtpConfig, SmtpSecurity, DEFAULT_BIND_ADDR,
};
