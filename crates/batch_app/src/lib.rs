//! Command-line front end: settings, logging, file intake and the batch session.
pub mod cli;
pub mod config;
pub mod logging;
pub mod media;
pub mod session;

pub use cli::{Cli, ToolCommand};
pub use config::{AppConfig, ConfigError, DEFAULT_CONFIG_FILENAME};
pub use logging::{LogDestination, LOG_FILENAME};
pub use session::BatchSession;
