//! Process bootstrap shared by services built on `apikit`:
//! layered configuration loading and logging initialization.

pub mod config;
pub mod logging;

pub use config::{
    default_logging_config, AppConfig, AppConfigProvider, ConfigProvider, LoggingConfig, Section,
};
