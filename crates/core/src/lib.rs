pub mod config;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use errors::RequestError;
