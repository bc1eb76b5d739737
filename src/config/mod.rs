pub mod app_config;

pub use app_config::{AppConfig, DisplayConfig, LogConfig, OutputFormat, ViewMode};
