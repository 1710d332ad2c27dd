pub mod config;

pub use config::ToolConfig;
