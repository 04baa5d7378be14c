pub mod config;
pub mod types;

pub use config::{AnalyzerConfig, ClientConfig, ServerConfig};
