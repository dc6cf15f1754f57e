pub mod env;
mod loader;

pub use env::{
    AppConfig, BackendConfig, BatchConfig, CacheConfig, ClientConfig, ConfigError,
    DirectoryConfig, LoggingConfig, ServerConfig,
};
pub use loader::load_config;
