use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub client: ClientConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub intents_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub host: Url,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub cache_size: usize,
    pub batch_size: usize,
    pub debounce: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub to_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: Url::parse("http://localhost:11434").expect("valid default backend url"),
            model: "llama3.2".to_string(),
            temperature: 0.1,
            max_tokens: 150,
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl: Duration::from_secs(300),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_batch_size: 50 }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse("http://127.0.0.1:8420").expect("valid default server url"),
            cache_size: 1000,
            batch_size: 5,
            debounce: Duration::from_millis(200),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8420,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            logs_dir: "logs".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            to_file: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            client: ClientConfig::default(),
            directories: DirectoryConfig::default(),
            logging: LoggingConfig::default(),
            intents_path: None,
        }
    }
}
