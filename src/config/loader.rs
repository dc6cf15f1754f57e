use std::{env, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use super::env::{
    AppConfig, BackendConfig, BatchConfig, CacheConfig, ClientConfig, ConfigError,
    DirectoryConfig, LoggingConfig, ServerConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let server = ServerConfig {
            host: env::var("INTENTKEEPER_HOST").unwrap_or_else(|_| ServerConfig::default().host),
            port: parse_var("INTENTKEEPER_PORT", ServerConfig::default().port)?,
        };

        let defaults = BackendConfig::default();
        let backend = BackendConfig {
            host: parse_url("OLLAMA_HOST", defaults.host)?,
            model: env::var("OLLAMA_MODEL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.model),
            temperature: parse_var("OLLAMA_TEMPERATURE", defaults.temperature)?,
            max_tokens: defaults.max_tokens,
            timeout: Duration::from_secs(parse_var("OLLAMA_TIMEOUT_SECS", 30)?.max(1)),
            retry_delay: Duration::from_millis(parse_var("RETRY_DELAY_MS", 2_000)?),
        };

        let cache = CacheConfig {
            max_size: parse_var("CACHE_MAX_SIZE", 1000)?,
            ttl: Duration::from_secs(parse_var("CACHE_TTL", 300)?),
        };

        let batch = BatchConfig {
            max_batch_size: parse_var("MAX_BATCH_SIZE", 50)?,
        };

        let client_defaults = ClientConfig::default();
        let client = ClientConfig {
            server_url: parse_url("INTENTKEEPER_URL", client_defaults.server_url)?,
            cache_size: parse_var("CLIENT_CACHE_SIZE", client_defaults.cache_size)?,
            batch_size: parse_var("CLIENT_BATCH_SIZE", client_defaults.batch_size)?.max(1),
            debounce: Duration::from_millis(parse_var("DEBOUNCE_MS", 200)?),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: parse_var("LOG_TO_FILE", true)?,
        };

        let intents_path = env::var("INTENTS_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            server,
            backend,
            cache,
            batch,
            client,
            directories,
            logging,
            intents_path,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { key, value })
        }
        _ => Ok(default),
    }
}

/// Base URLs always end in `/` so relative endpoints join under any path prefix.
fn parse_url(key: &'static str, default: Url) -> Result<Url, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            let mut url =
                Url::parse(value.trim()).map_err(|_| ConfigError::Invalid { key, value })?;
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            Ok(url)
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns a distinct variable so they can run in parallel.
    #[test]
    fn parse_var_uses_default_when_unset_or_blank() {
        env::remove_var("INTENTKEEPER_TEST_UNSET");
        assert_eq!(parse_var("INTENTKEEPER_TEST_UNSET", 7usize).unwrap(), 7);

        env::set_var("INTENTKEEPER_TEST_BLANK", "  ");
        assert_eq!(parse_var("INTENTKEEPER_TEST_BLANK", 7usize).unwrap(), 7);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        env::set_var("INTENTKEEPER_TEST_GARBAGE", "lots");
        let err = parse_var::<usize>("INTENTKEEPER_TEST_GARBAGE", 1).unwrap_err();
        assert!(err.to_string().contains("INTENTKEEPER_TEST_GARBAGE"));
    }

    #[test]
    fn parse_url_validates() {
        env::set_var("INTENTKEEPER_TEST_URL", "http://10.0.0.2:11434");
        let url = parse_url("INTENTKEEPER_TEST_URL", BackendConfig::default().host).unwrap();
        assert_eq!(url.host_str(), Some("10.0.0.2"));

        env::set_var("INTENTKEEPER_TEST_BAD_URL", "not a url");
        assert!(parse_url("INTENTKEEPER_TEST_BAD_URL", BackendConfig::default().host).is_err());
    }

    #[test]
    fn parse_url_keeps_path_prefix_for_joins() {
        env::set_var("INTENTKEEPER_TEST_PFX_URL", "http://proxy.lan/ollama");
        let url = parse_url("INTENTKEEPER_TEST_PFX_URL", BackendConfig::default().host).unwrap();
        assert_eq!(url.as_str(), "http://proxy.lan/ollama/");
        assert_eq!(
            url.join("api/generate").unwrap().as_str(),
            "http://proxy.lan/ollama/api/generate"
        );

        env::set_var("INTENTKEEPER_TEST_SLASH_URL", "http://proxy.lan/ollama/");
        let url = parse_url("INTENTKEEPER_TEST_SLASH_URL", BackendConfig::default().host).unwrap();
        assert_eq!(url.as_str(), "http://proxy.lan/ollama/");
    }
}
