use std::time::Duration;

pub const DEFAULT_FEED_URL: &str = "https://api.nasa.gov/neo/rest/v1/feed";

#[derive(Clone, Debug)]
pub struct Config {
    pub static_csv: String,
    pub feed_url: String,
    /// Sent as the `api_key` query parameter; empty unless configured.
    pub api_key: String,
    pub cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
    /// How long a failed live fetch is reused before upstream is asked again.
    pub feed_retry_secs: u64,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            static_csv: std::env::var("NEO_STATIC_CSV").unwrap_or_else(|_| "static_asteroids_data.csv".to_string()),
            feed_url: std::env::var("NEO_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string()),
            api_key: std::env::var("NEO_API_KEY").unwrap_or_default(),
            cache_ttl_secs: std::env::var("NEO_CACHE_TTL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(86_400),
            http_timeout_secs: std::env::var("NEO_HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            feed_retry_secs: std::env::var("NEO_FEED_RETRY_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(60),
            host: std::env::var("NEO_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("NEO_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8501),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn feed_retry(&self) -> Duration {
        Duration::from_secs(self.feed_retry_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            static_csv: "static_asteroids_data.csv".to_string(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            api_key: String::new(),
            cache_ttl_secs: 86_400,
            http_timeout_secs: 30,
            feed_retry_secs: 60,
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_empty_key_and_one_day_ttl() {
        let cfg = Config::default();
        assert!(cfg.api_key.is_empty());
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(cfg.feed_retry(), Duration::from_secs(60));
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8501");
    }
}
