use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use livecomment_api::cache::DEFAULT_CAPACITY;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub fallback_image: PathBuf,
    pub cache_capacity: usize,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("LIVECOMMENT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!(
                "LIVECOMMENT_JWT_SECRET is unset or still a placeholder; \
                 it must match the session service's secret"
            );
        }

        let port = match var("LIVECOMMENT_PORT") {
            Some(v) => v.parse().context("LIVECOMMENT_PORT must be a port number")?,
            None => 8080,
        };
        let cache_capacity = match var("LIVECOMMENT_CACHE_CAPACITY") {
            Some(v) => v
                .parse()
                .context("LIVECOMMENT_CACHE_CAPACITY must be a non-negative integer")?,
            None => DEFAULT_CAPACITY,
        };
        let timeout_secs: u64 = match var("LIVECOMMENT_REQUEST_TIMEOUT_SECS") {
            Some(v) => v
                .parse()
                .context("LIVECOMMENT_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            None => 10,
        };

        Ok(Self {
            jwt_secret,
            db_path: var("LIVECOMMENT_DB_PATH")
                .unwrap_or_else(|| "livecomment.db".into())
                .into(),
            host: var("LIVECOMMENT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            fallback_image: var("LIVECOMMENT_FALLBACK_IMAGE")
                .unwrap_or_else(|| "../img/NoImage.jpg".into())
                .into(),
            cache_capacity,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[("LIVECOMMENT_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.db_path, PathBuf::from("livecomment.db"));
        assert_eq!(config.cache_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn rejects_missing_or_placeholder_secret() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(
            Config::from_lookup(lookup(&[("LIVECOMMENT_JWT_SECRET", "dev-secret-change-me")]))
                .is_err()
        );
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("LIVECOMMENT_JWT_SECRET", "s3cret"),
            ("LIVECOMMENT_PORT", "9000"),
            ("LIVECOMMENT_CACHE_CAPACITY", "16"),
            ("LIVECOMMENT_REQUEST_TIMEOUT_SECS", "3"),
            ("LIVECOMMENT_FALLBACK_IMAGE", "/srv/img/default.jpg"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.fallback_image, PathBuf::from("/srv/img/default.jpg"));
    }

    #[test]
    fn bad_numbers_fail() {
        assert!(
            Config::from_lookup(lookup(&[
                ("LIVECOMMENT_JWT_SECRET", "s3cret"),
                ("LIVECOMMENT_PORT", "http"),
            ]))
            .is_err()
        );
    }
}
