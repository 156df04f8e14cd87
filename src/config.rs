use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string. Without it tokens live in memory only.
    pub database_url: Option<String>,
    /// TTL in seconds for resolved schemas. 0 = no caching.
    /// Set via SCOPEGATE_SCHEMA_CACHE_TTL. Default: 60.
    pub schema_cache_ttl: u64,
    /// Name used when the public schema has to be created.
    pub public_schema_name: String,
    /// Length of generated access tokens.
    pub token_length: usize,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            schema_cache_ttl: 60,
            public_schema_name: "Public Schema".into(),
            token_length: 32,
            log_format: LogFormat::Text,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from any key lookup. `load()` passes the process env.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();
    let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

    if database_url.is_none() {
        let env_mode = lookup("SCOPEGATE_ENV")
            .or_else(|| lookup("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "DATABASE_URL is not set. Tokens would only be kept in memory; \
                 set it before running in production."
            );
        }
    }

    let token_length = lookup("SCOPEGATE_TOKEN_LENGTH")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.token_length);
    anyhow::ensure!(token_length > 0, "SCOPEGATE_TOKEN_LENGTH must be positive");

    Ok(Config {
        database_url,
        schema_cache_ttl: lookup("SCOPEGATE_SCHEMA_CACHE_TTL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.schema_cache_ttl),
        public_schema_name: lookup("SCOPEGATE_PUBLIC_SCHEMA_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.public_schema_name),
        token_length,
        log_format: match lookup("SCOPEGATE_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.schema_cache_ttl, 60);
        assert_eq!(cfg.public_schema_name, "Public Schema");
        assert_eq!(cfg.token_length, 32);
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let cfg = from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/craft"),
            ("SCOPEGATE_SCHEMA_CACHE_TTL", "0"),
            ("SCOPEGATE_PUBLIC_SCHEMA_NAME", "Anonymous"),
            ("SCOPEGATE_LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/craft"));
        assert_eq!(cfg.schema_cache_ttl, 0);
        assert_eq!(cfg.public_schema_name, "Anonymous");
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn test_production_requires_database() {
        assert!(from_lookup(lookup(&[("SCOPEGATE_ENV", "production")])).is_err());
        assert!(from_lookup(lookup(&[
            ("SCOPEGATE_ENV", "production"),
            ("DATABASE_URL", "postgres://db/craft"),
        ]))
        .is_ok());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let cfg = from_lookup(lookup(&[("SCOPEGATE_SCHEMA_CACHE_TTL", "soon")])).unwrap();
        assert_eq!(cfg.schema_cache_ttl, 60);
        assert!(from_lookup(lookup(&[("SCOPEGATE_TOKEN_LENGTH", "0")])).is_err());
    }
}
