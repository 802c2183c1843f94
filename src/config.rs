//! Configuration management module
//!
//! Everything is read from the process environment once at startup. A
//! missing connection string is not fatal here: the connection cache reports
//! it on first use so `/health` keeps answering.

use std::env;
use std::fmt::Display;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

pub const MONGO_URI_ENV: &str = "MONGO_URI";
pub const DB_NAME_ENV: &str = "DB_NAME";
pub const CORS_ORIGINS_ENV: &str = "CORS_ORIGINS";
pub const MAX_POOL_SIZE_ENV: &str = "MONGO_MAX_POOL_SIZE";
pub const PORT_ENV: &str = "PORT";
pub const BIND_ADDR_ENV: &str = "BIND_ADDR";
pub const TRUST_PROXY_HOPS_ENV: &str = "TRUST_PROXY_HOPS";
pub const RATE_LIMIT_GC_ENV: &str = "RATE_LIMIT_GC_SECS";
pub const RATE_LIMIT_TTL_ENV: &str = "RATE_LIMIT_BUCKET_TTL_SECS";

pub const DEFAULT_DB_NAME: &str = "slv";
pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub mongo_uri: Option<String>,
    pub db_name: String,
    pub max_pool_size: u32,
    pub cors_origins: Vec<String>,
    pub port: u16,
    pub bind_addr: IpAddr,
    pub trust_proxy_hops: usize,
    pub rate_limit_gc_interval: Duration,
    /// Idle time after which an expired limiter window is dropped. Zero
    /// disables pruning.
    pub rate_limit_bucket_ttl: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mongo_uri: None,
            db_name: DEFAULT_DB_NAME.to_string(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            cors_origins: Vec::new(),
            port: DEFAULT_PORT,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            trust_proxy_hops: 1,
            rate_limit_gc_interval: Duration::from_secs(60),
            rate_limit_bucket_ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            mongo_uri: non_blank(MONGO_URI_ENV),
            db_name: non_blank(DB_NAME_ENV).unwrap_or(defaults.db_name),
            max_pool_size: parse_or(&lookup, MAX_POOL_SIZE_ENV, defaults.max_pool_size),
            cors_origins: lookup(CORS_ORIGINS_ENV)
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
            port: parse_or(&lookup, PORT_ENV, defaults.port),
            bind_addr: parse_or(&lookup, BIND_ADDR_ENV, defaults.bind_addr),
            trust_proxy_hops: parse_or(&lookup, TRUST_PROXY_HOPS_ENV, defaults.trust_proxy_hops),
            rate_limit_gc_interval: Duration::from_secs(
                parse_or(&lookup, RATE_LIMIT_GC_ENV, 60u64).max(5),
            ),
            rate_limit_bucket_ttl: Duration::from_secs(parse_or(
                &lookup,
                RATE_LIMIT_TTL_ENV,
                defaults.rate_limit_bucket_ttl.as_secs(),
            )),
        }
    }
}

/// Split a comma separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, value = %raw, "invalid {key}; using default");
                default
            }
        },
        None => default,
    }
}

/// Load `KEY=value` lines from an env file into the process environment.
/// Variables that are already set win over the file.
pub fn load_local_env_overrides(path: &Path) {
    if !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            let mut applied = 0usize;
            for (key, value) in parse_env_file(&contents) {
                if env::var(&key).is_ok() {
                    continue;
                }
                env::set_var(&key, value);
                applied += 1;
            }
            info!(path = %path.display(), applied, "Loaded environment overrides");
        }
        Err(err) => {
            warn!(path = %path.display(), ?err, "failed to read env overrides");
        }
    }
}

fn parse_env_file(contents: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            warn!(line = idx + 1, "invalid env entry; skipping");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        entries.push((key.to_string(), unquote(value.trim()).to_string()));
    }
    entries
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServiceConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert!(config.mongo_uri.is_none());
        assert_eq!(config.db_name, "slv");
        assert_eq!(config.max_pool_size, 10);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.port, 3000);
        assert_eq!(config.trust_proxy_hops, 1);
    }

    #[test]
    fn blank_connection_string_counts_as_missing() {
        let config = config_from(&[(MONGO_URI_ENV, "   ")]);
        assert!(config.mongo_uri.is_none());
    }

    #[test]
    fn origins_are_trimmed_and_blanks_dropped() {
        let config = config_from(&[(
            CORS_ORIGINS_ENV,
            " https://slv.example ,, https://www.slv.example ,",
        )]);
        assert_eq!(
            config.cors_origins,
            vec!["https://slv.example", "https://www.slv.example"]
        );
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = config_from(&[
            (PORT_ENV, "eighty"),
            (MAX_POOL_SIZE_ENV, "4"),
            (RATE_LIMIT_GC_ENV, "1"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_pool_size, 4);
        assert_eq!(config.rate_limit_gc_interval, Duration::from_secs(5));
    }

    #[test]
    fn env_file_parsing() {
        let entries = parse_env_file(
            "# comment\nMONGO_URI=\"mongodb://localhost:27017\"\nexport DB_NAME=leads\nbroken\n\n",
        );
        assert_eq!(
            entries,
            vec![
                (
                    "MONGO_URI".to_string(),
                    "mongodb://localhost:27017".to_string()
                ),
                ("DB_NAME".to_string(), "leads".to_string()),
            ]
        );
    }

    #[test]
    #[serial]
    fn env_file_never_overrides_process_env() {
        let dir = env::temp_dir().join(format!("slv-leads-env-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        fs::write(&path, "SLV_TEST_KEEP=file\nSLV_TEST_FILL=file\n").unwrap();

        env::set_var("SLV_TEST_KEEP", "process");
        env::remove_var("SLV_TEST_FILL");
        load_local_env_overrides(&path);

        assert_eq!(env::var("SLV_TEST_KEEP").unwrap(), "process");
        assert_eq!(env::var("SLV_TEST_FILL").unwrap(), "file");

        env::remove_var("SLV_TEST_KEEP");
        env::remove_var("SLV_TEST_FILL");
        let _ = fs::remove_dir_all(dir);
    }
}
