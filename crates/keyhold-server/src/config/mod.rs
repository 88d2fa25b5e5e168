// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use keyhold_core::DEFAULT_PENALTY;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND_HOST: &str = "KEYHOLD_BIND_HOST";
pub const ENV_DB_PATH: &str = "KEYHOLD_DB_PATH";
pub const ENV_PENALTY_MS: &str = "KEYHOLD_PENALTY_MS";
pub const ENV_PENALTY_SWEEP_INTERVAL_MS: &str = "KEYHOLD_PENALTY_SWEEP_INTERVAL_MS";
pub const ENV_MAX_BODY_BYTES: &str = "KEYHOLD_MAX_BODY_BYTES";
pub const ENV_CLIENT_IP_HEADER: &str = "KEYHOLD_CLIENT_IP_HEADER";
pub const ENV_CORS_ALLOWED_ORIGINS: &str = "KEYHOLD_CORS_ALLOWED_ORIGINS";
pub const ENV_LOG_JSON: &str = "KEYHOLD_LOG_JSON";

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub penalty: Duration,
    pub penalty_sweep_interval: Duration,
    pub max_body_bytes: usize,
    pub client_ip_header: String,
    pub cors_allowed_origins: Vec<String>,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            db_path: PathBuf::from("db.sqlite3"),
            penalty: DEFAULT_PENALTY,
            penalty_sweep_interval: Duration::from_secs(60),
            max_body_bytes: 20 * 1024 * 1024,
            client_ip_header: "cf-connecting-ip".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
            log_json: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `lookup`; unset or blank variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(raw) = get(ENV_PORT) {
            cfg.port = raw
                .parse::<u16>()
                .map_err(|e| format!("invalid {ENV_PORT} value {raw:?}: {e}"))?;
        }
        if let Some(host) = get(ENV_BIND_HOST) {
            cfg.bind_host = host;
        }
        if let Some(path) = get(ENV_DB_PATH) {
            cfg.db_path = PathBuf::from(path);
        }
        if let Some(ms) = get(ENV_PENALTY_MS) {
            cfg.penalty = Duration::from_millis(parse_u64(ENV_PENALTY_MS, &ms)?);
        }
        if let Some(ms) = get(ENV_PENALTY_SWEEP_INTERVAL_MS) {
            cfg.penalty_sweep_interval =
                Duration::from_millis(parse_u64(ENV_PENALTY_SWEEP_INTERVAL_MS, &ms)?);
        }
        if let Some(raw) = get(ENV_MAX_BODY_BYTES) {
            cfg.max_body_bytes = raw
                .parse::<usize>()
                .map_err(|e| format!("invalid {ENV_MAX_BODY_BYTES} value {raw:?}: {e}"))?;
        }
        if let Some(header) = get(ENV_CLIENT_IP_HEADER) {
            cfg.client_ip_header = header.to_ascii_lowercase();
        }
        if let Some(raw) = get(ENV_CORS_ALLOWED_ORIGINS) {
            cfg.cors_allowed_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(raw) = get(ENV_LOG_JSON) {
            cfg.log_json = parse_bool(&raw).unwrap_or(cfg.log_json);
        }
        Ok(cfg)
    }

    #[must_use]
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.cors_allowed_origins
            .iter()
            .any(|o| o == "*" || o == origin)
    }
}

fn parse_u64(name: &str, raw: &str) -> Result<u64, String> {
    raw.parse::<u64>()
        .map_err(|e| format!("invalid {name} value {raw:?}: {e}"))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

pub fn validate_startup_config_contract(cfg: &ServerConfig) -> Result<(), String> {
    if cfg.max_body_bytes == 0 {
        return Err("max body bytes must be > 0".to_string());
    }
    if cfg.penalty.is_zero() {
        return Err("penalty duration must be > 0".to_string());
    }
    if cfg.client_ip_header.trim().is_empty() {
        return Err("client ip header name must not be empty".to_string());
    }
    if axum::http::HeaderName::from_bytes(cfg.client_ip_header.as_bytes()).is_err() {
        return Err(format!(
            "client ip header name is not a valid header: {}",
            cfg.client_ip_header
        ));
    }
    if cfg.db_path.as_os_str().is_empty() {
        return Err("database path must not be empty".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.penalty, Duration::from_millis(10_000));
        assert_eq!(cfg.client_ip_header, "cf-connecting-ip");
        assert!(cfg.origin_allowed("https://anything.example"));
        validate_startup_config_contract(&cfg).expect("defaults are valid");
    }

    #[test]
    fn port_and_overrides_are_read() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("KEYHOLD_PENALTY_MS", "2500"),
            ("KEYHOLD_CLIENT_IP_HEADER", "X-Real-IP"),
            ("KEYHOLD_CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("KEYHOLD_LOG_JSON", "false"),
        ]))
        .expect("config");
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.penalty, Duration::from_millis(2_500));
        assert_eq!(cfg.client_ip_header, "x-real-ip");
        assert!(cfg.origin_allowed("https://b.example"));
        assert!(!cfg.origin_allowed("https://c.example"));
        assert!(!cfg.log_json);
    }

    #[test]
    fn blank_port_falls_back_to_default() {
        let cfg = ServerConfig::from_lookup(lookup(&[("PORT", "  ")])).expect("config");
        assert_eq!(cfg.port, 3000);
    }

    #[test]
    fn unparsable_port_is_a_startup_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).expect_err("bad port");
        assert!(err.contains("PORT"));
    }

    #[test]
    fn startup_validation_rejects_zero_penalty() {
        let cfg = ServerConfig {
            penalty: Duration::ZERO,
            ..ServerConfig::default()
        };
        let err = validate_startup_config_contract(&cfg).expect_err("zero penalty");
        assert!(err.contains("penalty"));
    }

    #[test]
    fn startup_validation_rejects_bad_header_name() {
        let cfg = ServerConfig {
            client_ip_header: "bad header".to_string(),
            ..ServerConfig::default()
        };
        assert!(validate_startup_config_contract(&cfg).is_err());
    }
}
