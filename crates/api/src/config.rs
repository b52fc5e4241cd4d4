use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use ivr_core::{load_rule_set, IntentRuleSet};

const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024;
const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5500",
    "http://127.0.0.1:5500",
];

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: String,
    pub rules_path: Option<PathBuf>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub max_body_bytes: usize,
    pub allowed_origins: Vec<String>,
    /// Key the rate limiter on `x-forwarded-for` instead of the peer address.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            rules_path: None,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 120,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
            trust_forwarded_for: false,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind: env::var("IVR_BIND").unwrap_or(defaults.bind),
            rules_path: env::var("IVR_RULES_PATH")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            rate_limit_window: env::var("IVR_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: env::var("IVR_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
            max_body_bytes: env::var("IVR_MAX_BODY_BYTES")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.max_body_bytes),
            allowed_origins: env::var("IVR_ALLOWED_ORIGINS")
                .ok()
                .map(|value| parse_origins(&value))
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.allowed_origins),
            trust_forwarded_for: env::var("IVR_TRUST_FORWARDED_FOR")
                .ok()
                .and_then(|value| parse_flag(&value))
                .unwrap_or(defaults.trust_forwarded_for),
        }
    }

    /// The configured rule file, or the built-in table when none is set.
    pub fn load_rules(&self) -> Result<IntentRuleSet> {
        match &self.rules_path {
            Some(path) => load_rule_set(path),
            None => Ok(IntentRuleSet::standard()),
        }
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
