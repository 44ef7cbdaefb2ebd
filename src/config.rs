//! Environment configuration.
//!
//! Everything is optional. Without `GEMINI_API_KEY` the service runs in
//! keyword-only mode; without `GAS_URL` posts live in memory.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::banding::BandingProfile;
use crate::remote::DEFAULT_BASE_URL;

pub const DEFAULT_PRIMARY_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_GEMINI_TIMEOUT: Duration = Duration::from_secs(8);

/// Every variable the service reads.
pub const ENV_KEYS: [&str; 10] = [
    "GEMINI_API_KEY",
    "GEMINI_MODEL",
    "GEMINI_FALLBACK_MODEL",
    "GEMINI_BASE_URL",
    "GEMINI_TIMEOUT_SECS",
    "BANDING_PROFILE",
    "DEBUG_MODE",
    "GAS_URL",
    "STORE_TIMEOUT_SECS",
    "BIND_ADDR",
];

#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_fallback_model: String,
    pub gemini_base_url: String,
    pub gemini_timeout: Duration,
    pub profile: BandingProfile,
    pub debug_mode: bool,
    pub gas_url: Option<String>,
    pub store_timeout: Duration,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_PRIMARY_MODEL.to_string(),
            gemini_fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            gemini_timeout: DEFAULT_GEMINI_TIMEOUT,
            profile: BandingProfile::Satisfaction,
            debug_mode: false,
            gas_url: None,
            store_timeout: Duration::from_secs(5),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Settings {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let vars = ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self::from_vars(vars)
    }

    /// Build settings from a variable map. Unparseable values keep their
    /// defaults.
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let profile = match get("BANDING_PROFILE") {
            Some(name) => BandingProfile::parse(&name).unwrap_or_else(|| {
                tracing::warn!("⚠️ Unknown BANDING_PROFILE '{}', using {:?}", name, defaults.profile);
                defaults.profile
            }),
            None => defaults.profile,
        };

        Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_fallback_model: get("GEMINI_FALLBACK_MODEL").unwrap_or(defaults.gemini_fallback_model),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            gemini_timeout: parse_var(get("GEMINI_TIMEOUT_SECS"), "GEMINI_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.gemini_timeout),
            profile,
            debug_mode: get("DEBUG_MODE")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.debug_mode),
            gas_url: get("GAS_URL"),
            store_timeout: parse_var(get("STORE_TIMEOUT_SECS"), "STORE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.store_timeout),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}

fn parse_var<T: FromStr>(value: Option<String>, key: &str) -> Option<T> {
    let v = value?;
    match v.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("⚠️ Invalid {} '{}', using default", key, v);
            None
        }
    }
}
