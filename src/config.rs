//! Core Configuration
//!
//! One serde document for everything the wallet core can tune. Values come
//! from defaults, then an optional JSON file, then `HAWALA_TON_*` variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::api::{CircuitConfig, RetryPolicy};
use crate::error::{HawalaError, HawalaResult};
use crate::types::Network;
use crate::vault::VaultSettings;

pub const ENV_PREFIX: &str = "HAWALA_TON_";

/// Default past offsets (seconds) tried for highload v3 `created_at`
pub const DEFAULT_CLOCK_SKEW_OFFSETS: [u32; 5] = [15, 30, 60, 120, 180];
/// Offsets beyond the largest highload v3 timeout can never be accepted
const MAX_CLOCK_SKEW_OFFSET: u32 = 3_600;

/// A provider endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub network: Network,
    /// Tried in order; empty means the public toncenter endpoint
    pub endpoints: Vec<EndpointConfig>,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub circuit: CircuitConfig,
    pub clock_skew_offsets: Vec<u32>,
    /// Validity window of counter-scheme messages and highload v2 requests
    pub message_ttl_secs: u32,
    /// Nanotons attached to a packed highload v3 batch; 0 lets the wallet pay from its balance
    pub batch_value: u64,
    pub vault: VaultSettings,
    /// Directory of the file-backed store
    pub store_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            endpoints: Vec::new(),
            request_timeout_secs: 15,
            retry: RetryPolicy::default(),
            circuit: CircuitConfig::default(),
            clock_skew_offsets: DEFAULT_CLOCK_SKEW_OFFSETS.to_vec(),
            message_ttl_secs: 60,
            batch_value: 0,
            vault: VaultSettings::default(),
            store_dir: None,
            log_filter: "hawala_ton_core=info".to_string(),
        }
    }
}

impl CoreConfig {
    pub fn from_json(json: &str) -> HawalaResult<Self> {
        serde_json::from_str(json).map_err(|e| HawalaError::parse_error(format!("Invalid config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> HawalaResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| HawalaError::storage(format!("Cannot read config {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Overlay `HAWALA_TON_*` variables from the process environment
    pub fn apply_env(&mut self) -> HawalaResult<()> {
        self.apply_vars(std::env::vars())
    }

    /// Overlay `HAWALA_TON_*` variables. Endpoints are applied before the API key.
    pub fn apply_vars<I>(&mut self, vars: I) -> HawalaResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| k.strip_prefix(ENV_PREFIX).map(|name| (name.to_string(), v)))
            .collect();

        if let Some(value) = vars.get("NETWORK") {
            self.network = parse_network(value)?;
        }
        if let Some(value) = vars.get("ENDPOINTS") {
            self.endpoints = value
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(EndpointConfig::new)
                .collect();
        }
        if let Some(key) = vars.get("API_KEY").filter(|k| !k.is_empty()) {
            for endpoint in self.endpoints.iter_mut().filter(|e| e.api_key.is_none()) {
                endpoint.api_key = Some(key.clone());
            }
        }
        if let Some(value) = vars.get("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", value)?;
        }
        if let Some(value) = vars.get("MESSAGE_TTL_SECS") {
            self.message_ttl_secs = parse_number("MESSAGE_TTL_SECS", value)?;
        }
        if let Some(value) = vars.get("CLOCK_SKEW_OFFSETS") {
            self.clock_skew_offsets = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_number("CLOCK_SKEW_OFFSETS", s))
                .collect::<HawalaResult<_>>()?;
        }
        if let Some(value) = vars.get("BATCH_VALUE") {
            self.batch_value = parse_number("BATCH_VALUE", value)?;
        }
        if let Some(value) = vars.get("MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_number("MAX_ATTEMPTS", value)?;
        }
        if let Some(value) = vars.get("KDF_VERSION") {
            self.vault.kdf_version = parse_number("KDF_VERSION", value)?;
        }
        if let Some(value) = vars.get("STORE_DIR") {
            self.store_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = vars.get("LOG") {
            self.log_filter = value.clone();
        }
        Ok(())
    }

    pub fn validate(&self) -> HawalaResult<()> {
        for endpoint in &self.endpoints {
            validate_endpoint(&endpoint.url)?;
        }
        if self.request_timeout_secs == 0 {
            return Err(HawalaError::invalid_input("Request timeout must be positive"));
        }
        if self.message_ttl_secs == 0 {
            return Err(HawalaError::invalid_input("Message TTL must be positive"));
        }
        if self.circuit.failure_threshold == 0 {
            return Err(HawalaError::invalid_input("Circuit failure threshold must be positive"));
        }
        if self.clock_skew_offsets.is_empty() {
            return Err(HawalaError::invalid_input("At least one clock-skew offset is required"));
        }
        if self.clock_skew_offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HawalaError::invalid_input("Clock-skew offsets must be strictly increasing"));
        }
        if self.clock_skew_offsets.iter().any(|&o| o > MAX_CLOCK_SKEW_OFFSET) {
            return Err(HawalaError::invalid_input(format!(
                "Clock-skew offsets may not exceed {} seconds",
                MAX_CLOCK_SKEW_OFFSET
            )));
        }
        self.retry.validate()?;
        self.vault.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_network(value: &str) -> HawalaResult<Network> {
    match value.trim().to_lowercase().as_str() {
        "mainnet" => Ok(Network::Mainnet),
        "testnet" => Ok(Network::Testnet),
        other => Err(HawalaError::invalid_input(format!("Unknown network '{}'", other))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> HawalaResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HawalaError::invalid_input(format!("{}{} is not a valid number: '{}'", ENV_PREFIX, name, value)))
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(host)) => host == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Parse a provider URL. HTTPS is required except for loopback hosts, and
/// credentials may not be embedded in the URL.
pub fn validate_endpoint(raw: &str) -> HawalaResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| HawalaError::invalid_input(format!("Invalid endpoint URL: {}", e)))?;

    if url.host().is_none() {
        return Err(HawalaError::invalid_input("Endpoint URL has no host"));
    }
    match url.scheme() {
        "https" => {}
        "http" if is_loopback(&url) => {}
        "http" => return Err(HawalaError::invalid_input("HTTPS required for remote endpoints")),
        other => return Err(HawalaError::invalid_input(format!("Unsupported URL scheme: {}", other))),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(HawalaError::invalid_input("Endpoint URL must not embed credentials"));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.clock_skew_offsets, vec![15, 30, 60, 120, 180]);
    }

    #[test]
    fn test_from_json_partial() {
        let config = CoreConfig::from_json(
            r#"{
                "network": "testnet",
                "endpoints": [{"url": "https://testnet.toncenter.com/api/v2/", "api_key": "k"}],
                "retry": {"max_attempts": 2},
                "vault": {"kdf_version": 1}
            }"#,
        )
        .unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.endpoints[0].api_key.as_deref(), Some("k"));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_ms, RetryPolicy::default().base_delay_ms);
        assert_eq!(config.vault.kdf_version, 1);
        assert_eq!(config.message_ttl_secs, 60);
        assert!(config.validate().is_ok());
        assert!(CoreConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_apply_vars() {
        let mut config = CoreConfig::default();
        config
            .apply_vars(vars(&[
                ("HAWALA_TON_NETWORK", "TESTNET"),
                ("HAWALA_TON_API_KEY", "secret"),
                ("HAWALA_TON_ENDPOINTS", "https://a.example/api/v2, http://127.0.0.1:8081"),
                ("HAWALA_TON_CLOCK_SKEW_OFFSETS", "0,20,90"),
                ("HAWALA_TON_BATCH_VALUE", "50000000"),
                ("UNRELATED", "x"),
            ]))
            .unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.endpoints.len(), 2);
        assert!(config.endpoints.iter().all(|e| e.api_key.as_deref() == Some("secret")));
        assert_eq!(config.clock_skew_offsets, vec![0, 20, 90]);
        assert_eq!(config.batch_value, 50_000_000);
        assert!(config.validate().is_ok());

        assert!(config.apply_vars(vars(&[("HAWALA_TON_MESSAGE_TTL_SECS", "soon")])).is_err());
        assert!(config.apply_vars(vars(&[("HAWALA_TON_NETWORK", "devnet")])).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CoreConfig::default();
        config.clock_skew_offsets = vec![30, 15];
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.endpoints = vec![EndpointConfig::new("http://toncenter.com/api/v2")];
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("https://toncenter.com/api/v2/").is_ok());
        assert!(validate_endpoint("http://localhost:8081").is_ok());
        assert!(validate_endpoint("http://[::1]:8081").is_ok());
        assert!(validate_endpoint("http://192.168.1.5").is_err());
        assert!(validate_endpoint("ftp://toncenter.com").is_err());
        assert!(validate_endpoint("https://user:pw@toncenter.com").is_err());
        assert!(validate_endpoint("not a url").is_err());
    }
}
