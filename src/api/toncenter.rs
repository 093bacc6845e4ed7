//! Toncenter v2 HTTP client

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::client::{AccountStatus, ChainClient};
use crate::address::TonAddress;
use crate::config::validate_endpoint;
use crate::error::{ErrorCode, HawalaError, HawalaResult};
use crate::types::Network;
use crate::utils::base64_encode;

pub const TONCENTER_MAINNET: &str = "https://toncenter.com/api/v2/";
pub const TONCENTER_TESTNET: &str = "https://testnet.toncenter.com/api/v2/";

/// `runGetMethod` exit code for an account without code
const EXIT_CODE_UNINITIALIZED: i64 = -13;

pub struct ToncenterClient {
    name: String,
    base: Url,
    api_key: Option<String>,
    http: Client,
}

impl ToncenterClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> HawalaResult<Self> {
        let mut base = validate_endpoint(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("Hawala/1.0")
            .build()
            .map_err(|e| HawalaError::network_error(format!("Failed to create HTTP client: {}", e)))?;
        let name = base.host_str().unwrap_or("toncenter").to_string();
        Ok(Self {
            name,
            base,
            api_key: api_key.filter(|k| !k.is_empty()),
            http,
        })
    }

    pub fn for_network(network: Network, api_key: Option<String>, timeout: Duration) -> HawalaResult<Self> {
        let base = match network {
            Network::Mainnet => TONCENTER_MAINNET,
            Network::Testnet => TONCENTER_TESTNET,
        };
        Self::new(base, api_key, timeout)
    }

    fn endpoint(&self, method: &str) -> HawalaResult<Url> {
        self.base
            .join(method)
            .map_err(|e| HawalaError::invalid_input(format!("Bad endpoint {}: {}", method, e)))
    }

    async fn get(&self, method: &str, address: &TonAddress) -> HawalaResult<Value> {
        let mut request = self
            .http
            .get(self.endpoint(method)?)
            .query(&[("address", address.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key.as_str());
        }
        read_response(request.send().await?).await
    }

    async fn post(&self, method: &str, body: &Value) -> HawalaResult<Value> {
        let mut request = self.http.post(self.endpoint(method)?).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key.as_str());
        }
        read_response(request.send().await?).await
    }
}

async fn read_response(response: Response) -> HawalaResult<Value> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    if !(200..300).contains(&status) {
        return Err(classify_status(status, &text));
    }
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| HawalaError::parse_error(format!("Malformed provider response: {}", e)))?;
    unwrap_envelope(value)
}

/// Map an HTTP failure onto the error taxonomy.
/// A contract refusing the message is final; provider trouble is transient.
pub fn classify_status(status: u16, body: &str) -> HawalaError {
    let lower = body.to_lowercase();
    let rejected = lower.contains("exit code")
        || lower.contains("exitcode")
        || lower.contains("was not accepted");
    let snippet: String = body.chars().take(200).collect();

    if status == 429 {
        HawalaError::rate_limited("Provider rate limit exceeded").with_details(snippet)
    } else if rejected {
        HawalaError::message_rejected("Message rejected by the wallet contract").with_details(snippet)
    } else if status == 504 {
        HawalaError::timeout("Provider gateway timed out").with_details(snippet)
    } else if status >= 500 {
        HawalaError::provider_unavailable(format!("Provider returned {}", status)).with_details(snippet)
    } else {
        HawalaError::new(ErrorCode::RequestRejected, format!("Provider returned {}", status))
            .with_details(snippet)
    }
}

/// `{"ok": true, "result": ...}` → result
pub fn unwrap_envelope(value: Value) -> HawalaResult<Value> {
    match value.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        Some(false) => {
            let code = value.get("code").and_then(Value::as_u64).unwrap_or(500) as u16;
            let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
            Err(classify_status(code, error))
        }
        None => Err(HawalaError::parse_error("Response has no ok field")),
    }
}

fn parse_number(raw: &str) -> Option<u128> {
    let raw = raw.trim();
    match raw.strip_prefix("0x") {
        Some(hex) => u128::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Seqno from a `runGetMethod` result
pub fn parse_seqno(result: &Value) -> HawalaResult<u32> {
    let exit_code = result.get("exit_code").and_then(Value::as_i64).unwrap_or(0);
    if exit_code == EXIT_CODE_UNINITIALIZED {
        return Ok(0);
    }
    if exit_code != 0 {
        return Err(HawalaError::parse_error(format!("seqno get-method failed with exit code {}", exit_code)));
    }
    let entry = result
        .get("stack")
        .and_then(|s| s.get(0))
        .and_then(|e| e.get(1))
        .and_then(Value::as_str)
        .ok_or_else(|| HawalaError::parse_error("seqno result has no stack value"))?;
    parse_number(entry)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| HawalaError::parse_error(format!("Invalid seqno {}", entry)))
}

/// Balance from a `getAddressBalance` result (a decimal string)
pub fn parse_balance(result: &Value) -> HawalaResult<u128> {
    let parsed = match result {
        Value::String(s) => parse_number(s),
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    };
    parsed.ok_or_else(|| HawalaError::parse_error(format!("Invalid balance {}", result)))
}

#[async_trait]
impl ChainClient for ToncenterClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_seqno(&self, address: &TonAddress) -> HawalaResult<u32> {
        let body = json!({
            "address": address.to_string(),
            "method": "seqno",
            "stack": [],
        });
        let result = self.post("runGetMethod", &body).await?;
        parse_seqno(&result)
    }

    async fn get_balance(&self, address: &TonAddress) -> HawalaResult<u128> {
        let result = self.get("getAddressBalance", address).await?;
        parse_balance(&result)
    }

    async fn get_account_status(&self, address: &TonAddress) -> HawalaResult<AccountStatus> {
        let result = self.get("getAddressState", address).await?;
        result
            .as_str()
            .map(AccountStatus::from_api)
            .ok_or_else(|| HawalaError::parse_error("Account state is not a string"))
    }

    async fn send_boc(&self, boc: &[u8]) -> HawalaResult<()> {
        let body = json!({ "boc": base64_encode(boc) });
        self.post("sendBoc", &body).await?;
        crate::log_info!("toncenter", "Submitted external message", provider = self.name, bytes = boc.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(429, "").code, ErrorCode::RateLimited);
        assert_eq!(classify_status(503, "overloaded").code, ErrorCode::ProviderUnavailable);
        assert_eq!(classify_status(504, "").code, ErrorCode::Timeout);
        assert_eq!(classify_status(401, "bad key").code, ErrorCode::RequestRejected);
        let rejected = classify_status(
            500,
            "LITE_SERVER_UNKNOWN: cannot apply external message: exitcode=33, steps=12",
        );
        assert_eq!(rejected.code, ErrorCode::MessageRejected);
        assert_eq!(rejected.category(), ErrorCategory::Authorization);
        assert!(!rejected.is_retryable());
        assert!(classify_status(502, "").is_retryable());
    }

    #[test]
    fn test_unwrap_envelope() {
        let ok = unwrap_envelope(json!({"ok": true, "result": "42"})).unwrap();
        assert_eq!(ok, json!("42"));
        let err = unwrap_envelope(json!({"ok": false, "error": "rate limit", "code": 429})).unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimited);
        assert!(unwrap_envelope(json!({"result": 1})).is_err());
    }

    #[test]
    fn test_parse_seqno() {
        let active = json!({"gas_used": 100, "stack": [["num", "0x1a"]], "exit_code": 0});
        assert_eq!(parse_seqno(&active).unwrap(), 26);
        let uninit = json!({"gas_used": 0, "stack": [], "exit_code": -13});
        assert_eq!(parse_seqno(&uninit).unwrap(), 0);
        assert!(parse_seqno(&json!({"stack": [], "exit_code": 11})).is_err());
        assert!(parse_seqno(&json!({"stack": [], "exit_code": 0})).is_err());
    }

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_balance(&json!("1500000000")).unwrap(), 1_500_000_000);
        assert_eq!(parse_balance(&json!(7)).unwrap(), 7);
        assert!(parse_balance(&json!("abc")).is_err());
    }

    #[test]
    fn test_endpoint_join() {
        let client = ToncenterClient::new("https://toncenter.com/api/v2", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint("sendBoc").unwrap().as_str(),
            "https://toncenter.com/api/v2/sendBoc"
        );
        assert_eq!(client.name(), "toncenter.com");
        assert!(ToncenterClient::new("http://example.com/api", None, Duration::from_secs(5)).is_err());
    }
}
