//! Resilient Chain Client
//!
//! Fans a call out over the configured providers in priority order. Each
//! provider sits behind its own circuit breaker and every call is bounded
//! by a timeout. A round that fails transiently on every provider is retried
//! under the retry policy.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::circuit::{CircuitBreaker, CircuitConfig, CircuitStatus};
use super::client::{AccountStatus, ChainClient};
use super::retry::RetryPolicy;
use crate::address::TonAddress;
use crate::error::{HawalaError, HawalaResult};

struct Provider {
    client: Arc<dyn ChainClient>,
    breaker: CircuitBreaker,
}

#[derive(Clone, Copy)]
enum Request<'a> {
    Seqno(&'a TonAddress),
    Balance(&'a TonAddress),
    Status(&'a TonAddress),
    Send(&'a [u8]),
}

impl Request<'_> {
    fn label(&self) -> &'static str {
        match self {
            Request::Seqno(_) => "get_seqno",
            Request::Balance(_) => "get_balance",
            Request::Status(_) => "get_account_status",
            Request::Send(_) => "send_boc",
        }
    }
}

enum Response {
    Seqno(u32),
    Balance(u128),
    Status(AccountStatus),
    Sent,
}

async fn dispatch(client: &dyn ChainClient, request: Request<'_>) -> HawalaResult<Response> {
    Ok(match request {
        Request::Seqno(address) => Response::Seqno(client.get_seqno(address).await?),
        Request::Balance(address) => Response::Balance(client.get_balance(address).await?),
        Request::Status(address) => Response::Status(client.get_account_status(address).await?),
        Request::Send(boc) => {
            client.send_boc(boc).await?;
            Response::Sent
        }
    })
}

fn mismatched() -> HawalaError {
    HawalaError::internal("Provider returned a response of the wrong kind")
}

pub struct ResilientClient {
    providers: Vec<Provider>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResilientClient {
    pub fn new(retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            retry,
            call_timeout,
        }
    }

    /// Append a provider; earlier providers are preferred
    pub fn with_provider(mut self, client: Arc<dyn ChainClient>, circuit: &CircuitConfig) -> Self {
        let breaker = CircuitBreaker::from_config(client.name(), circuit);
        self.providers.push(Provider { client, breaker });
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Breaker state per provider, in priority order
    pub fn circuit_status(&self) -> Vec<(String, CircuitStatus)> {
        self.providers
            .iter()
            .map(|p| (p.breaker.name().to_string(), p.breaker.status()))
            .collect()
    }

    async fn call(&self, request: Request<'_>) -> HawalaResult<Response> {
        if self.providers.is_empty() {
            return Err(HawalaError::provider_unavailable("No chain providers configured"));
        }
        self.retry.run(request.label(), move || self.round(request)).await
    }

    /// One pass over the providers
    async fn round(&self, request: Request<'_>) -> HawalaResult<Response> {
        let mut last_error = None;

        for provider in &self.providers {
            let permit = match provider.breaker.before_call() {
                Ok(permit) => permit,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            let outcome = match tokio::time::timeout(
                self.call_timeout,
                dispatch(provider.client.as_ref(), request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(HawalaError::timeout(format!(
                    "{} did not answer within {}ms",
                    provider.client.name(),
                    self.call_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(response) => {
                    permit.succeeded();
                    return Ok(response);
                }
                Err(e) if e.is_retryable() => {
                    permit.failed();
                    crate::log_warn!(
                        "resilient",
                        "Provider failed, trying next",
                        provider = provider.client.name(),
                        operation = request.label(),
                        error = e.message,
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    // The provider answered; the request itself is bad
                    permit.succeeded();
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| HawalaError::provider_unavailable("No chain provider accepted the call")))
    }
}

#[async_trait]
impl ChainClient for ResilientClient {
    fn name(&self) -> &str {
        "resilient"
    }

    async fn get_seqno(&self, address: &TonAddress) -> HawalaResult<u32> {
        match self.call(Request::Seqno(address)).await? {
            Response::Seqno(seqno) => Ok(seqno),
            _ => Err(mismatched()),
        }
    }

    async fn get_balance(&self, address: &TonAddress) -> HawalaResult<u128> {
        match self.call(Request::Balance(address)).await? {
            Response::Balance(balance) => Ok(balance),
            _ => Err(mismatched()),
        }
    }

    async fn get_account_status(&self, address: &TonAddress) -> HawalaResult<AccountStatus> {
        match self.call(Request::Status(address)).await? {
            Response::Status(status) => Ok(status),
            _ => Err(mismatched()),
        }
    }

    async fn send_boc(&self, boc: &[u8]) -> HawalaResult<()> {
        match self.call(Request::Send(boc)).await? {
            Response::Sent => Ok(()),
            _ => Err(mismatched()),
        }
    }
}
