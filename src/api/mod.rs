//! API Module
//!
//! Chain access for the wallet core: the provider contract, a toncenter
//! implementation and the resilience layer wrapped around it.

mod circuit;
mod client;
mod resilient;
mod retry;
mod toncenter;
mod watcher;

pub use circuit::*;
pub use client::*;
pub use resilient::*;
pub use retry::*;
pub use toncenter::*;
pub use watcher::*;

use std::sync::Arc;
use std::time::Duration;

use crate::config::CoreConfig;
use crate::error::HawalaResult;

/// Resilient client over every configured endpoint, or the public toncenter
/// endpoint for the network when none are configured.
pub fn client_from_config(config: &CoreConfig) -> HawalaResult<ResilientClient> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let mut client = ResilientClient::new(config.retry.clone(), timeout);

    if config.endpoints.is_empty() {
        let provider = ToncenterClient::for_network(config.network, None, timeout)?;
        return Ok(client.with_provider(Arc::new(provider), &config.circuit));
    }
    for endpoint in &config.endpoints {
        let provider = ToncenterClient::new(&endpoint.url, endpoint.api_key.clone(), timeout)?;
        client = client.with_provider(Arc::new(provider), &config.circuit);
    }
    Ok(client)
}
