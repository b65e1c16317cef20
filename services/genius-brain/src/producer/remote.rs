//! HTTP-backed producer
//!
//! Posts the market context as JSON and expects a `ProducerOutput` body
//! back. Lets sentiment, on-chain or model services plug in without linking
//! them into the brain.

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;

use super::Producer;
use crate::config::RemoteProducerConfig;
use crate::error::{BrainError, ProducerError, Result};
use crate::types::{Candle, MarketContext, ProducerOutput};

/// Request body sent to remote producers
#[derive(Debug, Serialize)]
struct EvaluateRequest<'a> {
    symbol: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    current_price: Decimal,
    candles: &'a [Candle],
}

/// Producer that delegates to an HTTP endpoint
pub struct RemoteProducer {
    id: String,
    url: String,
    client: Client,
}

impl RemoteProducer {
    pub fn new(id: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| BrainError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            id: id.into(),
            url: url.into(),
            client,
        })
    }

    pub fn from_config(config: &RemoteProducerConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(BrainError::Configuration(format!(
                "remote producer '{}' has no url",
                config.id
            )));
        }
        Self::new(
            config.id.clone(),
            config.url.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Producer for RemoteProducer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(
        &self,
        ctx: &MarketContext,
    ) -> std::result::Result<ProducerOutput, ProducerError> {
        let body = EvaluateRequest {
            symbol: &ctx.symbol,
            current_price: ctx.current_price,
            candles: &ctx.candles,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProducerError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProducerError::Http(format!(
                "{} returned {}: {}",
                self.id, status, text
            )));
        }

        response
            .json::<ProducerOutput>()
            .await
            .map_err(|e| ProducerError::Decode(e.to_string()))
    }
}
