//! Signal producers
//!
//! A producer is any collaborator with an opinion about the market. The brain
//! never calls one directly: each is wrapped in a `ProducerAdapter` that
//! enforces a timeout and the signal contract, and turns every failure into an
//! inactive `SignalContract` instead of an error.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{BrainError, ProducerError, Result};
use crate::types::{MarketContext, ProducerOutput, SignalContract};

pub mod remote;
pub mod technical;

pub use remote::RemoteProducer;
pub use technical::{BreakoutProducer, MomentumProducer, ReversionProducer, TrendProducer};

/// A source of trading opinions
#[async_trait::async_trait]
pub trait Producer: Send + Sync {
    /// Unique id, matched against weight profile keys
    fn id(&self) -> &str;

    /// Produce a signal for the given market. May block on I/O.
    async fn evaluate(
        &self,
        ctx: &MarketContext,
    ) -> std::result::Result<ProducerOutput, ProducerError>;
}

/// Wraps one producer so that calling it always yields a valid contract
#[derive(Clone)]
pub struct ProducerAdapter {
    producer: Arc<dyn Producer>,
    timeout: Duration,
}

impl ProducerAdapter {
    pub fn new(producer: Arc<dyn Producer>, timeout: Duration) -> Self {
        Self { producer, timeout }
    }

    pub fn id(&self) -> &str {
        self.producer.id()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call the producer once. Never fails and never retries.
    pub async fn invoke(&self, ctx: &MarketContext) -> SignalContract {
        let call = AssertUnwindSafe(self.producer.evaluate(ctx)).catch_unwind();

        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(output))) => output.validate().map(|_| output),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(panic)) => Err(ProducerError::Panicked(panic_message(panic))),
            Err(_) => Err(ProducerError::Timeout(self.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(output) => {
                debug!(
                    "{}: signal={:.2}, conf={:.2}",
                    self.id(),
                    output.signal,
                    output.confidence
                );
                SignalContract::active(self.id(), output)
            }
            Err(e) => {
                warn!("{} module error: {}", self.id(), e);
                SignalContract::inactive(self.id(), e.to_string())
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Producers registered for a run, in registration order
#[derive(Clone)]
pub struct ProducerRegistry {
    adapters: Vec<ProducerAdapter>,
    default_timeout: Duration,
}

impl ProducerRegistry {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            adapters: Vec::new(),
            default_timeout,
        }
    }

    /// Register with the registry's default timeout
    pub fn register(&mut self, producer: Arc<dyn Producer>) -> Result<()> {
        let timeout = self.default_timeout;
        self.register_with_timeout(producer, timeout)
    }

    /// Register with a producer-specific timeout
    pub fn register_with_timeout(
        &mut self,
        producer: Arc<dyn Producer>,
        timeout: Duration,
    ) -> Result<()> {
        if producer.id().is_empty() {
            return Err(BrainError::Configuration(
                "producer id must not be empty".to_string(),
            ));
        }
        if self.adapters.iter().any(|a| a.id() == producer.id()) {
            return Err(BrainError::Configuration(format!(
                "producer '{}' registered twice",
                producer.id()
            )));
        }
        self.adapters.push(ProducerAdapter::new(producer, timeout));
        Ok(())
    }

    pub fn with(mut self, producer: Arc<dyn Producer>) -> Result<Self> {
        self.register(producer)?;
        Ok(self)
    }

    pub fn adapters(&self) -> &[ProducerAdapter] {
        &self.adapters
    }

    pub fn ids(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Invoke every adapter concurrently and wait for all of them.
///
/// Results come back in adapter order regardless of completion order.
/// Dropping the returned future aborts the producer tasks still running.
pub async fn collect_signals(
    adapters: &[ProducerAdapter],
    ctx: Arc<MarketContext>,
) -> Vec<SignalContract> {
    let mut tasks = JoinSet::new();
    for (idx, adapter) in adapters.iter().enumerate() {
        let adapter = adapter.clone();
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move { (idx, adapter.invoke(&ctx).await) });
    }

    let mut slots: Vec<Option<SignalContract>> = vec![None; adapters.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, contract)) => slots[idx] = Some(contract),
            Err(e) => warn!("Producer task ended abnormally: {}", e),
        }
    }

    slots
        .into_iter()
        .zip(adapters)
        .map(|(slot, adapter)| {
            slot.unwrap_or_else(|| SignalContract::inactive(adapter.id(), "producer task aborted"))
        })
        .collect()
}
