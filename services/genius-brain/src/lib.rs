//! Genius Brain - weighted multi-producer trading decisions
//!
//! Producers supply `{signal, confidence, reasons}` opinions; the engine fans
//! out to all of them, aggregates under a weight profile, derives ATR-based
//! risk levels and explains the result.

pub mod aggregator;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod explain;
pub mod producer;
pub mod risk;
pub mod types;
pub mod weights;

pub use aggregator::{Aggregation, Aggregator};
pub use config::{
    ActionThresholds, AggregationConfig, AppConfig, EngineConfig, ExplainerConfig,
    RemoteProducerConfig, RiskConfig, ZeroAtrPolicy,
};
pub use decision::{Action, Decision, DecisionRecord, ProducerResult};
pub use engine::BrainEngine;
pub use error::{BrainError, ProducerError, Result};
pub use explain::DecisionExplainer;
pub use producer::{
    collect_signals, BreakoutProducer, MomentumProducer, Producer, ProducerAdapter,
    ProducerRegistry, RemoteProducer, ReversionProducer, TrendProducer,
};
pub use risk::{average_true_range, RiskLevels, RiskSizer};
pub use types::{Candle, MarketContext, ProducerOutput, SignalContract};
pub use weights::{WeightPreset, WeightProfile, WeightProfileHandle};
