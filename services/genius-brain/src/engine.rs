//! Brain engine - one full decision cycle
//!
//! validate input -> fan out to producers -> aggregate -> size risk -> explain.
//! Only input validation and cancellation can fail a cycle; everything a
//! producer does wrong ends up as data in the decision.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::config::{EngineConfig, ZeroAtrPolicy};
use crate::decision::{Action, Decision, ProducerResult};
use crate::error::{BrainError, Result};
use crate::explain::DecisionExplainer;
use crate::producer::{collect_signals, ProducerRegistry};
use crate::risk::{average_true_range, RiskSizer};
use crate::types::{MarketContext, SignalContract};
use crate::weights::{WeightProfile, WeightProfileHandle};

pub const ZERO_ATR_WARNING: &str = "ATR is zero: stop loss and take profit equal entry";

/// Evaluates registered producers against the current weight profile
pub struct BrainEngine {
    config: EngineConfig,
    registry: ProducerRegistry,
    weights: WeightProfileHandle,
    aggregator: Aggregator,
    sizer: RiskSizer,
    explainer: DecisionExplainer,
}

impl BrainEngine {
    /// Create new engine. Fails on invalid thresholds.
    pub fn new(
        config: EngineConfig,
        registry: ProducerRegistry,
        weights: WeightProfileHandle,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            aggregator: Aggregator::new(config.aggregation),
            sizer: RiskSizer::new(config.risk),
            explainer: DecisionExplainer::new(config.explainer.clone()),
            config,
            registry,
            weights,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProducerRegistry {
        &self.registry
    }

    /// Handle for hot-swapping weights between cycles
    pub fn weights(&self) -> &WeightProfileHandle {
        &self.weights
    }

    /// Run one decision cycle
    pub async fn decide(&self, ctx: &MarketContext) -> Result<Decision> {
        self.decide_with_cancel(ctx, std::future::pending::<()>())
            .await
    }

    /// Run one decision cycle, giving up as soon as `cancel` resolves.
    ///
    /// On cancellation the producer tasks still in flight are aborted.
    pub async fn decide_with_cancel<C>(&self, ctx: &MarketContext, cancel: C) -> Result<Decision>
    where
        C: Future<Output = ()>,
    {
        let atr = self.validate_input(ctx)?;
        let profile = self.weights.snapshot().await;

        let shared = Arc::new(ctx.clone());
        let contracts = tokio::select! {
            biased;
            _ = cancel => {
                warn!("{} decision cycle cancelled before all producers reported", ctx.symbol);
                return Err(BrainError::Cancelled);
            }
            contracts = collect_signals(self.registry.adapters(), shared) => contracts,
        };

        Ok(self.assemble(&ctx.symbol, ctx.current_price, atr, &profile, contracts))
    }

    /// Check price and history, returning the ATR for risk levels
    fn validate_input(&self, ctx: &MarketContext) -> Result<Decimal> {
        if ctx.current_price <= Decimal::ZERO {
            return Err(BrainError::InputValidation(format!(
                "current price must be positive, got {}",
                ctx.current_price
            )));
        }

        let atr = average_true_range(&ctx.candles, self.config.risk.atr_period)?;

        if atr.is_zero() && self.config.risk.zero_atr_policy == ZeroAtrPolicy::Reject {
            return Err(BrainError::InputValidation(format!(
                "ATR({}) is zero for {}, refusing degenerate risk levels",
                self.config.risk.atr_period, ctx.symbol
            )));
        }

        Ok(atr)
    }

    /// Build a decision from collected contracts. Pure apart from logging.
    ///
    /// `contracts` must be in registration order for a stable explanation.
    /// A repeated producer id keeps its first contract only.
    pub(crate) fn assemble(
        &self,
        symbol: &str,
        price: Decimal,
        atr: Decimal,
        profile: &WeightProfile,
        contracts: Vec<SignalContract>,
    ) -> Decision {
        let mut seen = HashSet::new();
        let results: Vec<ProducerResult> = contracts
            .into_iter()
            .filter(|contract| {
                let first = seen.insert(contract.producer_id.clone());
                if !first {
                    warn!("{} reported twice, keeping the first result", contract.producer_id);
                }
                first
            })
            .map(|contract| {
                if !profile.contains(&contract.producer_id) {
                    warn!(
                        "{} has no weight in profile '{}', contributing nothing",
                        contract.producer_id,
                        profile.name()
                    );
                }
                let weight = profile.weight_for(&contract.producer_id);
                debug!(
                    "{}: active={} signal={:.2} conf={:.2} weight={:.3}",
                    contract.producer_id,
                    contract.active,
                    contract.signal,
                    contract.confidence,
                    weight
                );
                ProducerResult::new(contract, weight)
            })
            .collect();

        let aggregation = self.aggregator.aggregate(&results);
        let action = Action::classify(
            aggregation.score,
            aggregation.confidence,
            &self.config.actions,
        );
        let levels = self.sizer.levels(price, aggregation.score, atr);
        let position_size_pct = self
            .sizer
            .position_size(aggregation.confidence, aggregation.score);
        let reasons = self.explainer.explain(&results, aggregation.score);

        let mut warnings = aggregation.warnings;
        if atr.is_zero() {
            warnings.push(ZERO_ATR_WARNING.to_string());
        }

        info!(
            "{} decision: {} (score={:.2}, conf={:.2}, active={}, inactive={})",
            symbol,
            action,
            aggregation.score,
            aggregation.confidence,
            aggregation.active_count,
            aggregation.inactive_count
        );

        let module_results: BTreeMap<String, ProducerResult> = results
            .into_iter()
            .map(|r| (r.producer_id().to_string(), r))
            .collect();

        Decision {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            action,
            final_score: aggregation.score,
            confidence: aggregation.confidence,
            entry_price: levels.entry,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            position_size_pct,
            reasons,
            warnings,
            timestamp: Utc::now(),
            module_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{NO_ACTIVE_MODULES, NO_CONFIDENT_MODULES};
    use crate::config::RiskConfig;
    use crate::types::{Candle, ProducerOutput};
    use std::collections::HashMap;
    use std::time::Duration;

    fn engine_with(config: EngineConfig, weights: &[(&str, f64)]) -> BrainEngine {
        let map: HashMap<String, f64> = weights.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let profile = WeightProfile::new("test", map).unwrap();
        BrainEngine::new(
            config,
            ProducerRegistry::new(Duration::from_millis(100)),
            WeightProfileHandle::new(profile),
        )
        .unwrap()
    }

    fn flat_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|_| Candle {
                timestamp: Utc::now(),
                open: Decimal::from(100),
                high: Decimal::from(100),
                low: Decimal::from(100),
                close: Decimal::from(100),
                volume: Decimal::from(1),
            })
            .collect()
    }

    #[test]
    fn test_assemble_single_producer() {
        let engine = engine_with(EngineConfig::default(), &[("trend", 1.0)]);
        let profile = WeightProfile::new("one", HashMap::from([("trend".to_string(), 1.0)])).unwrap();

        let decision = engine.assemble(
            "BTC",
            Decimal::from(100_000),
            Decimal::from(500),
            &profile,
            vec![SignalContract::active("trend", ProducerOutput::new(0.8, 0.9))],
        );

        assert_eq!(decision.action, Action::StrongLong);
        assert!((decision.final_score - 0.8).abs() < 1e-9);
        assert_eq!(decision.stop_loss, Decimal::from(99_000));
        assert_eq!(decision.take_profit, Decimal::from(103_000));
        assert_eq!(decision.reasons[0], "Bullish confluence: 0.80");
        assert_eq!(decision.module_results["trend"].weight, 1.0);
    }

    #[test]
    fn test_assemble_unknown_producer_gets_zero_weight() {
        let engine = engine_with(EngineConfig::default(), &[("trend", 1.0)]);
        let profile = WeightProfile::new("one", HashMap::from([("trend".to_string(), 1.0)])).unwrap();

        let decision = engine.assemble(
            "BTC",
            Decimal::from(100),
            Decimal::from(1),
            &profile,
            vec![SignalContract::active("stranger", ProducerOutput::new(1.0, 1.0))],
        );

        assert_eq!(decision.module_results["stranger"].weight, 0.0);
        assert_eq!(decision.final_score, 0.0);
        assert_eq!(decision.action, Action::Neutral);
    }

    #[test]
    fn test_assemble_keeps_first_of_repeated_id() {
        let engine = engine_with(EngineConfig::default(), &[("trend", 1.0)]);
        let profile = WeightProfile::new("one", HashMap::from([("trend".to_string(), 1.0)])).unwrap();

        let decision = engine.assemble(
            "BTC",
            Decimal::from(100),
            Decimal::from(1),
            &profile,
            vec![
                SignalContract::active("trend", ProducerOutput::new(0.8, 0.9)),
                SignalContract::active("trend", ProducerOutput::new(-0.9, 0.9)),
            ],
        );

        assert_eq!(decision.module_results.len(), 1);
        assert_eq!(decision.module_results["trend"].contract.signal, 0.8);
        assert!((decision.final_score - 0.8).abs() < 1e-9);
        assert!(decision.warnings.is_empty());
        assert_eq!(decision.active_count(), 1);
    }

    #[test]
    fn test_assemble_zero_confidence_is_neutral_with_warning() {
        let engine = engine_with(EngineConfig::default(), &[("trend", 1.0)]);
        let profile = WeightProfile::new("one", HashMap::from([("trend".to_string(), 1.0)])).unwrap();

        let decision = engine.assemble(
            "BTC",
            Decimal::from(100),
            Decimal::from(1),
            &profile,
            vec![SignalContract::active("trend", ProducerOutput::new(0.9, 0.0))],
        );

        assert_eq!(decision.action, Action::Neutral);
        assert_eq!(decision.final_score, 0.0);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.warnings, vec![NO_CONFIDENT_MODULES.to_string()]);
    }

    #[tokio::test]
    async fn test_empty_registry_is_neutral() {
        let engine = engine_with(EngineConfig::default(), &[]);
        let ctx = MarketContext::new("BTC", Decimal::from(100), flat_candles(15));

        let decision = engine.decide(&ctx).await.unwrap();

        assert_eq!(decision.action, Action::Neutral);
        assert_eq!(decision.final_score, 0.0);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.warnings[0], NO_ACTIVE_MODULES);
        assert!(decision.warnings.contains(&ZERO_ATR_WARNING.to_string()));
        assert!(decision.module_results.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_short_history() {
        let engine = engine_with(EngineConfig::default(), &[]);
        let ctx = MarketContext::new("BTC", Decimal::from(100), flat_candles(14));

        let err = engine.decide(&ctx).await.unwrap_err();
        assert!(matches!(err, BrainError::InputValidation(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_price() {
        let engine = engine_with(EngineConfig::default(), &[]);
        let ctx = MarketContext::new("BTC", Decimal::ZERO, flat_candles(20));

        let err = engine.decide(&ctx).await.unwrap_err();
        assert_eq!(
            err,
            BrainError::InputValidation("current price must be positive, got 0".to_string())
        );
    }

    #[tokio::test]
    async fn test_zero_atr_reject_policy() {
        let config = EngineConfig {
            risk: RiskConfig {
                zero_atr_policy: ZeroAtrPolicy::Reject,
                ..RiskConfig::default()
            },
            ..EngineConfig::default()
        };
        let engine = engine_with(config, &[]);
        let ctx = MarketContext::new("BTC", Decimal::from(100), flat_candles(15));

        let err = engine.decide(&ctx).await.unwrap_err();
        assert!(matches!(err, BrainError::InputValidation(_)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.actions.long = 0.9;

        let result = BrainEngine::new(
            config,
            ProducerRegistry::new(Duration::from_millis(100)),
            WeightProfileHandle::new(WeightProfile::new("empty", HashMap::new()).unwrap()),
        );
        assert!(matches!(result, Err(BrainError::Configuration(_))));
    }
}
