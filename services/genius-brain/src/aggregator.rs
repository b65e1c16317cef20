//! Weighted aggregation of producer results
//!
//! Turns a cycle's producer results into one score and one confidence:
//!
//! - score is the confidence-and-weight weighted mean of active signals,
//!   dampened when bullish and bearish producers disagree
//! - confidence is the weight-weighted mean of active confidences, penalized
//!   when too many producers are inactive
//!
//! Inactive results contribute nothing whatever their literal values. Results
//! carrying no weight are disabled: they are neither directional voices nor
//! counted towards the inactive penalty.

use crate::config::AggregationConfig;
use crate::decision::ProducerResult;

pub const NO_ACTIVE_MODULES: &str = "No active modules!";
pub const NO_WEIGHTED_MODULES: &str = "No weighted active modules";
pub const NO_CONFIDENT_MODULES: &str = "No confident active modules";

/// Result of combining one cycle's producer results
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// In [-1, 1], after conflict dampening
    pub score: f64,
    /// In [0, 1], after the inactive penalty
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub active_count: usize,
    pub inactive_count: usize,
    /// Inactive results that carried weight
    pub weighted_inactive_count: usize,
    pub bullish_count: usize,
    pub bearish_count: usize,
}

impl Aggregation {
    fn degenerate(inactive_count: usize, weighted_inactive_count: usize) -> Self {
        Self {
            score: 0.0,
            confidence: 0.0,
            warnings: vec![NO_ACTIVE_MODULES.to_string()],
            active_count: 0,
            inactive_count,
            weighted_inactive_count,
            bullish_count: 0,
            bearish_count: 0,
        }
    }
}

pub struct Aggregator {
    config: AggregationConfig,
}

impl Aggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Combine results. Pure and independent of input order.
    pub fn aggregate(&self, results: &[ProducerResult]) -> Aggregation {
        let inactive_count = results.iter().filter(|r| !r.is_active()).count();
        let weighted_inactive_count = results
            .iter()
            .filter(|r| !r.is_active() && r.weight > 0.0)
            .count();

        let mut active: Vec<&ProducerResult> = results.iter().filter(|r| r.is_active()).collect();
        if active.is_empty() {
            return Aggregation::degenerate(inactive_count, weighted_inactive_count);
        }

        // Fixed summation order so permuted input gives bit-identical sums
        active.sort_by(|a, b| {
            a.producer_id()
                .cmp(b.producer_id())
                .then(a.contract.signal.total_cmp(&b.contract.signal))
                .then(a.contract.confidence.total_cmp(&b.contract.confidence))
                .then(a.weight.total_cmp(&b.weight))
        });

        let mut warnings = Vec::new();

        let mut weighted_sum = 0.0;
        let mut weight_confidence_sum = 0.0;
        let mut weight_total = 0.0;
        for result in &active {
            weighted_sum += result.weighted_signal();
            weight_confidence_sum += result.weight * result.contract.confidence;
            weight_total += result.weight;
        }

        let mut score = if weight_confidence_sum > 0.0 {
            weighted_sum / weight_confidence_sum
        } else {
            0.0
        };

        let threshold = self.config.directional_threshold;
        let voters = active.iter().filter(|r| r.weight > 0.0);
        let bullish_count = voters.clone().filter(|r| r.contract.signal > threshold).count();
        let bearish_count = voters.filter(|r| r.contract.signal < -threshold).count();

        if bullish_count > 0 && bearish_count > 0 {
            let conflict_ratio = bullish_count.min(bearish_count) as f64
                / bullish_count.max(bearish_count) as f64;
            if conflict_ratio > self.config.conflict_ratio_threshold {
                warnings.push(format!(
                    "Signal conflict: {} bullish vs {} bearish",
                    bullish_count, bearish_count
                ));
                score *= self.config.conflict_dampening;
            }
        }

        let mut confidence = if weight_total <= 0.0 {
            warnings.push(NO_WEIGHTED_MODULES.to_string());
            score = 0.0;
            0.0
        } else if weight_confidence_sum <= 0.0 {
            warnings.push(NO_CONFIDENT_MODULES.to_string());
            score = 0.0;
            0.0
        } else {
            weight_confidence_sum / weight_total
        };

        if weighted_inactive_count > self.config.max_inactive_before_penalty {
            warnings.push(format!("{} modules inactive", weighted_inactive_count));
            confidence *= self.config.inactive_confidence_penalty;
        }

        debug_assert!(score.abs() <= 1.0 + 1e-9, "score {} out of range", score);
        debug_assert!((-1e-9..=1.0 + 1e-9).contains(&confidence));

        Aggregation {
            score: score.clamp(-1.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            warnings,
            active_count: active.len(),
            inactive_count,
            weighted_inactive_count,
            bullish_count,
            bearish_count,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}
