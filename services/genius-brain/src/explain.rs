//! Human-readable reasons for a decision

use crate::config::ExplainerConfig;
use crate::decision::ProducerResult;

pub struct DecisionExplainer {
    config: ExplainerConfig,
}

impl DecisionExplainer {
    pub fn new(config: ExplainerConfig) -> Self {
        Self { config }
    }

    /// Headline, then top contributors, then the primary producer's own reasons.
    ///
    /// `results` must be in registration order: ties in |weighted signal| keep
    /// that order. Inactive results still take a ranking slot but are not listed.
    pub fn explain(&self, results: &[ProducerResult], score: f64) -> Vec<String> {
        let mut reasons = vec![self.headline(score)];

        let mut ranked: Vec<&ProducerResult> = results.iter().collect();
        ranked.sort_by(|a, b| {
            b.weighted_signal()
                .abs()
                .total_cmp(&a.weighted_signal().abs())
        });

        for result in ranked.into_iter().take(self.config.top_contributors) {
            if result.is_active() {
                reasons.push(format!(
                    "{}: {} ({:.2})",
                    result.producer_id(),
                    direction_arrow(result.contract.signal),
                    result.contract.signal
                ));
            }
        }

        if let Some(primary) = self.config.primary_producer.as_deref() {
            let primary = results
                .iter()
                .find(|r| r.producer_id() == primary && r.is_active());
            if let Some(result) = primary {
                reasons.extend(
                    result
                        .contract
                        .reasons
                        .iter()
                        .take(self.config.primary_reason_limit)
                        .cloned(),
                );
            }
        }

        reasons
    }

    fn headline(&self, score: f64) -> String {
        if score > self.config.neutral_band {
            format!("Bullish confluence: {:.2}", score)
        } else if score < -self.config.neutral_band {
            format!("Bearish confluence: {:.2}", score)
        } else {
            "No clear direction".to_string()
        }
    }
}

impl Default for DecisionExplainer {
    fn default() -> Self {
        Self::new(ExplainerConfig::default())
    }
}

fn direction_arrow(signal: f64) -> &'static str {
    if signal > 0.0 {
        "↑"
    } else if signal < 0.0 {
        "↓"
    } else {
        "→"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProducerOutput, SignalContract};

    fn active(id: &str, signal: f64, confidence: f64, weight: f64) -> ProducerResult {
        ProducerResult::new(
            SignalContract::active(id, ProducerOutput::new(signal, confidence)),
            weight,
        )
    }

    #[test]
    fn test_headline() {
        let explainer = DecisionExplainer::default();
        assert_eq!(explainer.explain(&[], 0.45)[0], "Bullish confluence: 0.45");
        assert_eq!(explainer.explain(&[], -0.3)[0], "Bearish confluence: -0.30");
        assert_eq!(explainer.explain(&[], 0.1)[0], "No clear direction");
    }

    #[test]
    fn test_top_contributors_ranked_by_weighted_signal() {
        let results = vec![
            active("small", 0.2, 0.5, 0.1),
            active("bear", -0.9, 0.9, 0.3),
            active("bull", 0.8, 0.9, 0.3),
            active("flat", 0.0, 1.0, 0.3),
        ];
        let reasons = DecisionExplainer::default().explain(&results, 0.0);

        assert_eq!(
            reasons,
            vec![
                "No clear direction".to_string(),
                "bear: ↓ (-0.90)".to_string(),
                "bull: ↑ (0.80)".to_string(),
                "small: ↑ (0.20)".to_string(),
            ]
        );
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let results = vec![
            active("first", 0.5, 1.0, 0.25),
            active("second", -0.5, 1.0, 0.25),
            active("third", 0.5, 1.0, 0.25),
            active("fourth", 0.5, 1.0, 0.25),
        ];
        let reasons = DecisionExplainer::default().explain(&results, 0.25);

        assert_eq!(reasons[1], "first: ↑ (0.50)");
        assert_eq!(reasons[2], "second: ↓ (-0.50)");
        assert_eq!(reasons[3], "third: ↑ (0.50)");
        assert_eq!(reasons.len(), 4);
    }

    #[test]
    fn test_inactive_takes_slot_but_is_not_listed() {
        let results = vec![
            active("lead", 0.5, 1.0, 0.5),
            ProducerResult::new(SignalContract::inactive("down", "refused"), 0.5),
            ProducerResult::new(SignalContract::inactive("gone", "refused"), 0.5),
            active("flat", 0.0, 1.0, 0.5),
        ];
        // flat ties with the inactives at zero and comes after them
        let reasons = DecisionExplainer::default().explain(&results, 0.25);
        assert_eq!(
            reasons,
            vec!["Bullish confluence: 0.25".to_string(), "lead: ↑ (0.50)".to_string()]
        );
    }

    #[test]
    fn test_primary_producer_reasons() {
        let ict = ProducerResult::new(
            SignalContract::active(
                "ict_smart_money",
                ProducerOutput::new(0.7, 0.8)
                    .with_reason("Bullish order block")
                    .with_reason("London killzone")
                    .with_reason("FVG filled"),
            ),
            0.5,
        );
        let reasons = DecisionExplainer::default().explain(&[ict], 0.7);

        assert_eq!(reasons.len(), 4);
        assert_eq!(reasons[2], "Bullish order block");
        assert_eq!(reasons[3], "London killzone");
    }

    #[test]
    fn test_primary_producer_configurable() {
        let config = ExplainerConfig {
            primary_producer: Some("trend".to_string()),
            ..ExplainerConfig::default()
        };
        let trend = ProducerResult::new(
            SignalContract::active("trend", ProducerOutput::new(0.4, 0.8).with_reason("EMA cross")),
            1.0,
        );
        let reasons = DecisionExplainer::new(config).explain(&[trend], 0.4);
        assert_eq!(reasons.last().map(String::as_str), Some("EMA cross"));
    }
}
