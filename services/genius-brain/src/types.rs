//! Data contracts shared by producers and the brain

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ProducerError;

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Market input for one decision cycle
#[derive(Debug, Clone, Serialize)]
pub struct MarketContext {
    /// Asset symbol (e.g., "BTC")
    pub symbol: String,
    /// Current price, used as entry
    pub current_price: Decimal,
    /// Price history, oldest first
    pub candles: Vec<Candle>,
}

impl MarketContext {
    pub fn new(symbol: impl Into<String>, current_price: Decimal, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            current_price,
            candles,
        }
    }

    /// Build a context priced at the last candle's close
    pub fn from_candles(symbol: impl Into<String>, candles: Vec<Candle>) -> Option<Self> {
        let price = candles.last()?.close;
        Some(Self::new(symbol, price, candles))
    }
}

/// What a producer hands back on success
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerOutput {
    /// -1.0 (bearish) to 1.0 (bullish)
    pub signal: f64,
    /// 0.0 to 1.0
    pub confidence: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl ProducerOutput {
    pub fn new(signal: f64, confidence: f64) -> Self {
        Self {
            signal,
            confidence,
            reasons: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    /// Reject anything outside the signal contract. Values are not clamped.
    pub fn validate(&self) -> std::result::Result<(), ProducerError> {
        if !self.signal.is_finite() || !(-1.0..=1.0).contains(&self.signal) {
            return Err(ProducerError::InvalidOutput(format!(
                "signal {} outside [-1, 1]",
                self.signal
            )));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ProducerError::InvalidOutput(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// The shape every producer result takes once it reaches the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContract {
    pub producer_id: String,
    pub signal: f64,
    pub confidence: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignalContract {
    /// Active contract from a validated producer output
    pub fn active(producer_id: impl Into<String>, output: ProducerOutput) -> Self {
        Self {
            producer_id: producer_id.into(),
            signal: output.signal,
            confidence: output.confidence,
            reasons: output.reasons,
            active: true,
            error: None,
        }
    }

    /// Inactive contract carrying the failure message
    pub fn inactive(producer_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            producer_id: producer_id.into(),
            signal: 0.0,
            confidence: 0.0,
            reasons: Vec::new(),
            active: false,
            error: Some(error.into()),
        }
    }

    /// Signal as seen by aggregation: zero when inactive, whatever the literal value
    pub fn effective_signal(&self) -> f64 {
        if self.active {
            self.signal
        } else {
            0.0
        }
    }

    /// Confidence as seen by aggregation: zero when inactive
    pub fn effective_confidence(&self) -> f64 {
        if self.active {
            self.confidence
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_validation() {
        assert!(ProducerOutput::new(0.5, 0.5).validate().is_ok());
        assert!(ProducerOutput::new(-1.0, 0.0).validate().is_ok());
        assert!(ProducerOutput::new(1.0, 1.0).validate().is_ok());

        assert!(ProducerOutput::new(1.2, 0.5).validate().is_err());
        assert!(ProducerOutput::new(0.5, -0.1).validate().is_err());
        assert!(ProducerOutput::new(f64::NAN, 0.5).validate().is_err());
        assert!(ProducerOutput::new(0.5, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_inactive_contract_is_zeroed() {
        let contract = SignalContract::inactive("sentiment", "connection refused");
        assert!(!contract.active);
        assert_eq!(contract.signal, 0.0);
        assert_eq!(contract.confidence, 0.0);
        assert!(contract.reasons.is_empty());
        assert_eq!(contract.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_inactive_literal_values_are_ignored() {
        // A hand-built contract that lies about its values still counts as zero
        let contract = SignalContract {
            producer_id: "liar".to_string(),
            signal: 0.9,
            confidence: 0.9,
            reasons: vec![],
            active: false,
            error: None,
        };
        assert_eq!(contract.effective_signal(), 0.0);
        assert_eq!(contract.effective_confidence(), 0.0);
    }

    #[test]
    fn test_context_from_candles() {
        assert!(MarketContext::from_candles("BTC", vec![]).is_none());

        let candle = Candle {
            timestamp: Utc::now(),
            open: Decimal::from(99),
            high: Decimal::from(101),
            low: Decimal::from(98),
            close: Decimal::from(100),
            volume: Decimal::from(10),
        };
        let ctx = MarketContext::from_candles("BTC", vec![candle]).unwrap();
        assert_eq!(ctx.current_price, Decimal::from(100));
        assert_eq!(ctx.symbol, "BTC");
    }
}
