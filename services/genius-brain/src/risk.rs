//! Stop-loss / take-profit levels and position sizing from ATR

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::error::{BrainError, Result};
use crate::producer::technical::true_range;
use crate::types::Candle;

/// Mean of the last `period` true ranges.
///
/// Needs `period + 1` candles since every true range looks at the previous close.
pub fn average_true_range(candles: &[Candle], period: usize) -> Result<Decimal> {
    if period == 0 {
        return Err(BrainError::Configuration(
            "ATR period must be at least 1".to_string(),
        ));
    }
    if candles.len() < period + 1 {
        return Err(BrainError::InputValidation(format!(
            "ATR({}) needs {} candles, got {}",
            period,
            period + 1,
            candles.len()
        )));
    }

    let sum: Decimal = candles
        .windows(2)
        .rev()
        .take(period)
        .map(|pair| true_range(&pair[1], &pair[0]))
        .sum();

    Ok(sum / Decimal::from(period as i64))
}

/// Absolute price levels for a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// SL/TP around `price` at the configured ATR multiples.
    ///
    /// `score > 0` is a long setup, anything else short. A score of exactly 0
    /// therefore gets short levels; the action for such a score is NEUTRAL.
    pub fn levels(&self, price: Decimal, score: f64, atr: Decimal) -> RiskLevels {
        let stop_distance = atr * self.config.stop_loss_atr_multiple;
        let target_distance = atr * self.config.take_profit_atr_multiple;

        if score > 0.0 {
            RiskLevels {
                entry: price,
                stop_loss: price - stop_distance,
                take_profit: price + target_distance,
            }
        } else {
            RiskLevels {
                entry: price,
                stop_loss: price + stop_distance,
                take_profit: price - target_distance,
            }
        }
    }

    /// % of capital, scaled by confidence and signal strength, clamped to the
    /// configured band. Never gates the trade.
    pub fn position_size(&self, confidence: f64, score: f64) -> f64 {
        let strength = (score.abs() + self.config.signal_strength_offset).min(1.0);
        let size = self.config.base_position_pct * confidence * strength;

        if size.is_nan() {
            return self.config.min_position_pct;
        }
        size.clamp(self.config.min_position_pct, self.config.max_position_pct)
    }
}

impl Default for RiskSizer {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}
