//! Candle-based producers
//!
//! Trend, mean reversion, breakout and momentum opinions computed straight
//! from the market context's candles. Each one fails (and so goes inactive)
//! when the history is too short for its lookback.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::Producer;
use crate::error::ProducerError;
use crate::types::{Candle, MarketContext, ProducerOutput};

type Outcome = std::result::Result<ProducerOutput, ProducerError>;

/// EMA spread (as a fraction of the slow EMA) that maps to a full signal
const TREND_SPREAD_SCALE: f64 = 20.0;
/// Rate of change that maps to a full momentum signal is 1 / this
const MOMENTUM_SCALE: f64 = 10.0;

/// EMA crossover trend follower
///
/// Signal is the fast/slow EMA spread, confidence the directional index.
pub struct TrendProducer {
    id: String,
    fast_period: usize,
    slow_period: usize,
    adx_period: usize,
}

impl TrendProducer {
    pub fn new() -> Self {
        Self {
            id: "trend".to_string(),
            fast_period: 12,
            slow_period: 26,
            adx_period: 14,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_periods(mut self, fast: usize, slow: usize) -> Self {
        self.fast_period = fast;
        self.slow_period = slow;
        self
    }
}

impl Default for TrendProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Producer for TrendProducer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, ctx: &MarketContext) -> Outcome {
        let candles = &ctx.candles;
        let needed = self.slow_period.max(self.adx_period) + 1;
        require_history(candles, needed)?;

        let fast = ema(candles, self.fast_period)
            .ok_or_else(|| ProducerError::Failed("fast EMA unavailable".to_string()))?;
        let slow = ema(candles, self.slow_period)
            .ok_or_else(|| ProducerError::Failed("slow EMA unavailable".to_string()))?;

        if slow <= Decimal::ZERO {
            return Err(ProducerError::Failed(format!(
                "slow EMA must be positive, got {}",
                slow
            )));
        }

        let spread = to_f64((fast - slow) / slow);
        let signal = (spread * TREND_SPREAD_SCALE).clamp(-1.0, 1.0);

        let dx = directional_index(candles, self.adx_period).unwrap_or(Decimal::ZERO);
        let mut confidence = to_f64(dx) / 100.0;
        if volume_confirmed(candles, 20, 1.0) {
            confidence *= 1.1;
        }

        let relation = if fast > slow { ">" } else if fast < slow { "<" } else { "=" };
        Ok(ProducerOutput::new(signal, confidence.clamp(0.0, 1.0))
            .with_reason(format!(
                "EMA {}/{}: fast({:.2}) {} slow({:.2})",
                self.fast_period, self.slow_period, fast, relation, slow
            ))
            .with_reason(format!("Directional strength: {:.1}", dx)))
    }
}

/// RSI mean reversion: oversold is bullish, overbought bearish
pub struct ReversionProducer {
    id: String,
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl ReversionProducer {
    pub fn new() -> Self {
        Self {
            id: "reversion".to_string(),
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_bands(mut self, oversold: f64, overbought: f64) -> Self {
        self.oversold = oversold;
        self.overbought = overbought;
        self
    }
}

impl Default for ReversionProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Producer for ReversionProducer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, ctx: &MarketContext) -> Outcome {
        require_history(&ctx.candles, self.period + 1)?;

        let rsi = rsi(&ctx.candles, self.period)
            .ok_or_else(|| ProducerError::Failed("RSI unavailable".to_string()))?;

        let output = if rsi < self.oversold {
            let extremity = (self.oversold - rsi) / self.oversold;
            ProducerOutput::new(extremity, 0.5 + extremity / 2.0)
                .with_reason(format!("RSI oversold: {:.1}", rsi))
        } else if rsi > self.overbought {
            let extremity = (rsi - self.overbought) / (100.0 - self.overbought);
            ProducerOutput::new(-extremity, 0.5 + extremity / 2.0)
                .with_reason(format!("RSI overbought: {:.1}", rsi))
        } else {
            // Mild lean back towards 50 inside the bands
            let lean = ((50.0 - rsi) / 50.0 * 0.25).clamp(-0.25, 0.25);
            ProducerOutput::new(lean, 0.3).with_reason(format!("RSI neutral: {:.1}", rsi))
        };

        Ok(output)
    }
}

/// Range breakout over the candles preceding the latest one
pub struct BreakoutProducer {
    id: String,
    period: usize,
    volume_threshold: f64,
}

impl BreakoutProducer {
    pub fn new() -> Self {
        Self {
            id: "breakout".to_string(),
            period: 20,
            volume_threshold: 1.5,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }
}

impl Default for BreakoutProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Producer for BreakoutProducer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, ctx: &MarketContext) -> Outcome {
        let candles = &ctx.candles;
        require_history(candles, self.period + 1)?;

        let (support, resistance) = find_levels(&candles[..candles.len() - 1], self.period)
            .ok_or_else(|| ProducerError::Failed("range unavailable".to_string()))?;
        let range = resistance - support;
        let price = ctx.current_price;

        if range <= Decimal::ZERO {
            return Ok(ProducerOutput::new(0.0, 0.0).with_reason("Flat range, no breakout"));
        }

        let volume_ok = volume_confirmed(candles, self.period, self.volume_threshold);
        let boost = |confidence: f64| {
            if volume_ok {
                (confidence * 1.15).min(0.95)
            } else {
                confidence.min(0.95)
            }
        };

        let output = if price > resistance {
            let strength = to_f64((price - resistance) / range).min(0.5) * 2.0;
            ProducerOutput::new(strength, boost(0.4 + strength / 2.0))
                .with_reason(format!("Upside breakout above {:.2}", resistance))
        } else if price < support {
            let strength = to_f64((support - price) / range).min(0.5) * 2.0;
            ProducerOutput::new(-strength, boost(0.4 + strength / 2.0))
                .with_reason(format!("Downside breakdown below {:.2}", support))
        } else {
            ProducerOutput::new(0.0, 0.2).with_reason(format!(
                "Inside range {:.2} - {:.2}",
                support, resistance
            ))
        };

        Ok(output)
    }
}

/// Time-series momentum: rate of change over a lookback
pub struct MomentumProducer {
    id: String,
    lookback: usize,
}

impl MomentumProducer {
    pub fn new() -> Self {
        Self {
            id: "momentum".to_string(),
            lookback: 10,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }
}

impl Default for MomentumProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Producer for MomentumProducer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, ctx: &MarketContext) -> Outcome {
        let candles = &ctx.candles;
        require_history(candles, self.lookback + 1)?;

        let last = candles[candles.len() - 1].close;
        let past = candles[candles.len() - 1 - self.lookback].close;
        if past <= Decimal::ZERO {
            return Err(ProducerError::Failed(format!(
                "reference close must be positive, got {}",
                past
            )));
        }

        let roc = to_f64((last - past) / past);
        let signal = (roc * MOMENTUM_SCALE).clamp(-1.0, 1.0);
        let confidence = (signal.abs() + 0.3).min(1.0);

        Ok(ProducerOutput::new(signal, confidence).with_reason(format!(
            "Rate of change over {} candles: {:.2}%",
            self.lookback,
            roc * 100.0
        )))
    }
}

// Indicator helpers

fn require_history(candles: &[Candle], needed: usize) -> std::result::Result<(), ProducerError> {
    if candles.len() < needed {
        return Err(ProducerError::Failed(format!(
            "need {} candles, got {}",
            needed,
            candles.len()
        )));
    }
    Ok(())
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// EMA of closes, seeded with the SMA of the first `period` closes
fn ema(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let multiplier = Decimal::from(2) / (Decimal::from(period as i64) + Decimal::ONE);

    let sum: Decimal = candles.iter().take(period).map(|c| c.close).sum();
    let mut ema = sum / Decimal::from(period as i64);

    for candle in candles.iter().skip(period) {
        ema = (candle.close - ema) * multiplier + ema;
    }

    Some(ema)
}

/// Directional index (0-100) over the last `period` candles
fn directional_index(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let mut tr_sum = Decimal::ZERO;
    let mut dm_plus_sum = Decimal::ZERO;
    let mut dm_minus_sum = Decimal::ZERO;

    for i in 1..=period {
        let current = &candles[candles.len() - i];
        let previous = &candles[candles.len() - i - 1];

        tr_sum += true_range(current, previous);

        let up_move = current.high - previous.high;
        let down_move = previous.low - current.low;

        if up_move > down_move && up_move > Decimal::ZERO {
            dm_plus_sum += up_move;
        }
        if down_move > up_move && down_move > Decimal::ZERO {
            dm_minus_sum += down_move;
        }
    }

    if tr_sum == Decimal::ZERO {
        return None;
    }

    let di_plus = dm_plus_sum / tr_sum * Decimal::from(100);
    let di_minus = dm_minus_sum / tr_sum * Decimal::from(100);

    if di_plus + di_minus == Decimal::ZERO {
        return Some(Decimal::ZERO);
    }

    Some((di_plus - di_minus).abs() / (di_plus + di_minus) * Decimal::from(100))
}

/// True range of `current` against the previous close
pub(crate) fn true_range(current: &Candle, previous: &Candle) -> Decimal {
    let hl = current.high - current.low;
    let hc = (current.high - previous.close).abs();
    let lc = (current.low - previous.close).abs();
    hl.max(hc).max(lc)
}

/// Simple-average RSI over the last `period` changes
fn rsi(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    for i in (candles.len() - period)..candles.len() {
        let change = to_f64(candles[i].close - candles[i - 1].close);
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    if losses == 0.0 {
        // Flat history has no momentum either way
        return Some(if gains == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = gains / losses;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// (support, resistance) over the last `period` candles
fn find_levels(candles: &[Candle], period: usize) -> Option<(Decimal, Decimal)> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let recent = &candles[candles.len() - period..];
    let high = recent.iter().map(|c| c.high).max()?;
    let low = recent.iter().map(|c| c.low).min()?;

    Some((low, high))
}

/// Latest volume vs the average of up to `lookback` previous candles
fn volume_confirmed(candles: &[Candle], lookback: usize, threshold: f64) -> bool {
    let Some((current, previous)) = candles.split_last() else {
        return false;
    };
    let count = lookback.min(previous.len());
    if count == 0 {
        return false;
    }

    let sum: Decimal = previous.iter().rev().take(count).map(|c| c.volume).sum();
    let avg = sum / Decimal::from(count as i64);
    if avg == Decimal::ZERO {
        return false;
    }

    to_f64(current.volume / avg) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Candles whose closes follow `closes`, with a ±1 high/low band
    fn candles_from(closes: &[i64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: start + Duration::hours(i as i64),
                open: Decimal::from(*close),
                high: Decimal::from(*close + 1),
                low: Decimal::from(*close - 1),
                close: Decimal::from(*close),
                volume: Decimal::from(1000),
            })
            .collect()
    }

    fn uptrend() -> MarketContext {
        let closes: Vec<i64> = (0..40).map(|i| 100 + i).collect();
        MarketContext::from_candles("BTC", candles_from(&closes)).unwrap()
    }

    fn downtrend() -> MarketContext {
        let closes: Vec<i64> = (0..40).map(|i| 200 - i).collect();
        MarketContext::from_candles("BTC", candles_from(&closes)).unwrap()
    }

    #[tokio::test]
    async fn test_trend_follows_direction() {
        let producer = TrendProducer::new();

        let up = producer.evaluate(&uptrend()).await.unwrap();
        assert!(up.signal > 0.0);
        assert!(up.validate().is_ok());
        assert!(up.reasons[0].contains(">"));

        let down = producer.evaluate(&downtrend()).await.unwrap();
        assert!(down.signal < 0.0);
        assert!(down.validate().is_ok());
    }

    #[tokio::test]
    async fn test_trend_needs_history() {
        let closes: Vec<i64> = (0..10).map(|i| 100 + i).collect();
        let ctx = MarketContext::from_candles("BTC", candles_from(&closes)).unwrap();
        let err = TrendProducer::new().evaluate(&ctx).await.unwrap_err();
        assert_eq!(err, ProducerError::Failed("need 27 candles, got 10".to_string()));
    }

    #[tokio::test]
    async fn test_reversion_fades_extremes() {
        let producer = ReversionProducer::new();

        // Straight-line rally: RSI pinned at 100, fully overbought
        let up = producer.evaluate(&uptrend()).await.unwrap();
        assert_eq!(up.signal, -1.0);
        assert_eq!(up.confidence, 1.0);
        assert!(up.reasons[0].starts_with("RSI overbought"));

        let down = producer.evaluate(&downtrend()).await.unwrap();
        assert_eq!(down.signal, 1.0);
        assert!(down.reasons[0].starts_with("RSI oversold"));
    }

    #[tokio::test]
    async fn test_reversion_flat_market_is_neutral() {
        let ctx = MarketContext::from_candles("BTC", candles_from(&[100; 20])).unwrap();
        let output = ReversionProducer::new().evaluate(&ctx).await.unwrap();
        assert_eq!(output.signal, 0.0);
        assert_eq!(output.confidence, 0.3);
    }

    #[tokio::test]
    async fn test_breakout_above_range() {
        let mut ctx = uptrend();
        ctx.current_price = Decimal::from(150);
        let output = BreakoutProducer::new().evaluate(&ctx).await.unwrap();

        assert!(output.signal > 0.0);
        assert!(output.confidence <= 0.95);
        assert!(output.reasons[0].starts_with("Upside breakout"));
    }

    #[tokio::test]
    async fn test_breakout_below_and_inside_range() {
        let mut ctx = uptrend();
        ctx.current_price = Decimal::from(90);
        let below = BreakoutProducer::new().evaluate(&ctx).await.unwrap();
        assert!(below.signal < 0.0);

        ctx.current_price = Decimal::from(130);
        let inside = BreakoutProducer::new().evaluate(&ctx).await.unwrap();
        assert_eq!(inside.signal, 0.0);
        assert_eq!(inside.confidence, 0.2);
    }

    #[tokio::test]
    async fn test_momentum_sign_and_scale() {
        let up = MomentumProducer::new().evaluate(&uptrend()).await.unwrap();
        // 129 -> 139 over 10 candles
        let expected = (10.0 / 129.0) * MOMENTUM_SCALE;
        assert!((up.signal - expected).abs() < 1e-9);
        assert!((up.confidence - (expected + 0.3).min(1.0)).abs() < 1e-9);

        let down = MomentumProducer::new().evaluate(&downtrend()).await.unwrap();
        assert!(down.signal < 0.0);
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let candles = candles_from(&[100, 110]);
        // high 111 vs previous close 100 beats the 2-point bar range
        assert_eq!(true_range(&candles[1], &candles[0]), Decimal::from(11));
    }

    #[test]
    fn test_ema_of_constant_series() {
        let candles = candles_from(&[50; 30]);
        assert_eq!(ema(&candles, 12), Some(Decimal::from(50)));
        assert_eq!(ema(&candles, 0), None);
        assert_eq!(ema(&candles[..5], 12), None);
    }
}
