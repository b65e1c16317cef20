//! Decision output - what one cycle of the brain hands back

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::config::ActionThresholds;
use crate::types::SignalContract;

/// |signal| above this is drawn as directional in the text report
const REPORT_DIRECTION_BAND: f64 = 0.1;

/// Final trading action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    StrongLong,
    Long,
    Neutral,
    Short,
    StrongShort,
}

impl Action {
    /// Confidence gate first, then score thresholds
    pub fn classify(score: f64, confidence: f64, thresholds: &ActionThresholds) -> Self {
        if confidence < thresholds.min_confidence {
            return Action::Neutral;
        }

        if score >= thresholds.strong_long {
            Action::StrongLong
        } else if score >= thresholds.long {
            Action::Long
        } else if score <= thresholds.strong_short {
            Action::StrongShort
        } else if score <= thresholds.short {
            Action::Short
        } else {
            Action::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::StrongLong => "STRONG_LONG",
            Action::Long => "LONG",
            Action::Neutral => "NEUTRAL",
            Action::Short => "SHORT",
            Action::StrongShort => "STRONG_SHORT",
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Action::StrongLong | Action::Long)
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Action::StrongShort | Action::Short)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A producer's contract paired with the weight it carried this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerResult {
    #[serde(flatten)]
    pub contract: SignalContract,
    /// Normalized profile weight (0 when the profile has no entry)
    pub weight: f64,
}

impl ProducerResult {
    pub fn new(contract: SignalContract, weight: f64) -> Self {
        Self { contract, weight }
    }

    pub fn producer_id(&self) -> &str {
        &self.contract.producer_id
    }

    pub fn is_active(&self) -> bool {
        self.contract.active
    }

    /// signal * confidence * weight, or 0 when inactive
    pub fn weighted_signal(&self) -> f64 {
        self.contract.effective_signal() * self.contract.effective_confidence() * self.weight
    }
}

/// Outcome of one decision cycle. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub id: Uuid,
    pub symbol: String,
    pub action: Action,
    pub final_score: f64,
    pub confidence: f64,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub position_size_pct: f64,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub module_results: BTreeMap<String, ProducerResult>,
}

/// Flat wire form of a `Decision`, consumed by dashboards and notifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    pub symbol: String,
    pub action: Action,
    pub score: f64,
    pub confidence: f64,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub position_size_pct: f64,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub module_results: BTreeMap<String, ProducerResult>,
}

impl Decision {
    /// Sizing is reported even for NEUTRAL; only this says whether to trade
    pub fn is_actionable(&self) -> bool {
        self.action != Action::Neutral
    }

    pub fn active_count(&self) -> usize {
        self.module_results.values().filter(|r| r.is_active()).count()
    }

    pub fn to_record(&self) -> DecisionRecord {
        DecisionRecord {
            id: self.id,
            symbol: self.symbol.clone(),
            action: self.action,
            score: self.final_score,
            confidence: self.confidence,
            entry: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            position_size_pct: self.position_size_pct,
            reasons: self.reasons.clone(),
            warnings: self.warnings.clone(),
            timestamp: self.timestamp,
            module_results: self.module_results.clone(),
        }
    }

    pub fn from_record(record: DecisionRecord) -> Self {
        Self {
            id: record.id,
            symbol: record.symbol,
            action: record.action,
            final_score: record.score,
            confidence: record.confidence,
            entry_price: record.entry,
            stop_loss: record.stop_loss,
            take_profit: record.take_profit,
            position_size_pct: record.position_size_pct,
            reasons: record.reasons,
            warnings: record.warnings,
            timestamp: record.timestamp,
            module_results: record.module_results,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_record())
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<DecisionRecord>(json).map(Self::from_record)
    }

    /// Plain-text report for terminals and chat notifiers
    pub fn report(&self) -> String {
        let rule = "=".repeat(60);
        let mut report = String::new();

        report.push_str(&format!("{}\nGENIUS BRAIN - DECISION REPORT ({})\n{}\n", rule, self.symbol, rule));
        report.push_str(&format!("\nDECISION: {}\n", self.action));
        report.push_str(&format!(
            "   Score: {:.2} | Confidence: {:.0}%\n",
            self.final_score,
            self.confidence * 100.0
        ));

        if self.is_actionable() {
            report.push_str("\nTRADE PARAMETERS:\n");
            report.push_str(&format!("   Entry: ${:.2}\n", self.entry_price));
            report.push_str(&format!("   Stop Loss: ${:.2}\n", self.stop_loss));
            report.push_str(&format!("   Take Profit: ${:.2}\n", self.take_profit));
            report.push_str(&format!(
                "   Position size: {:.1}% of capital\n",
                self.position_size_pct
            ));
        }

        report.push_str("\nPRODUCER SIGNALS:\n");
        for (id, result) in &self.module_results {
            if result.is_active() {
                let signal = result.contract.signal;
                let marker = if signal > REPORT_DIRECTION_BAND {
                    "+"
                } else if signal < -REPORT_DIRECTION_BAND {
                    "-"
                } else {
                    "="
                };
                report.push_str(&format!(
                    "   [{}] {}: {:.2} (weight: {:.0}%)\n",
                    marker,
                    id,
                    signal,
                    result.weight * 100.0
                ));
            } else {
                report.push_str(&format!("   [x] {}: inactive\n", id));
            }
        }

        if !self.reasons.is_empty() {
            report.push_str("\nREASONS:\n");
            for reason in &self.reasons {
                report.push_str(&format!("   {}\n", reason));
            }
        }

        if !self.warnings.is_empty() {
            report.push_str("\nWARNINGS:\n");
            for warning in &self.warnings {
                report.push_str(&format!("   {}\n", warning));
            }
        }

        report.push_str(&format!("\n{}", rule));
        report
    }
}
