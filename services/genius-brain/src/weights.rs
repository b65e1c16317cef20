//! Producer weight profiles
//!
//! A profile maps producer ids to relative weights. Weights are normalized to
//! sum to 1.0 on construction. Presets mirror the trading styles the bot ships
//! with; users pick one or supply their own map.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{BrainError, Result};

/// A profile whose total is this close to 1.0 is already normalized
const NORMALIZED_TOLERANCE: f64 = 1e-9;

/// Normalized producer weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    name: String,
    weights: HashMap<String, f64>,
}

impl WeightProfile {
    /// Build a normalized profile. Negative or non-finite weights are rejected.
    ///
    /// An empty or all-zero map is accepted; every producer then gets weight 0
    /// and aggregation degrades to "no active modules".
    pub fn new(name: impl Into<String>, weights: HashMap<String, f64>) -> Result<Self> {
        for (id, weight) in &weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(BrainError::Configuration(format!(
                    "weight for '{}' must be a non-negative number, got {}",
                    id, weight
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            weights,
        }
        .normalize())
    }

    /// Scale weights so they sum to 1.0. Idempotent.
    pub fn normalize(&self) -> Self {
        let total = self.total();
        if total <= 0.0 || (total - 1.0).abs() <= NORMALIZED_TOLERANCE {
            return self.clone();
        }

        Self {
            name: self.name.clone(),
            weights: self
                .weights
                .iter()
                .map(|(id, w)| (id.clone(), w / total))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized weight for a producer, 0.0 when it has no entry
    pub fn weight_for(&self, producer_id: &str) -> f64 {
        self.weights.get(producer_id).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, producer_id: &str) -> bool {
        self.weights.contains_key(producer_id)
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// True when no producer can contribute
    pub fn is_degenerate(&self) -> bool {
        self.total() <= 0.0
    }

    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }
}

impl From<WeightPreset> for WeightProfile {
    fn from(preset: WeightPreset) -> Self {
        preset.profile()
    }
}

/// Built-in weight presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightPreset {
    /// Balanced across every module
    Default,
    Aggressive,
    Conservative,
    /// Smart-money structure first; used when nothing else is configured
    #[default]
    IctFocus,
    UltimateEdge,
    FullPower,
    InstitutionalKiller,
    /// Only the built-in OHLCV producers
    Technical,
}

impl WeightPreset {
    pub fn all() -> &'static [WeightPreset] {
        &[
            WeightPreset::Default,
            WeightPreset::Aggressive,
            WeightPreset::Conservative,
            WeightPreset::IctFocus,
            WeightPreset::UltimateEdge,
            WeightPreset::FullPower,
            WeightPreset::InstitutionalKiller,
            WeightPreset::Technical,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeightPreset::Default => "default",
            WeightPreset::Aggressive => "aggressive",
            WeightPreset::Conservative => "conservative",
            WeightPreset::IctFocus => "ict_focus",
            WeightPreset::UltimateEdge => "ultimate_edge",
            WeightPreset::FullPower => "full_power",
            WeightPreset::InstitutionalKiller => "institutional_killer",
            WeightPreset::Technical => "technical",
        }
    }

    /// Raw (pre-normalization) weight table
    pub fn table(&self) -> &'static [(&'static str, f64)] {
        match self {
            WeightPreset::Default => &[
                ("ict_smart_money", 0.14),
                ("technical", 0.06),
                ("ml_ensemble", 0.05),
                ("time_series", 0.04),
                ("sentiment", 0.04),
                ("funding_rate", 0.04),
                ("lstm", 0.02),
                ("risk_engine", 0.03),
                ("rl_agent", 0.07),
                ("liquidation_heatmap", 0.10),
                ("order_flow", 0.04),
                ("on_chain", 0.05),
                ("quant_power", 0.06),
                ("institutional", 0.10),
                ("twap", 0.02),
                ("event_driven", 0.03),
                ("divergence", 0.03),
                ("mtf_confluence", 0.02),
                ("whale_alert", 0.02),
                ("orderbook_depth", 0.02),
                ("momentum", 0.02),
            ],
            WeightPreset::Aggressive => &[
                ("ict_smart_money", 0.22),
                ("technical", 0.10),
                ("ml_ensemble", 0.10),
                ("time_series", 0.03),
                ("sentiment", 0.08),
                ("funding_rate", 0.07),
                ("lstm", 0.00),
                ("pairs_trading", 0.00),
                ("risk_engine", 0.00),
                ("rl_agent", 0.10),
                ("liquidation_heatmap", 0.12),
                ("order_flow", 0.03),
                ("on_chain", 0.08),
                ("quant_power", 0.07),
            ],
            WeightPreset::Conservative => &[
                ("ict_smart_money", 0.14),
                ("technical", 0.10),
                ("ml_ensemble", 0.06),
                ("time_series", 0.10),
                ("sentiment", 0.06),
                ("funding_rate", 0.04),
                ("lstm", 0.04),
                ("pairs_trading", 0.04),
                ("risk_engine", 0.12),
                ("rl_agent", 0.06),
                ("liquidation_heatmap", 0.08),
                ("order_flow", 0.02),
                ("on_chain", 0.06),
                ("quant_power", 0.08),
            ],
            WeightPreset::IctFocus => &[
                ("ict_smart_money", 0.26),
                ("technical", 0.10),
                ("ml_ensemble", 0.06),
                ("time_series", 0.02),
                ("sentiment", 0.06),
                ("funding_rate", 0.03),
                ("lstm", 0.00),
                ("pairs_trading", 0.00),
                ("risk_engine", 0.04),
                ("rl_agent", 0.10),
                ("liquidation_heatmap", 0.12),
                ("order_flow", 0.04),
                ("on_chain", 0.08),
                ("quant_power", 0.09),
            ],
            WeightPreset::UltimateEdge => &[
                ("ict_smart_money", 0.22),
                ("technical", 0.08),
                ("ml_ensemble", 0.06),
                ("time_series", 0.02),
                ("sentiment", 0.04),
                ("funding_rate", 0.04),
                ("lstm", 0.00),
                ("pairs_trading", 0.00),
                ("risk_engine", 0.04),
                ("rl_agent", 0.10),
                ("liquidation_heatmap", 0.12),
                ("order_flow", 0.04),
                ("on_chain", 0.06),
                ("quant_power", 0.06),
                ("institutional", 0.12),
            ],
            WeightPreset::FullPower => &[
                ("ict_smart_money", 0.15),
                ("technical", 0.06),
                ("ml_ensemble", 0.05),
                ("time_series", 0.02),
                ("sentiment", 0.04),
                ("funding_rate", 0.03),
                ("lstm", 0.00),
                ("pairs_trading", 0.00),
                ("risk_engine", 0.03),
                ("rl_agent", 0.10),
                ("liquidation_heatmap", 0.12),
                ("order_flow", 0.05),
                ("on_chain", 0.08),
                ("quant_power", 0.10),
                ("institutional", 0.17),
            ],
            WeightPreset::InstitutionalKiller => &[
                ("ict_smart_money", 0.12),
                ("technical", 0.05),
                ("ml_ensemble", 0.04),
                ("time_series", 0.02),
                ("sentiment", 0.03),
                ("funding_rate", 0.03),
                ("lstm", 0.00),
                ("pairs_trading", 0.00),
                ("risk_engine", 0.02),
                ("rl_agent", 0.10),
                ("liquidation_heatmap", 0.12),
                ("order_flow", 0.05),
                ("on_chain", 0.07),
                ("quant_power", 0.10),
                ("institutional", 0.25),
            ],
            WeightPreset::Technical => &[
                ("trend", 0.35),
                ("reversion", 0.20),
                ("breakout", 0.25),
                ("momentum", 0.20),
            ],
        }
    }

    /// Normalized profile for this preset
    pub fn profile(&self) -> WeightProfile {
        let weights = self
            .table()
            .iter()
            .map(|(id, w)| (id.to_string(), *w))
            .collect::<HashMap<_, _>>();

        // Static tables are non-negative, so validation is skipped
        WeightProfile {
            name: self.as_str().to_string(),
            weights,
        }
        .normalize()
    }
}

impl FromStr for WeightPreset {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self> {
        WeightPreset::all()
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BrainError::Configuration(format!("unknown weight preset '{}'", s)))
    }
}

/// Shared, hot-swappable weight profile
///
/// A cycle takes one snapshot at start and keeps it; a swap replaces the whole
/// `Arc`, so an in-flight cycle never observes a partial update.
#[derive(Clone)]
pub struct WeightProfileHandle {
    inner: Arc<RwLock<Arc<WeightProfile>>>,
}

impl WeightProfileHandle {
    pub fn new(profile: WeightProfile) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(profile))),
        }
    }

    /// Current profile
    pub async fn snapshot(&self) -> Arc<WeightProfile> {
        Arc::clone(&*self.inner.read().await)
    }

    /// Replace the profile, returning the previous one
    pub async fn swap(&self, profile: WeightProfile) -> Arc<WeightProfile> {
        let mut guard = self.inner.write().await;
        std::mem::replace(&mut *guard, Arc::new(profile))
    }
}

impl From<WeightProfile> for WeightProfileHandle {
    fn from(profile: WeightProfile) -> Self {
        Self::new(profile)
    }
}
