//! Brain configuration
//!
//! Every threshold the decision pipeline uses lives here with its default.
//! `AppConfig` is the binary's view: engine settings plus where to find data
//! and which producers to register.

use config::builder::DefaultState;
use config::ConfigBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BrainError, Result};
use crate::weights::{WeightPreset, WeightProfile};

/// Aggregation thresholds (conflict detection and inactive penalty)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// |signal| above this counts as directional rather than noise
    #[serde(default = "default_directional_threshold")]
    pub directional_threshold: f64,
    /// min(bull, bear) / max(bull, bear) above this is a conflict
    #[serde(default = "default_conflict_ratio_threshold")]
    pub conflict_ratio_threshold: f64,
    /// Score multiplier applied on conflict
    #[serde(default = "default_conflict_dampening")]
    pub conflict_dampening: f64,
    /// Penalty applies when more than this many producers are inactive
    #[serde(default = "default_max_inactive_before_penalty")]
    pub max_inactive_before_penalty: usize,
    /// Confidence multiplier applied when the inactive count is exceeded
    #[serde(default = "default_inactive_confidence_penalty")]
    pub inactive_confidence_penalty: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            directional_threshold: default_directional_threshold(),
            conflict_ratio_threshold: default_conflict_ratio_threshold(),
            conflict_dampening: default_conflict_dampening(),
            max_inactive_before_penalty: default_max_inactive_before_penalty(),
            inactive_confidence_penalty: default_inactive_confidence_penalty(),
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit("aggregation.directional_threshold", self.directional_threshold)?;
        check_unit(
            "aggregation.conflict_ratio_threshold",
            self.conflict_ratio_threshold,
        )?;
        check_unit("aggregation.conflict_dampening", self.conflict_dampening)?;
        check_unit(
            "aggregation.inactive_confidence_penalty",
            self.inactive_confidence_penalty,
        )
    }
}

fn default_directional_threshold() -> f64 { 0.1 }
fn default_conflict_ratio_threshold() -> f64 { 0.4 }
fn default_conflict_dampening() -> f64 { 0.7 }
fn default_max_inactive_before_penalty() -> usize { 2 }
fn default_inactive_confidence_penalty() -> f64 { 0.8 }

/// Score/confidence cut-offs for the action classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionThresholds {
    /// Below this confidence the action is always NEUTRAL
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_strong_long")]
    pub strong_long: f64,
    #[serde(default = "default_long")]
    pub long: f64,
    #[serde(default = "default_short")]
    pub short: f64,
    #[serde(default = "default_strong_short")]
    pub strong_short: f64,
}

impl Default for ActionThresholds {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            strong_long: default_strong_long(),
            long: default_long(),
            short: default_short(),
            strong_short: default_strong_short(),
        }
    }
}

impl ActionThresholds {
    pub fn validate(&self) -> Result<()> {
        check_unit("actions.min_confidence", self.min_confidence)?;
        let ordered = -1.0 <= self.strong_short
            && self.strong_short <= self.short
            && self.short < self.long
            && self.long <= self.strong_long
            && self.strong_long <= 1.0;
        if !ordered {
            return Err(BrainError::Configuration(format!(
                "action thresholds must satisfy -1 <= strong_short <= short < long <= strong_long <= 1, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

fn default_min_confidence() -> f64 { 0.4 }
fn default_strong_long() -> f64 { 0.6 }
fn default_long() -> f64 { 0.3 }
fn default_short() -> f64 { -0.3 }
fn default_strong_short() -> f64 { -0.6 }

/// What to do when ATR comes out as exactly zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZeroAtrPolicy {
    /// Produce a degenerate decision with SL == TP == entry and a warning
    #[default]
    Allow,
    /// Fail the cycle with an input validation error
    Reject,
}

/// Stop-loss, take-profit and position sizing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Number of true ranges averaged into ATR
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    #[serde(default = "default_stop_loss_atr_multiple")]
    pub stop_loss_atr_multiple: Decimal,
    #[serde(default = "default_take_profit_atr_multiple")]
    pub take_profit_atr_multiple: Decimal,
    /// Position size (% of capital) before scaling
    #[serde(default = "default_base_position_pct")]
    pub base_position_pct: f64,
    #[serde(default = "default_min_position_pct")]
    pub min_position_pct: f64,
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,
    /// Added to |score| before capping the strength factor at 1.0
    #[serde(default = "default_signal_strength_offset")]
    pub signal_strength_offset: f64,
    #[serde(default)]
    pub zero_atr_policy: ZeroAtrPolicy,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            atr_period: default_atr_period(),
            stop_loss_atr_multiple: default_stop_loss_atr_multiple(),
            take_profit_atr_multiple: default_take_profit_atr_multiple(),
            base_position_pct: default_base_position_pct(),
            min_position_pct: default_min_position_pct(),
            max_position_pct: default_max_position_pct(),
            signal_strength_offset: default_signal_strength_offset(),
            zero_atr_policy: ZeroAtrPolicy::default(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.atr_period == 0 {
            return Err(BrainError::Configuration(
                "risk.atr_period must be at least 1".to_string(),
            ));
        }
        if self.stop_loss_atr_multiple < Decimal::ZERO
            || self.take_profit_atr_multiple < Decimal::ZERO
        {
            return Err(BrainError::Configuration(
                "risk ATR multiples must be non-negative".to_string(),
            ));
        }
        let sizes = [
            self.base_position_pct,
            self.min_position_pct,
            self.max_position_pct,
            self.signal_strength_offset,
        ];
        if sizes.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(BrainError::Configuration(
                "risk position parameters must be non-negative numbers".to_string(),
            ));
        }
        if self.min_position_pct > self.max_position_pct {
            return Err(BrainError::Configuration(format!(
                "risk.min_position_pct ({}) exceeds risk.max_position_pct ({})",
                self.min_position_pct, self.max_position_pct
            )));
        }
        Ok(())
    }

    /// Candles needed to compute ATR
    pub fn min_candles(&self) -> usize {
        self.atr_period + 1
    }
}

fn default_atr_period() -> usize { 14 }
fn default_stop_loss_atr_multiple() -> Decimal { Decimal::from(2) }
fn default_take_profit_atr_multiple() -> Decimal { Decimal::from(6) }
fn default_base_position_pct() -> f64 { 5.0 }
fn default_min_position_pct() -> f64 { 1.0 }
fn default_max_position_pct() -> f64 { 5.0 }
fn default_signal_strength_offset() -> f64 { 0.3 }

/// Reason compilation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// Producer whose own reasons are quoted verbatim when it is active
    #[serde(default = "default_primary_producer")]
    pub primary_producer: Option<String>,
    #[serde(default = "default_top_contributors")]
    pub top_contributors: usize,
    #[serde(default = "default_primary_reason_limit")]
    pub primary_reason_limit: usize,
    /// |score| at or below this gets the "no clear direction" headline
    #[serde(default = "default_neutral_band")]
    pub neutral_band: f64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            primary_producer: default_primary_producer(),
            top_contributors: default_top_contributors(),
            primary_reason_limit: default_primary_reason_limit(),
            neutral_band: default_neutral_band(),
        }
    }
}

fn default_primary_producer() -> Option<String> { Some("ict_smart_money".to_string()) }
fn default_top_contributors() -> usize { 3 }
fn default_primary_reason_limit() -> usize { 2 }
fn default_neutral_band() -> f64 { 0.1 }

/// Everything the engine needs besides producers and weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-producer timeout unless a producer registers its own
    #[serde(default = "default_producer_timeout_ms")]
    pub producer_timeout_ms: u64,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub actions: ActionThresholds,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub explainer: ExplainerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            producer_timeout_ms: default_producer_timeout_ms(),
            aggregation: AggregationConfig::default(),
            actions: ActionThresholds::default(),
            risk: RiskConfig::default(),
            explainer: ExplainerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.producer_timeout_ms == 0 {
            return Err(BrainError::Configuration(
                "producer_timeout_ms must be positive".to_string(),
            ));
        }
        self.aggregation.validate()?;
        self.actions.validate()?;
        self.risk.validate()
    }
}

fn default_producer_timeout_ms() -> u64 { 5000 }

/// A producer reached over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProducerConfig {
    pub id: String,
    pub url: String,
    #[serde(default = "default_remote_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_remote_timeout_ms() -> u64 { 3000 }

/// Binary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// JSON file holding an array of candles, oldest first
    #[serde(default = "default_candles_path")]
    pub candles_path: String,
    /// Defaults to the preset weighting the built-in producers
    #[serde(default = "default_weight_preset")]
    pub weight_preset: WeightPreset,
    /// Explicit weights; when non-empty they replace the preset
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub remote_producers: Vec<RemoteProducerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            candles_path: default_candles_path(),
            weight_preset: default_weight_preset(),
            weights: HashMap::new(),
            log_level: default_log_level(),
            engine: EngineConfig::default(),
            remote_producers: Vec::new(),
        }
    }
}

fn default_symbol() -> String { "BTC".to_string() }
fn default_candles_path() -> String { "candles.json".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_weight_preset() -> WeightPreset { WeightPreset::Technical }

/// Default config file (extension picks the format)
pub const DEFAULT_CONFIG_FILE: &str = "genius-brain.toml";

impl AppConfig {
    /// Load from an optional file layered under `BRAIN__*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path.unwrap_or(DEFAULT_CONFIG_FILE);
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("BRAIN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let app: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BrainError::Configuration(e.to_string()))?;
        app.engine.validate()?;
        Ok(app)
    }

    /// Explicit weights if given, otherwise the preset
    pub fn weight_profile(&self) -> Result<WeightProfile> {
        if self.weights.is_empty() {
            Ok(self.weight_preset.profile())
        } else {
            WeightProfile::new("custom", self.weights.clone())
        }
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(BrainError::Configuration(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
