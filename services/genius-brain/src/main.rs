//! Genius Brain - runs one decision cycle from a candle file
//!
//! 1. Loads configuration (file + `BRAIN__*` environment)
//! 2. Reads OHLCV candles for the configured symbol
//! 3. Registers the built-in and remote producers
//! 4. Prints the decision report and its JSON record

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use genius_brain::{
    AppConfig, BrainEngine, BreakoutProducer, Candle, MarketContext, MomentumProducer,
    ProducerRegistry, RemoteProducer, ReversionProducer, TrendProducer, WeightProfileHandle,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("BRAIN_CONFIG").ok();
    let app = AppConfig::load(config_path.as_deref())?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(app.tracing_level())
        .init();

    info!("Starting Genius Brain for {}...", app.symbol);

    let ctx = load_market(&app).await?;
    info!(
        "Loaded {} candles, current price {}",
        ctx.candles.len(),
        ctx.current_price
    );

    let registry = build_registry(&app)?;
    let profile = app.weight_profile()?;
    info!(
        "Weight profile '{}' with {} producers registered",
        profile.name(),
        registry.len()
    );
    if registry.ids().iter().all(|id| profile.weight_for(id) == 0.0) {
        warn!(
            "No registered producer carries weight in '{}', every decision will be NEUTRAL",
            profile.name()
        );
    }

    let engine = BrainEngine::new(app.engine.clone(), registry, WeightProfileHandle::new(profile))?;
    let decision = engine.decide(&ctx).await?;

    println!("{}", decision.report());
    println!("{}", decision.to_json()?);

    Ok(())
}

async fn load_market(app: &AppConfig) -> anyhow::Result<MarketContext> {
    let raw = tokio::fs::read_to_string(&app.candles_path)
        .await
        .with_context(|| format!("reading candles from {}", app.candles_path))?;
    let candles: Vec<Candle> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing candles in {}", app.candles_path))?;

    MarketContext::from_candles(app.symbol.clone(), candles)
        .with_context(|| format!("{} holds no candles", app.candles_path))
}

fn build_registry(app: &AppConfig) -> anyhow::Result<ProducerRegistry> {
    let mut registry =
        ProducerRegistry::new(Duration::from_millis(app.engine.producer_timeout_ms));

    registry.register(Arc::new(TrendProducer::new()))?;
    registry.register(Arc::new(ReversionProducer::new()))?;
    registry.register(Arc::new(BreakoutProducer::new()))?;
    registry.register(Arc::new(MomentumProducer::new()))?;

    for remote in &app.remote_producers {
        let producer = RemoteProducer::from_config(remote)?;
        info!("Remote producer {} at {}", remote.id, producer.url());
        registry.register(Arc::new(producer))?;
    }

    Ok(registry)
}
