mod config;

use std::collections::HashMap;

use anyhow::Result;
use tracing::info;

use streamta_core::{Engine, IndicatorSpec};
use streamta_data::{Bar, Timeframe};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting StreamTA...");

    let config = config::Config::load()?;
    info!("Configuration loaded: {:?}", config.environment);

    println!("StreamTA - Streaming Technical Indicator Engine");
    println!("Version: 0.1.0");
    println!("Environment: {:?}", config.environment);

    let mut engine = Engine::new();
    let mut specs = HashMap::new();
    specs.insert(
        "ema_20".to_string(),
        IndicatorSpec {
            type_tag: "ema".to_string(),
            timeframe: config.engine.source_timeframe.clone(),
            params: HashMap::from([("period".to_string(), 20.0)]),
        },
    );
    specs.insert(
        "rsi_14".to_string(),
        IndicatorSpec {
            type_tag: "rsi".to_string(),
            timeframe: config.engine.source_timeframe.clone(),
            params: HashMap::from([("period".to_string(), 14.0)]),
        },
    );
    engine.register_requirements(&specs, None)?;

    let tf = Timeframe::parse(&config.engine.source_timeframe)?;
    let mut price = 100.0;
    for i in 0..config.engine.warmup_bar_count {
        price += (i as f64 * 0.05).sin();
        let bar = Bar::new(
            i as i64 * tf.duration_ms(),
            price,
            price + 0.5,
            price - 0.5,
            price,
            1_000.0,
            tf.clone(),
        )?;
        engine.update(&bar)?;
    }

    println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);

    Ok(())
}
