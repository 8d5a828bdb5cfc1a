//! Streaming technical-indicator engine: incremental indicator
//! computation, timeframe resampling, and a single-writer orchestrator
//! sitting on top of both.

pub mod engine;
pub mod error;
pub mod indicators;
pub mod resampler;
pub mod snapshot;

pub use engine::{ColumnarOhlcv, Engine, IndicatorSpec};
pub use error::{EngineError, EngineResult};
pub use indicators::{build_indicator, supported_types, Indicator, IndicatorRequirement, Value};
pub use resampler::OhlcvResampler;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn engine_is_exported_at_the_crate_root() {
        let mut engine = Engine::new();
        let mut specs = HashMap::new();
        specs.insert(
            "ema20".to_string(),
            IndicatorSpec {
                type_tag: "ema".to_string(),
                timeframe: "1m".to_string(),
                params: HashMap::new(),
            },
        );
        engine.register_requirements(&specs, None).unwrap();
    }
}
