//! The orchestrator: owns every registered indicator and resampler, routes
//! bars to the right ones, and exposes the only observation surface
//! (`snapshot`). Grounded on `incremental.py::IndicatorEngine`.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value as Json;
use streamta_data::{Bar, Timeframe};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::indicators::registry;
use crate::indicators::{Indicator, IndicatorRequirement};
use crate::resampler::OhlcvResampler;

/// One indicator registration as supplied by a caller, before the
/// timeframe string has been parsed into a `Timeframe`.
#[derive(Debug, Clone)]
pub struct IndicatorSpec {
    pub type_tag: String,
    pub timeframe: String,
    pub params: HashMap<String, f64>,
}

/// Parallel-array historical data fed to `warmup_from_ohlcv`. Only
/// `closes` must be fully populated; every other array may be shorter or
/// absent and is defaulted per-bar (see `warmup_from_ohlcv`).
#[derive(Debug, Clone, Default)]
pub struct ColumnarOhlcv {
    pub timestamps: Vec<i64>,
    pub opens: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Single-writer, synchronous indicator engine. `update` and `snapshot`
/// must not run concurrently on the same instance; independent engines
/// are fully independent.
#[derive(Debug, Default)]
pub struct Engine {
    requirements: HashMap<String, IndicatorRequirement>,
    indicators: HashMap<String, Box<dyn Indicator>>,
    resamplers: HashMap<Timeframe, OhlcvResampler>,
    source_timeframe: Option<Timeframe>,
    last_bar_ts_by_timeframe: HashMap<Timeframe, i64>,
    last_update_ms: Option<i64>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and constructs every requirement into a staging area
    /// first; only swaps it into live state once everything succeeds, so
    /// a failure partway through leaves the engine untouched.
    pub fn register_requirements(
        &mut self,
        specs: &HashMap<String, IndicatorSpec>,
        source_timeframe: Option<&str>,
    ) -> EngineResult<()> {
        let source_tf = source_timeframe
            .map(Timeframe::parse)
            .transpose()
            .map_err(|e| EngineError::InvalidTimeframe(e.0))?;

        let mut staged_requirements = HashMap::with_capacity(specs.len());
        let mut staged_indicators: HashMap<String, Box<dyn Indicator>> = HashMap::with_capacity(specs.len());
        let mut staged_resamplers: HashMap<Timeframe, OhlcvResampler> = HashMap::new();

        for (id, spec) in specs {
            if spec.type_tag.trim().is_empty() {
                return Err(EngineError::InvalidConfig {
                    id: id.clone(),
                    reason: "type must not be empty".to_string(),
                });
            }
            if spec.timeframe.trim().is_empty() {
                return Err(EngineError::InvalidConfig {
                    id: id.clone(),
                    reason: "timeframe must not be empty".to_string(),
                });
            }

            let type_tag = spec.type_tag.to_lowercase();
            let timeframe =
                Timeframe::parse(&spec.timeframe).map_err(|e| EngineError::InvalidTimeframe(e.0))?;

            if !registry::supported_types().contains(&type_tag.as_str()) {
                return Err(EngineError::UnsupportedIndicator(type_tag));
            }

            let indicator = registry::build(&type_tag, &spec.params)?;

            if let Some(ref src) = source_tf {
                if &timeframe != src && !staged_resamplers.contains_key(&timeframe) {
                    staged_resamplers.insert(timeframe.clone(), OhlcvResampler::new(src.clone(), timeframe.clone())?);
                }
            }

            staged_indicators.insert(id.clone(), indicator);
            staged_requirements.insert(
                id.clone(),
                IndicatorRequirement {
                    id: id.clone(),
                    type_tag,
                    timeframe,
                    params: spec.params.clone(),
                },
            );
        }

        self.source_timeframe = source_tf;
        self.requirements = staged_requirements;
        self.indicators = staged_indicators;
        self.resamplers = staged_resamplers;
        Ok(())
    }

    /// Feeds `bar` to every indicator registered at its timeframe. A
    /// panicking indicator is caught and turned into a fatal
    /// `IndicatorUpdateError` rather than silently dropped — per the
    /// engine's error taxonomy, an indicator failure is fatal for this
    /// engine instance and bubbles to the caller.
    fn feed_indicators_at(&mut self, bar: &Bar) -> EngineResult<()> {
        for (id, requirement) in &self.requirements {
            if requirement.timeframe != bar.timeframe {
                continue;
            }
            let Some(indicator) = self.indicators.get_mut(id) else {
                continue;
            };
            let result = catch_unwind(AssertUnwindSafe(|| indicator.update(bar)));
            if let Err(cause) = result {
                let message = cause
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "indicator panicked".to_string());
                warn!(indicator_id = %id, timestamp_ms = bar.timestamp_ms, %message, "indicator update failed");
                return Err(EngineError::IndicatorUpdateError {
                    id: id.clone(),
                    timestamp_ms: bar.timestamp_ms,
                    cause: message,
                });
            }
        }
        Ok(())
    }

    /// Feeds one closed bar: updates every indicator at that timeframe,
    /// runs it through every resampler, and (if a resampler closes a
    /// higher-timeframe period) feeds the emitted bar through in turn. An
    /// indicator failure anywhere in this chain is fatal for this engine
    /// instance: it is returned immediately and bookkeeping for this bar
    /// is not recorded.
    pub fn update(&mut self, bar: &Bar) -> EngineResult<()> {
        self.feed_indicators_at(bar)?;

        let targets: Vec<Timeframe> = self.resamplers.keys().cloned().collect();
        for target in targets {
            let emitted = self.resamplers.get_mut(&target).and_then(|r| r.add(bar));
            if let Some(aggregated) = emitted {
                self.last_bar_ts_by_timeframe
                    .insert(aggregated.timeframe.clone(), aggregated.timestamp_ms);
                self.feed_indicators_at(&aggregated)?;
            }
        }

        self.last_bar_ts_by_timeframe
            .insert(bar.timeframe.clone(), bar.timestamp_ms);
        self.last_update_ms = Some(now_ms());
        Ok(())
    }

    /// Primes state from historical data. `closes` drives the iteration;
    /// every other column may be shorter and defaults per-bar rather than
    /// requiring rectangular input.
    pub fn warmup_from_ohlcv(&mut self, data: &ColumnarOhlcv, timeframe: &str) -> EngineResult<()> {
        let tf = Timeframe::parse(timeframe).map_err(|e| EngineError::InvalidTimeframe(e.0))?;
        for (i, close) in data.closes.iter().enumerate() {
            let open = data.opens.get(i).copied().unwrap_or(*close);
            let high = data.highs.get(i).copied().unwrap_or(*close);
            let low = data.lows.get(i).copied().unwrap_or(*close);
            let volume = data.volumes.get(i).copied().unwrap_or(0.0);
            let timestamp_ms = data.timestamps.get(i).copied().unwrap_or(0);

            let bar = Bar::new(timestamp_ms, open, high, low, *close, volume, tf.clone())
                .map_err(|e| EngineError::IndicatorUpdateError {
                    id: "warmup_from_ohlcv".to_string(),
                    timestamp_ms,
                    cause: e.to_string(),
                })?;
            self.update(&bar)?;
        }
        Ok(())
    }

    /// The only observation surface. O(I): one pass over every registered
    /// indicator.
    pub fn snapshot(&self) -> Json {
        crate::snapshot::build(&self.requirements, &self.indicators, &self.last_bar_ts_by_timeframe, self.last_update_ms)
    }

    /// Clears requirements, indicators, resamplers, and both timestamp
    /// maps — full teardown to an empty engine.
    pub fn reset(&mut self) {
        self.requirements.clear();
        self.indicators.clear();
        self.resamplers.clear();
        self.source_timeframe = None;
        self.last_bar_ts_by_timeframe.clear();
        self.last_update_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(type_tag: &str, timeframe: &str) -> IndicatorSpec {
        IndicatorSpec {
            type_tag: type_tag.to_string(),
            timeframe: timeframe.to_string(),
            params: HashMap::new(),
        }
    }

    fn bar(ts: i64, close: f64, tf: &str) -> Bar {
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 1.0, Timeframe::parse(tf).unwrap()).unwrap()
    }

    #[test]
    fn register_and_update_drives_snapshot() {
        let mut engine = Engine::new();
        let mut specs = HashMap::new();
        specs.insert("ema20".to_string(), spec("ema", "1m"));
        engine.register_requirements(&specs, None).unwrap();

        for i in 0..25 {
            engine.update(&bar(i * 60_000, 10.0 + i as f64, "1m")).unwrap();
        }

        let snap = engine.snapshot();
        assert_eq!(snap["is_warmed_up"], serde_json::json!(true));
        assert!(snap["ema"]["ema20"].is_number());
    }

    #[test]
    fn unsupported_type_fails_registration_without_mutating_state() {
        let mut engine = Engine::new();
        let mut specs = HashMap::new();
        specs.insert("a".to_string(), spec("ema", "1m"));
        engine.register_requirements(&specs, None).unwrap();

        let mut bad_specs = HashMap::new();
        bad_specs.insert("b".to_string(), spec("not_a_real_type", "1m"));
        assert!(engine.register_requirements(&bad_specs, None).is_err());

        // Original registration must still be intact: this would panic
        // if register_requirements had cleared state before validating.
        assert!(engine.requirements.contains_key("a"));
    }

    #[test]
    fn resampled_bars_feed_higher_timeframe_indicators() {
        let mut engine = Engine::new();
        let mut specs = HashMap::new();
        let mut sma5m = spec("sma", "5m");
        sma5m.params.insert("period".to_string(), 1.0);
        specs.insert("sma5m".to_string(), sma5m);
        engine.register_requirements(&specs, Some("1m")).unwrap();

        for i in 0..5 {
            engine.update(&bar(i * 60_000, 10.0, "1m")).unwrap();
        }

        let snap = engine.snapshot();
        assert_eq!(snap["by_timeframe"]["5m"]["is_warmed_up"], serde_json::json!(true));
    }

    #[test]
    fn reset_clears_all_state() {
        let mut engine = Engine::new();
        let mut specs = HashMap::new();
        specs.insert("a".to_string(), spec("sma", "1m"));
        engine.register_requirements(&specs, None).unwrap();
        engine.update(&bar(0, 10.0, "1m")).unwrap();
        engine.reset();
        assert!(engine.requirements.is_empty());
        assert_eq!(engine.snapshot()["bar_close_ts"], serde_json::Value::Null);
    }

    #[derive(Debug, Default)]
    struct PanickingIndicator;

    impl Indicator for PanickingIndicator {
        fn warmup_period(&self) -> usize {
            1
        }
        fn bar_count(&self) -> usize {
            0
        }
        fn last_bar_ts(&self) -> Option<i64> {
            None
        }
        fn update(&mut self, _bar: &Bar) {
            panic!("boom");
        }
        fn value(&self) -> crate::indicators::Value {
            crate::indicators::Value::Scalar(None)
        }
    }

    #[test]
    fn a_panicking_indicator_turns_into_a_fatal_update_error() {
        let mut engine = Engine::new();
        engine.requirements.insert(
            "boom".to_string(),
            IndicatorRequirement {
                id: "boom".to_string(),
                type_tag: "mock".to_string(),
                timeframe: Timeframe::parse("1m").unwrap(),
                params: HashMap::new(),
            },
        );
        engine
            .indicators
            .insert("boom".to_string(), Box::new(PanickingIndicator));

        let result = engine.update(&bar(0, 10.0, "1m"));
        match result {
            Err(EngineError::IndicatorUpdateError { id, .. }) => assert_eq!(id, "boom"),
            other => panic!("expected IndicatorUpdateError, got {other:?}"),
        }
    }
}
