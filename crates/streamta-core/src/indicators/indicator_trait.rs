use std::collections::HashMap;
use std::fmt::Debug;

use serde_json::json;
use streamta_data::{Bar, Timeframe};

/// What the caller asked for: a type tag, a timeframe, and raw params.
/// Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRequirement {
    pub id: String,
    pub type_tag: String,
    pub timeframe: Timeframe,
    pub params: HashMap<String, f64>,
}

/// The value an indicator produces: either a bare scalar or one of the
/// fixed-shape composite records the families in this crate are known to
/// return. Modeled as named fields (not an unstructured map) per the
/// composite-value design note; only the snapshot builder flattens this
/// into JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Option<f64>),
    Macd {
        fast_line: Option<f64>,
        signal_line: Option<f64>,
        histogram: Option<f64>,
        diff: Option<f64>,
        dea: Option<f64>,
        macd: Option<f64>,
        ema_fast: Option<f64>,
        ema_slow: Option<f64>,
    },
    Bollinger {
        upper: Option<f64>,
        middle: Option<f64>,
        lower: Option<f64>,
        bandwidth: Option<f64>,
    },
    Stoch {
        k: Option<f64>,
        d: Option<f64>,
    },
    Adx {
        adx: Option<f64>,
        plus_di: Option<f64>,
        minus_di: Option<f64>,
    },
    Ichimoku {
        tenkan: Option<f64>,
        kijun: Option<f64>,
        senkou_a: Option<f64>,
        senkou_b: Option<f64>,
        chikou: Option<f64>,
    },
    Aroon {
        up: Option<f64>,
        down: Option<f64>,
    },
    Supertrend {
        supertrend: Option<f64>,
        trend: Option<f64>,
    },
    Band {
        upper: Option<f64>,
        middle: Option<f64>,
        lower: Option<f64>,
    },
    Kst {
        kst: Option<f64>,
        signal: Option<f64>,
    },
    Vtx {
        plus_vtx: Option<f64>,
        minus_vtx: Option<f64>,
    },
}

fn opt(v: Option<f64>) -> serde_json::Value {
    match v {
        Some(x) => json!(x),
        None => serde_json::Value::Null,
    }
}

impl Value {
    /// Flattens a composite/scalar value to the JSON shape the snapshot
    /// exposes. This is the only place `Value` ever touches JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Scalar(v) => opt(*v),
            Value::Macd {
                fast_line,
                signal_line,
                histogram,
                diff,
                dea,
                macd,
                ema_fast,
                ema_slow,
            } => json!({
                "fast_line": opt(*fast_line),
                "signal_line": opt(*signal_line),
                "histogram": opt(*histogram),
                "diff": opt(*diff),
                "dea": opt(*dea),
                "macd": opt(*macd),
                "ema_fast": opt(*ema_fast),
                "ema_slow": opt(*ema_slow),
            }),
            Value::Bollinger {
                upper,
                middle,
                lower,
                bandwidth,
            } => json!({
                "upper": opt(*upper),
                "middle": opt(*middle),
                "lower": opt(*lower),
                "bandwidth": opt(*bandwidth),
            }),
            Value::Stoch { k, d } => json!({ "k": opt(*k), "d": opt(*d) }),
            Value::Adx {
                adx,
                plus_di,
                minus_di,
            } => json!({ "adx": opt(*adx), "plus_di": opt(*plus_di), "minus_di": opt(*minus_di) }),
            Value::Ichimoku {
                tenkan,
                kijun,
                senkou_a,
                senkou_b,
                chikou,
            } => json!({
                "tenkan": opt(*tenkan),
                "kijun": opt(*kijun),
                "senkou_a": opt(*senkou_a),
                "senkou_b": opt(*senkou_b),
                "chikou": opt(*chikou),
            }),
            Value::Aroon { up, down } => json!({ "up": opt(*up), "down": opt(*down) }),
            Value::Supertrend {
                supertrend,
                trend,
            } => json!({ "supertrend": opt(*supertrend), "trend": opt(*trend) }),
            Value::Band {
                upper,
                middle,
                lower,
            } => json!({ "upper": opt(*upper), "middle": opt(*middle), "lower": opt(*lower) }),
            Value::Kst { kst, signal } => json!({ "kst": opt(*kst), "signal": opt(*signal) }),
            Value::Vtx {
                plus_vtx,
                minus_vtx,
            } => json!({ "plus_vtx": opt(*plus_vtx), "minus_vtx": opt(*minus_vtx) }),
        }
    }
}

/// Uniform capability set every indicator family implements. Dispatched
/// through `Box<dyn Indicator>` — the hot path (`update`) is one virtual
/// call per indicator per bar, which is cheap relative to the arithmetic
/// it guards.
pub trait Indicator: Debug {
    /// Bars required before `value()` is guaranteed non-null. Computed once
    /// at construction from the requirement's params.
    fn warmup_period(&self) -> usize;

    /// How many bars this indicator has observed.
    fn bar_count(&self) -> usize;

    /// Timestamp of the last bar this indicator observed, if any.
    fn last_bar_ts(&self) -> Option<i64>;

    /// True once enough bars have been observed. Default is the bar-count
    /// check; some families (RSI) override with a stricter condition.
    fn is_warmed_up(&self) -> bool {
        self.bar_count() >= self.warmup_period()
    }

    /// Feeds one closed bar. O(1), allocation-free after construction.
    fn update(&mut self, bar: &Bar);

    /// Current value; null fields/variants before warmup.
    fn value(&self) -> Value;
}
