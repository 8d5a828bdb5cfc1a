//! Volatility family: Bollinger Bands, ATR/NATR, Keltner and Donchian
//! channels, rolling standard deviation. Bollinger's variance is computed
//! via the clamped `E[X^2] - E[X]^2` form rather than a sum-of-squared-
//! deviations accumulator, matching `incremental.py::BollingerBandsIndicator`.

use std::collections::VecDeque;

use streamta_data::Bar;

use crate::error::EngineError;
use crate::indicators::indicator_trait::{Indicator, Value};
use crate::indicators::trend::EmaCore;

#[derive(Debug, Clone, Default)]
struct Cursor {
    count: usize,
    last_ts: Option<i64>,
}
impl Cursor {
    fn observe(&mut self, bar: &Bar) {
        self.count += 1;
        self.last_ts = Some(bar.timestamp_ms);
    }
}

fn require_positive(name: &str, period: usize) -> Result<(), EngineError> {
    if period == 0 {
        return Err(EngineError::InvalidConfig {
            id: name.to_string(),
            reason: "period must be positive".to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Bollinger Bands
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct BollingerBands {
    period: usize,
    std_dev: f64,
    window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    cursor: Cursor,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev: f64) -> Result<Self, EngineError> {
        require_positive("boll", period)?;
        if !(std_dev > 0.0) {
            return Err(EngineError::InvalidConfig {
                id: "boll".to_string(),
                reason: "std_dev must be positive".to_string(),
            });
        }
        Ok(Self {
            period,
            std_dev,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            sum_sq: 0.0,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for BollingerBands {
    fn warmup_period(&self) -> usize {
        self.period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.window.push_back(bar.close);
        self.sum += bar.close;
        self.sum_sq += bar.close * bar.close;
        if self.window.len() > self.period {
            let evicted = self.window.pop_front().unwrap();
            self.sum -= evicted;
            self.sum_sq -= evicted * evicted;
        }
    }
    fn value(&self) -> Value {
        if self.window.len() < self.period {
            return Value::Bollinger {
                upper: None,
                middle: None,
                lower: None,
                bandwidth: None,
            };
        }
        let n = self.period as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        let std = variance.sqrt();
        let upper = mean + self.std_dev * std;
        let lower = mean - self.std_dev * std;
        let bandwidth = upper - lower;
        Value::Bollinger {
            upper: Some(upper),
            middle: Some(mean),
            lower: Some(lower),
            bandwidth: Some(bandwidth),
        }
    }
}

// ---------------------------------------------------------------------
// ATR / NATR
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    atr: Option<f64>,
    tr_sum: f64,
    tr_count: usize,
    cursor: Cursor,
}

impl Atr {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("atr", period)?;
        Ok(Self {
            period,
            prev_close: None,
            atr: None,
            tr_sum: 0.0,
            tr_count: 0,
            cursor: Cursor::default(),
        })
    }

    fn true_range(&self, bar: &Bar) -> f64 {
        match self.prev_close {
            None => bar.high - bar.low,
            Some(prev) => {
                let hl = bar.high - bar.low;
                let hc = (bar.high - prev).abs();
                let lc = (bar.low - prev).abs();
                hl.max(hc).max(lc)
            }
        }
    }
}

impl Indicator for Atr {
    fn warmup_period(&self) -> usize {
        self.period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let tr = self.true_range(bar);
        match self.atr {
            None => {
                self.tr_sum += tr;
                self.tr_count += 1;
                if self.tr_count == self.period {
                    self.atr = Some(self.tr_sum / self.period as f64);
                }
            }
            Some(prev_atr) => {
                self.atr = Some((prev_atr * (self.period as f64 - 1.0) + tr) / self.period as f64);
            }
        }
        self.prev_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        Value::Scalar(self.atr)
    }
}

#[derive(Debug)]
pub struct Natr {
    atr: Atr,
    last_close: Option<f64>,
}

impl Natr {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        Ok(Self {
            atr: Atr::new(period)?,
            last_close: None,
        })
    }
}

impl Indicator for Natr {
    fn warmup_period(&self) -> usize {
        self.atr.warmup_period()
    }
    fn bar_count(&self) -> usize {
        self.atr.bar_count()
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.atr.last_bar_ts()
    }
    fn update(&mut self, bar: &Bar) {
        self.atr.update(bar);
        self.last_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        match (self.atr.atr, self.last_close) {
            (Some(atr), Some(close)) if close != 0.0 => Value::Scalar(Some(100.0 * atr / close)),
            _ => Value::Scalar(None),
        }
    }
}

// ---------------------------------------------------------------------
// Keltner Channels
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct KeltnerChannels {
    ema: EmaCore,
    atr: Atr,
    multiplier: f64,
    cursor: Cursor,
}

impl KeltnerChannels {
    pub fn new(period: usize, multiplier: f64) -> Result<Self, EngineError> {
        require_positive("kc", period)?;
        Ok(Self {
            ema: EmaCore::new(period).map_err(|reason| EngineError::InvalidConfig {
                id: "kc".to_string(),
                reason,
            })?,
            atr: Atr::new(period)?,
            multiplier,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for KeltnerChannels {
    fn warmup_period(&self) -> usize {
        self.ema.period().max(self.atr.warmup_period())
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.ema.update(bar.close);
        self.atr.update(bar);
    }
    fn value(&self) -> Value {
        match (self.ema.value(), self.atr.value()) {
            (Some(mid), Value::Scalar(Some(atr))) => Value::Band {
                upper: Some(mid + self.multiplier * atr),
                middle: Some(mid),
                lower: Some(mid - self.multiplier * atr),
            },
            _ => Value::Band {
                upper: None,
                middle: None,
                lower: None,
            },
        }
    }
}

// ---------------------------------------------------------------------
// Donchian Channels
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct DonchianChannels {
    period: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    cursor: Cursor,
}

impl DonchianChannels {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("dc", period)?;
        Ok(Self {
            period,
            highs: VecDeque::with_capacity(period),
            lows: VecDeque::with_capacity(period),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for DonchianChannels {
    fn warmup_period(&self) -> usize {
        self.period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.highs.push_back(bar.high);
        self.lows.push_back(bar.low);
        if self.highs.len() > self.period {
            self.highs.pop_front();
            self.lows.pop_front();
        }
    }
    fn value(&self) -> Value {
        if self.highs.len() < self.period {
            return Value::Band {
                upper: None,
                middle: None,
                lower: None,
            };
        }
        let upper = self.highs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lower = self.lows.iter().cloned().fold(f64::INFINITY, f64::min);
        Value::Band {
            upper: Some(upper),
            middle: Some((upper + lower) / 2.0),
            lower: Some(lower),
        }
    }
}

// ---------------------------------------------------------------------
// Rolling standard deviation
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct StdDev {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    cursor: Cursor,
}

impl StdDev {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("stddev", period)?;
        Ok(Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            sum_sq: 0.0,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for StdDev {
    fn warmup_period(&self) -> usize {
        self.period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.window.push_back(bar.close);
        self.sum += bar.close;
        self.sum_sq += bar.close * bar.close;
        if self.window.len() > self.period {
            let evicted = self.window.pop_front().unwrap();
            self.sum -= evicted;
            self.sum_sq -= evicted * evicted;
        }
    }
    fn value(&self) -> Value {
        if self.window.len() < self.period {
            return Value::Scalar(None);
        }
        let n = self.period as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        Value::Scalar(Some(variance.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamta_data::Timeframe;

    fn tf() -> Timeframe {
        Timeframe::parse("1m").unwrap()
    }

    fn bar_at(i: i64, close: f64) -> Bar {
        Bar::new(i * 60_000, close, close + 1.0, close - 1.0, close, 1.0, tf()).unwrap()
    }

    #[test]
    fn bollinger_bands_match_known_reference_values() {
        let mut boll = BollingerBands::new(4, 2.0).unwrap();
        for (i, c) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            boll.update(&bar_at(i as i64, c));
        }
        if let Value::Bollinger {
            upper,
            middle,
            lower,
            bandwidth,
        } = boll.value()
        {
            assert_eq!(middle, Some(2.5));
            assert!((upper.unwrap() - 4.7360).abs() < 1e-3);
            assert!((lower.unwrap() - 0.2639).abs() < 1e-3);
            assert!((bandwidth.unwrap() - 4.4721).abs() < 1e-3);
        } else {
            panic!("expected Value::Bollinger");
        }
    }

    #[test]
    fn bollinger_is_null_before_warmup() {
        let mut boll = BollingerBands::new(4, 2.0).unwrap();
        boll.update(&bar_at(0, 1.0));
        assert_eq!(
            boll.value(),
            Value::Bollinger {
                upper: None,
                middle: None,
                lower: None,
                bandwidth: None
            }
        );
    }

    #[test]
    fn atr_seeds_then_wilder_smooths() {
        let mut atr = Atr::new(3).unwrap();
        for i in 0..3 {
            atr.update(&bar_at(i, 10.0));
        }
        assert_eq!(atr.value(), Value::Scalar(Some(2.0)));
    }

    #[test]
    fn donchian_tracks_rolling_extremes() {
        let mut dc = DonchianChannels::new(3).unwrap();
        for (i, c) in [10.0, 20.0, 5.0].into_iter().enumerate() {
            dc.update(&bar_at(i as i64, c));
        }
        if let Value::Band { upper, lower, .. } = dc.value() {
            assert_eq!(upper, Some(21.0));
            assert_eq!(lower, Some(4.0));
        } else {
            panic!("expected Value::Band");
        }
    }
}
