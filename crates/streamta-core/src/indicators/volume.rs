//! Volume family: OBV, VWAP, Accumulation/Distribution, Chaikin Money Flow,
//! Force Index, Ease of Movement, Mass Index. Cumulative (no-window)
//! indicators warm up after a single bar, matching `incremental.py`'s
//! volume adapters.

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
// OBV
// ---------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Obv {
    prev_close: Option<f64>,
    obv: f64,
    cursor: Cursor,
}

impl Obv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for Obv {
    fn warmup_period(&self) -> usize {
        1
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        if let Some(prev) = self.prev_close {
            if bar.close > prev {
                self.obv += bar.volume;
            } else if bar.close < prev {
                self.obv -= bar.volume;
            }
        }
        self.prev_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        if self.cursor.count == 0 {
            Value::Scalar(None)
        } else {
            Value::Scalar(Some(self.obv))
        }
    }
}

// ---------------------------------------------------------------------
// VWAP (cumulative, session-free — resets only via a fresh instance)
// ---------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Vwap {
    cum_pv: f64,
    cum_volume: f64,
    cursor: Cursor,
}

impl Vwap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for Vwap {
    fn warmup_period(&self) -> usize {
        1
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        self.cum_pv += typical * bar.volume;
        self.cum_volume += bar.volume;
    }
    fn value(&self) -> Value {
        if self.cum_volume == 0.0 {
            Value::Scalar(None)
        } else {
            Value::Scalar(Some(self.cum_pv / self.cum_volume))
        }
    }
}

// ---------------------------------------------------------------------
// Accumulation/Distribution Line
// ---------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct AccumulationDistribution {
    adl: f64,
    cursor: Cursor,
}

impl AccumulationDistribution {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for AccumulationDistribution {
    fn warmup_period(&self) -> usize {
        1
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let range = bar.high - bar.low;
        let mfm = if range == 0.0 {
            0.0
        } else {
            ((bar.close - bar.low) - (bar.high - bar.close)) / range
        };
        self.adl += mfm * bar.volume;
    }
    fn value(&self) -> Value {
        if self.cursor.count == 0 {
            Value::Scalar(None)
        } else {
            Value::Scalar(Some(self.adl))
        }
    }
}

// ---------------------------------------------------------------------
// Chaikin Money Flow
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct ChaikinMoneyFlow {
    period: usize,
    mfv_window: VecDeque<f64>,
    vol_window: VecDeque<f64>,
    mfv_sum: f64,
    vol_sum: f64,
    cursor: Cursor,
}

impl ChaikinMoneyFlow {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("cmf", period)?;
        Ok(Self {
            period,
            mfv_window: VecDeque::with_capacity(period),
            vol_window: VecDeque::with_capacity(period),
            mfv_sum: 0.0,
            vol_sum: 0.0,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for ChaikinMoneyFlow {
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
        let range = bar.high - bar.low;
        let mfm = if range == 0.0 {
            0.0
        } else {
            ((bar.close - bar.low) - (bar.high - bar.close)) / range
        };
        let mfv = mfm * bar.volume;
        self.mfv_window.push_back(mfv);
        self.mfv_sum += mfv;
        self.vol_window.push_back(bar.volume);
        self.vol_sum += bar.volume;
        if self.mfv_window.len() > self.period {
            self.mfv_sum -= self.mfv_window.pop_front().unwrap();
            self.vol_sum -= self.vol_window.pop_front().unwrap();
        }
    }
    fn value(&self) -> Value {
        if self.mfv_window.len() < self.period || self.vol_sum == 0.0 {
            return Value::Scalar(None);
        }
        Value::Scalar(Some(self.mfv_sum / self.vol_sum))
    }
}

// ---------------------------------------------------------------------
// Force Index
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct ForceIndex {
    ema: EmaCore,
    prev_close: Option<f64>,
    cursor: Cursor,
}

impl ForceIndex {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("force", period)?;
        Ok(Self {
            ema: EmaCore::new(period).map_err(|reason| EngineError::InvalidConfig {
                id: "force".to_string(),
                reason,
            })?,
            prev_close: None,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for ForceIndex {
    fn warmup_period(&self) -> usize {
        self.ema.period() + 1
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        if let Some(prev) = self.prev_close {
            self.ema.update((bar.close - prev) * bar.volume);
        }
        self.prev_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        Value::Scalar(self.ema.value())
    }
}

// ---------------------------------------------------------------------
// Ease of Movement
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct EaseOfMovement {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    prev_mid: Option<f64>,
    cursor: Cursor,
}

impl EaseOfMovement {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("emv", period)?;
        Ok(Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            prev_mid: None,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for EaseOfMovement {
    fn warmup_period(&self) -> usize {
        self.period + 1
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let mid = (bar.high + bar.low) / 2.0;
        if let Some(prev_mid) = self.prev_mid {
            let range = bar.high - bar.low;
            let box_ratio = if range == 0.0 || bar.volume == 0.0 {
                0.0
            } else {
                (bar.volume / 100_000_000.0) / range
            };
            let emv = if box_ratio == 0.0 {
                0.0
            } else {
                (mid - prev_mid) / box_ratio
            };
            self.window.push_back(emv);
            self.sum += emv;
            if self.window.len() > self.period {
                self.sum -= self.window.pop_front().unwrap();
            }
        }
        self.prev_mid = Some(mid);
    }
    fn value(&self) -> Value {
        if self.window.len() < self.period {
            return Value::Scalar(None);
        }
        Value::Scalar(Some(self.sum / self.period as f64))
    }
}

// ---------------------------------------------------------------------
// Mass Index
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct MassIndex {
    ema_range: EmaCore,
    ema_of_ema_range: EmaCore,
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    cursor: Cursor,
}

impl MassIndex {
    pub fn new(ema_period: usize, sum_period: usize) -> Result<Self, EngineError> {
        require_positive("mass", ema_period)?;
        require_positive("mass", sum_period)?;
        Ok(Self {
            ema_range: EmaCore::new(ema_period).map_err(|reason| EngineError::InvalidConfig {
                id: "mass".to_string(),
                reason,
            })?,
            ema_of_ema_range: EmaCore::new(ema_period).map_err(|reason| EngineError::InvalidConfig {
                id: "mass".to_string(),
                reason,
            })?,
            period: sum_period,
            window: VecDeque::with_capacity(sum_period),
            sum: 0.0,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for MassIndex {
    fn warmup_period(&self) -> usize {
        2 * self.ema_range.period() + self.period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let range = bar.high - bar.low;
        self.ema_range.update(range);
        if let Some(e1) = self.ema_range.value() {
            self.ema_of_ema_range.update(e1);
        }
        if let (Some(e1), Some(e2)) = (self.ema_range.value(), self.ema_of_ema_range.value()) {
            if e2 != 0.0 {
                let ratio = e1 / e2;
                self.window.push_back(ratio);
                self.sum += ratio;
                if self.window.len() > self.period {
                    self.sum -= self.window.pop_front().unwrap();
                }
            }
        }
    }
    fn value(&self) -> Value {
        if self.window.len() < self.period {
            return Value::Scalar(None);
        }
        Value::Scalar(Some(self.sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamta_data::Timeframe;

    fn tf() -> Timeframe {
        Timeframe::parse("1m").unwrap()
    }

    fn bar_hlcv(i: i64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar::new(i * 60_000, (high + low) / 2.0, high, low, close, volume, tf()).unwrap()
    }

    #[test]
    fn obv_accumulates_signed_volume_on_direction() {
        let mut obv = Obv::new();
        obv.update(&bar_hlcv(0, 11.0, 9.0, 10.0, 100.0));
        obv.update(&bar_hlcv(1, 12.0, 10.0, 11.0, 50.0));
        obv.update(&bar_hlcv(2, 11.0, 8.0, 9.0, 30.0));
        assert_eq!(obv.value(), Value::Scalar(Some(20.0)));
    }

    #[test]
    fn vwap_is_volume_weighted_typical_price() {
        let mut vwap = Vwap::new();
        vwap.update(&bar_hlcv(0, 11.0, 9.0, 10.0, 2.0));
        if let Value::Scalar(Some(v)) = vwap.value() {
            assert!((v - 10.0).abs() < 1e-9);
        } else {
            panic!("expected vwap value after first bar");
        }
    }

    #[test]
    fn adl_handles_zero_range_bar_without_dividing_by_zero() {
        let mut adl = AccumulationDistribution::new();
        adl.update(&bar_hlcv(0, 10.0, 10.0, 10.0, 5.0));
        assert_eq!(adl.value(), Value::Scalar(Some(0.0)));
    }
}
