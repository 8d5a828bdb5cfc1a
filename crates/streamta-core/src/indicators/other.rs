//! Catch-all family for indicators that don't fit trend/momentum/
//! volatility/volume: Ichimoku Cloud, Balance of Power, Choppiness Index,
//! Vortex Indicator.

use std::collections::VecDeque;

use streamta_data::Bar;

use crate::error::EngineError;
use crate::indicators::indicator_trait::{Indicator, Value};
use crate::indicators::volatility::Atr;

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

fn rolling_high_low(window: &VecDeque<(f64, f64)>) -> Option<(f64, f64)> {
    if window.is_empty() {
        return None;
    }
    let highest = window.iter().map(|(h, _)| *h).fold(f64::NEG_INFINITY, f64::max);
    let lowest = window.iter().map(|(_, l)| *l).fold(f64::INFINITY, f64::min);
    Some((highest, lowest))
}

// ---------------------------------------------------------------------
// Ichimoku Cloud
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Ichimoku {
    tenkan_period: usize,
    kijun_period: usize,
    senkou_b_period: usize,
    chikou_lag: usize,
    hl: VecDeque<(f64, f64)>,
    closes: VecDeque<f64>,
    cursor: Cursor,
}

impl Ichimoku {
    pub fn new(
        tenkan_period: usize,
        kijun_period: usize,
        senkou_b_period: usize,
        chikou_lag: usize,
    ) -> Result<Self, EngineError> {
        require_positive("ichimoku", tenkan_period)?;
        require_positive("ichimoku", kijun_period)?;
        require_positive("ichimoku", senkou_b_period)?;
        require_positive("ichimoku", chikou_lag)?;
        Ok(Self {
            tenkan_period,
            kijun_period,
            senkou_b_period,
            chikou_lag,
            hl: VecDeque::with_capacity(senkou_b_period),
            closes: VecDeque::with_capacity(chikou_lag + 1),
            cursor: Cursor::default(),
        })
    }

    fn midpoint_over(&self, n: usize) -> Option<f64> {
        if self.hl.len() < n {
            return None;
        }
        let window: VecDeque<(f64, f64)> = self.hl.iter().rev().take(n).cloned().collect();
        rolling_high_low(&window).map(|(h, l)| (h + l) / 2.0)
    }
}

impl Indicator for Ichimoku {
    fn warmup_period(&self) -> usize {
        self.senkou_b_period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.hl.push_back((bar.high, bar.low));
        if self.hl.len() > self.senkou_b_period {
            self.hl.pop_front();
        }
        self.closes.push_back(bar.close);
        if self.closes.len() > self.chikou_lag + 1 {
            self.closes.pop_front();
        }
    }
    fn value(&self) -> Value {
        let tenkan = self.midpoint_over(self.tenkan_period);
        let kijun = self.midpoint_over(self.kijun_period);
        let senkou_a = match (tenkan, kijun) {
            (Some(t), Some(k)) => Some((t + k) / 2.0),
            _ => None,
        };
        let senkou_b = self.midpoint_over(self.senkou_b_period);
        let chikou = if self.closes.len() > self.chikou_lag {
            Some(self.closes[0])
        } else {
            None
        };
        Value::Ichimoku {
            tenkan,
            kijun,
            senkou_a,
            senkou_b,
            chikou,
        }
    }
}

// ---------------------------------------------------------------------
// Balance of Power
// ---------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct BalanceOfPower {
    cursor: Cursor,
    value: Option<f64>,
}

impl BalanceOfPower {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for BalanceOfPower {
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
        self.value = Some(if range == 0.0 {
            0.0
        } else {
            (bar.close - bar.open) / range
        });
    }
    fn value(&self) -> Value {
        Value::Scalar(self.value)
    }
}

// ---------------------------------------------------------------------
// Choppiness Index
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct ChoppinessIndex {
    period: usize,
    atr: Atr,
    tr_window: VecDeque<f64>,
    tr_sum: f64,
    hl: VecDeque<(f64, f64)>,
    cursor: Cursor,
}

impl ChoppinessIndex {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("chop", period)?;
        Ok(Self {
            period,
            atr: Atr::new(1)?,
            tr_window: VecDeque::with_capacity(period),
            tr_sum: 0.0,
            hl: VecDeque::with_capacity(period),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for ChoppinessIndex {
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
        self.atr.update(bar);
        if let Value::Scalar(Some(tr1)) = self.atr.value() {
            self.tr_window.push_back(tr1);
            self.tr_sum += tr1;
            if self.tr_window.len() > self.period {
                self.tr_sum -= self.tr_window.pop_front().unwrap();
            }
        }
        self.hl.push_back((bar.high, bar.low));
        if self.hl.len() > self.period {
            self.hl.pop_front();
        }
    }
    fn value(&self) -> Value {
        if self.tr_window.len() < self.period || self.hl.len() < self.period {
            return Value::Scalar(None);
        }
        let (highest, lowest) = rolling_high_low(&self.hl).unwrap();
        let range = highest - lowest;
        if range == 0.0 || self.tr_sum == 0.0 {
            return Value::Scalar(Some(0.0));
        }
        let chop = 100.0 * (self.tr_sum / range).log10() / (self.period as f64).log10();
        Value::Scalar(Some(chop))
    }
}

// ---------------------------------------------------------------------
// Vortex Indicator
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Vortex {
    period: usize,
    prev_close: Option<f64>,
    prev_high: Option<f64>,
    prev_low: Option<f64>,
    vm_plus_window: VecDeque<f64>,
    vm_minus_window: VecDeque<f64>,
    tr_window: VecDeque<f64>,
    vm_plus_sum: f64,
    vm_minus_sum: f64,
    tr_sum: f64,
    cursor: Cursor,
}

impl Vortex {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("vtx", period)?;
        Ok(Self {
            period,
            prev_close: None,
            prev_high: None,
            prev_low: None,
            vm_plus_window: VecDeque::with_capacity(period),
            vm_minus_window: VecDeque::with_capacity(period),
            tr_window: VecDeque::with_capacity(period),
            vm_plus_sum: 0.0,
            vm_minus_sum: 0.0,
            tr_sum: 0.0,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Vortex {
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
        if let (Some(prev_high), Some(prev_low), Some(prev_close)) =
            (self.prev_high, self.prev_low, self.prev_close)
        {
            let vm_plus = (bar.high - prev_low).abs();
            let vm_minus = (bar.low - prev_high).abs();
            let tr = (bar.high - bar.low)
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs());

            self.vm_plus_window.push_back(vm_plus);
            self.vm_plus_sum += vm_plus;
            self.vm_minus_window.push_back(vm_minus);
            self.vm_minus_sum += vm_minus;
            self.tr_window.push_back(tr);
            self.tr_sum += tr;

            if self.vm_plus_window.len() > self.period {
                self.vm_plus_sum -= self.vm_plus_window.pop_front().unwrap();
                self.vm_minus_sum -= self.vm_minus_window.pop_front().unwrap();
                self.tr_sum -= self.tr_window.pop_front().unwrap();
            }
        }
        self.prev_high = Some(bar.high);
        self.prev_low = Some(bar.low);
        self.prev_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        if self.tr_window.len() < self.period || self.tr_sum == 0.0 {
            return Value::Vtx {
                plus_vtx: None,
                minus_vtx: None,
            };
        }
        Value::Vtx {
            plus_vtx: Some(self.vm_plus_sum / self.tr_sum),
            minus_vtx: Some(self.vm_minus_sum / self.tr_sum),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamta_data::Timeframe;

    fn tf() -> Timeframe {
        Timeframe::parse("1m").unwrap()
    }

    fn bar_hlc(i: i64, high: f64, low: f64, close: f64) -> Bar {
        let open = (high + low) / 2.0;
        Bar::new(i * 60_000, open, high, low, close, 1.0, tf()).unwrap()
    }

    #[test]
    fn bop_is_bounded_and_zero_on_flat_range() {
        let mut bop = BalanceOfPower::new();
        bop.update(&bar_hlc(0, 10.0, 10.0, 10.0));
        assert_eq!(bop.value(), Value::Scalar(Some(0.0)));
    }

    #[test]
    fn ichimoku_null_before_senkou_b_warmup() {
        let mut ichi = Ichimoku::new(9, 26, 52, 26).unwrap();
        ichi.update(&bar_hlc(0, 11.0, 9.0, 10.0));
        if let Value::Ichimoku { senkou_b, .. } = ichi.value() {
            assert!(senkou_b.is_none());
        } else {
            panic!("expected Value::Ichimoku");
        }
    }

    #[test]
    fn vortex_is_null_before_one_bar_past_period() {
        let mut vtx = Vortex::new(3).unwrap();
        for i in 0..3 {
            vtx.update(&bar_hlc(i, 11.0, 9.0, 10.0));
        }
        assert_eq!(
            vtx.value(),
            Value::Vtx {
                plus_vtx: None,
                minus_vtx: None
            }
        );
    }
}
