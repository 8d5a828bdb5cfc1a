//! Oscillators: RSI, MACD, Stochastic family, CCI, ROC, Williams %R, TSI,
//! Awesome Oscillator, Ultimate Oscillator. Numeric formulas are grounded
//! on `incremental.py::{RSIIndicator,MACDIndicator}` (the authoritative
//! reference per the open-question resolution), structured in the style of
//! `indicators::momentum::{rsi,macd}`.

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
// RSI
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    gain_sum: f64,
    loss_sum: f64,
    change_count: usize,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
    cursor: Cursor,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("rsi", period)?;
        Ok(Self {
            period,
            prev_close: None,
            gain_sum: 0.0,
            loss_sum: 0.0,
            change_count: 0,
            avg_gain: None,
            avg_loss: None,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Rsi {
    fn warmup_period(&self) -> usize {
        self.period + 1
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    // RSI needs its seeded averages, not just a bar-count threshold: the
    // first bar only records prev_close and contributes no gain/loss.
    fn is_warmed_up(&self) -> bool {
        self.avg_gain.is_some() && self.avg_loss.is_some()
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let Some(prev) = self.prev_close else {
            self.prev_close = Some(bar.close);
            return;
        };

        let change = bar.close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        match (self.avg_gain, self.avg_loss) {
            (None, None) => {
                self.gain_sum += gain;
                self.loss_sum += loss;
                self.change_count += 1;
                if self.change_count >= self.period {
                    self.avg_gain = Some(self.gain_sum / self.period as f64);
                    self.avg_loss = Some(self.loss_sum / self.period as f64);
                }
            }
            (Some(avg_g), Some(avg_l)) => {
                self.avg_gain = Some((avg_g * (self.period as f64 - 1.0) + gain) / self.period as f64);
                self.avg_loss = Some((avg_l * (self.period as f64 - 1.0) + loss) / self.period as f64);
            }
            _ => unreachable!("avg_gain and avg_loss are always seeded together"),
        }

        self.prev_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        if !self.is_warmed_up() {
            return Value::Scalar(None);
        }
        let avg_loss = self.avg_loss.unwrap();
        if avg_loss == 0.0 {
            return Value::Scalar(Some(100.0));
        }
        let avg_gain = self.avg_gain.unwrap();
        Value::Scalar(Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss)))
    }
}

// ---------------------------------------------------------------------
// MACD
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Macd {
    fast: EmaCore,
    slow: EmaCore,
    signal: EmaCore,
    diff: Option<f64>,
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    cursor: Cursor,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Result<Self, EngineError> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            return Err(EngineError::InvalidConfig {
                id: "macd".to_string(),
                reason: "fast/slow/signal periods must be positive".to_string(),
            });
        }
        if fast_period >= slow_period {
            return Err(EngineError::InvalidConfig {
                id: "macd".to_string(),
                reason: "fast period must be smaller than slow period".to_string(),
            });
        }
        Ok(Self {
            fast: EmaCore::new(fast_period).unwrap(),
            slow: EmaCore::new(slow_period).unwrap(),
            signal: EmaCore::new(signal_period).unwrap(),
            diff: None,
            fast_period,
            slow_period,
            signal_period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Macd {
    // Exactly slow + signal, not slow + signal - 1.
    fn warmup_period(&self) -> usize {
        self.slow_period + self.signal_period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn is_warmed_up(&self) -> bool {
        self.signal.is_ready()
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let _ = self.fast_period;
        self.fast.update(bar.close);
        self.slow.update(bar.close);
        if let (Some(f), Some(s)) = (self.fast.value(), self.slow.value()) {
            let diff = f - s;
            self.diff = Some(diff);
            self.signal.update(diff);
        }
    }
    fn value(&self) -> Value {
        let signal_val = self.signal.value();
        let histogram = match (self.diff, signal_val) {
            (Some(d), Some(s)) => Some(d - s),
            _ => None,
        };
        Value::Macd {
            fast_line: self.diff,
            signal_line: signal_val,
            histogram,
            diff: self.diff,
            dea: signal_val,
            macd: histogram,
            ema_fast: self.fast.value(),
            ema_slow: self.slow.value(),
        }
    }
}

// ---------------------------------------------------------------------
// Stochastic / StochRSI
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RollingSma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}
impl RollingSma {
    fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }
    fn update(&mut self, x: f64) {
        self.window.push_back(x);
        self.sum += x;
        if self.window.len() > self.period {
            self.sum -= self.window.pop_front().unwrap();
        }
    }
    fn value(&self) -> Option<f64> {
        if self.window.len() < self.period {
            None
        } else {
            Some(self.sum / self.period as f64)
        }
    }
}

#[derive(Debug)]
pub struct Stochastic {
    period: usize,
    smoothing: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    k_smoothed: RollingSma,
    d_smoothed: RollingSma,
    cursor: Cursor,
}

impl Stochastic {
    pub fn new(period: usize, smoothing: usize) -> Result<Self, EngineError> {
        require_positive("stoch", period)?;
        require_positive("stoch", smoothing)?;
        Ok(Self {
            period,
            smoothing,
            highs: VecDeque::with_capacity(period),
            lows: VecDeque::with_capacity(period),
            k_smoothed: RollingSma::new(smoothing),
            d_smoothed: RollingSma::new(smoothing),
            cursor: Cursor::default(),
        })
    }

    fn raw_k(&self, close: f64) -> Option<f64> {
        if self.highs.len() < self.period {
            return None;
        }
        let highest = self.highs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lowest = self.lows.iter().cloned().fold(f64::INFINITY, f64::min);
        let range = highest - lowest;
        Some(if range == 0.0 {
            0.0
        } else {
            100.0 * (close - lowest) / range
        })
    }
}

impl Indicator for Stochastic {
    fn warmup_period(&self) -> usize {
        self.period + self.smoothing
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
        if let Some(k_raw) = self.raw_k(bar.close) {
            self.k_smoothed.update(k_raw);
            if let Some(k) = self.k_smoothed.value() {
                self.d_smoothed.update(k);
            }
        }
    }
    fn value(&self) -> Value {
        Value::Stoch {
            k: self.k_smoothed.value(),
            d: self.d_smoothed.value(),
        }
    }
}

/// Stochastic applied to RSI values instead of raw price.
#[derive(Debug)]
pub struct StochRsi {
    rsi: Rsi,
    rsi_period: usize,
    stoch_period: usize,
    rsi_window: VecDeque<f64>,
    k_smoothed: RollingSma,
    d_smoothed: RollingSma,
    cursor: Cursor,
}

impl StochRsi {
    pub fn new(rsi_period: usize, stoch_period: usize) -> Result<Self, EngineError> {
        require_positive("stochrsi", rsi_period)?;
        require_positive("stochrsi", stoch_period)?;
        Ok(Self {
            rsi: Rsi::new(rsi_period).unwrap(),
            rsi_period,
            stoch_period,
            rsi_window: VecDeque::with_capacity(stoch_period),
            k_smoothed: RollingSma::new(3),
            d_smoothed: RollingSma::new(3),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for StochRsi {
    fn warmup_period(&self) -> usize {
        self.rsi_period + self.stoch_period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.rsi.update(bar);
        if let Value::Scalar(Some(rsi_val)) = self.rsi.value() {
            self.rsi_window.push_back(rsi_val);
            if self.rsi_window.len() > self.stoch_period {
                self.rsi_window.pop_front();
            }
            if self.rsi_window.len() == self.stoch_period {
                let highest = self.rsi_window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let lowest = self.rsi_window.iter().cloned().fold(f64::INFINITY, f64::min);
                let range = highest - lowest;
                let k_raw = if range == 0.0 {
                    0.0
                } else {
                    100.0 * (rsi_val - lowest) / range
                };
                self.k_smoothed.update(k_raw);
                if let Some(k) = self.k_smoothed.value() {
                    self.d_smoothed.update(k);
                }
            }
        }
    }
    fn value(&self) -> Value {
        Value::Stoch {
            k: self.k_smoothed.value(),
            d: self.d_smoothed.value(),
        }
    }
}

// ---------------------------------------------------------------------
// CCI
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Cci {
    period: usize,
    typical_prices: VecDeque<f64>,
    cursor: Cursor,
}

impl Cci {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("cci", period)?;
        Ok(Self {
            period,
            typical_prices: VecDeque::with_capacity(period),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Cci {
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
        let tp = (bar.high + bar.low + bar.close) / 3.0;
        self.typical_prices.push_back(tp);
        if self.typical_prices.len() > self.period {
            self.typical_prices.pop_front();
        }
    }
    fn value(&self) -> Value {
        if self.typical_prices.len() < self.period {
            return Value::Scalar(None);
        }
        let mean = self.typical_prices.iter().sum::<f64>() / self.period as f64;
        let mean_dev = self
            .typical_prices
            .iter()
            .map(|tp| (tp - mean).abs())
            .sum::<f64>()
            / self.period as f64;
        if mean_dev == 0.0 {
            return Value::Scalar(Some(0.0));
        }
        let last = *self.typical_prices.back().unwrap();
        Value::Scalar(Some((last - mean) / (0.015 * mean_dev)))
    }
}

// ---------------------------------------------------------------------
// ROC
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Roc {
    period: usize,
    closes: VecDeque<f64>,
    cursor: Cursor,
}

impl Roc {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("roc", period)?;
        Ok(Self {
            period,
            closes: VecDeque::with_capacity(period + 1),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Roc {
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
        self.closes.push_back(bar.close);
        if self.closes.len() > self.period + 1 {
            self.closes.pop_front();
        }
    }
    fn value(&self) -> Value {
        if self.closes.len() <= self.period {
            return Value::Scalar(None);
        }
        let last = *self.closes.back().unwrap();
        let past = self.closes[0];
        if past == 0.0 {
            Value::Scalar(None)
        } else {
            Value::Scalar(Some(100.0 * (last - past) / past))
        }
    }
}

// ---------------------------------------------------------------------
// Williams %R
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct WilliamsR {
    period: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    last_close: Option<f64>,
    cursor: Cursor,
}

impl WilliamsR {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("willr", period)?;
        Ok(Self {
            period,
            highs: VecDeque::with_capacity(period),
            lows: VecDeque::with_capacity(period),
            last_close: None,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for WilliamsR {
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
        self.last_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        if self.highs.len() < self.period {
            return Value::Scalar(None);
        }
        let highest = self.highs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lowest = self.lows.iter().cloned().fold(f64::INFINITY, f64::min);
        let range = highest - lowest;
        let close = self.last_close.unwrap();
        if range == 0.0 {
            return Value::Scalar(Some(0.0));
        }
        Value::Scalar(Some(-100.0 * (highest - close) / range))
    }
}

// ---------------------------------------------------------------------
// TSI
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Tsi {
    fast: EmaCore,
    slow_of_fast: EmaCore,
    abs_fast: EmaCore,
    abs_slow_of_fast: EmaCore,
    prev_close: Option<f64>,
    fast_period: usize,
    slow_period: usize,
    cursor: Cursor,
}

impl Tsi {
    pub fn new(slow_period: usize, fast_period: usize) -> Result<Self, EngineError> {
        require_positive("tsi", slow_period)?;
        require_positive("tsi", fast_period)?;
        Ok(Self {
            fast: EmaCore::new(slow_period).unwrap(),
            slow_of_fast: EmaCore::new(fast_period).unwrap(),
            abs_fast: EmaCore::new(slow_period).unwrap(),
            abs_slow_of_fast: EmaCore::new(fast_period).unwrap(),
            prev_close: None,
            fast_period,
            slow_period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Tsi {
    fn warmup_period(&self) -> usize {
        self.slow_period + self.fast_period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let Some(prev) = self.prev_close else {
            self.prev_close = Some(bar.close);
            return;
        };
        let momentum = bar.close - prev;
        self.fast.update(momentum);
        self.abs_fast.update(momentum.abs());
        if let Some(m1) = self.fast.value() {
            self.slow_of_fast.update(m1);
        }
        if let Some(a1) = self.abs_fast.value() {
            self.abs_slow_of_fast.update(a1);
        }
        self.prev_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        match (self.slow_of_fast.value(), self.abs_slow_of_fast.value()) {
            (Some(num), Some(den)) if den != 0.0 => Value::Scalar(Some(100.0 * num / den)),
            _ => Value::Scalar(None),
        }
    }
}

// ---------------------------------------------------------------------
// Awesome Oscillator / Ultimate Oscillator
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct AwesomeOscillator {
    fast: RollingSma,
    slow: RollingSma,
    slow_period: usize,
    cursor: Cursor,
}

impl AwesomeOscillator {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, EngineError> {
        require_positive("ao", fast_period)?;
        require_positive("ao", slow_period)?;
        Ok(Self {
            fast: RollingSma::new(fast_period),
            slow: RollingSma::new(slow_period),
            slow_period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for AwesomeOscillator {
    fn warmup_period(&self) -> usize {
        self.slow_period
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
        self.fast.update(mid);
        self.slow.update(mid);
    }
    fn value(&self) -> Value {
        match (self.fast.value(), self.slow.value()) {
            (Some(f), Some(s)) => Value::Scalar(Some(f - s)),
            _ => Value::Scalar(None),
        }
    }
}

#[derive(Debug)]
pub struct UltimateOscillator {
    periods: [usize; 3],
    bp: [VecDeque<f64>; 3],
    tr: [VecDeque<f64>; 3],
    bp_sum: [f64; 3],
    tr_sum: [f64; 3],
    prev_close: Option<f64>,
    cursor: Cursor,
}

impl UltimateOscillator {
    pub fn new(short: usize, medium: usize, long: usize) -> Result<Self, EngineError> {
        for p in [short, medium, long] {
            require_positive("uo", p)?;
        }
        Ok(Self {
            periods: [short, medium, long],
            bp: [
                VecDeque::with_capacity(short),
                VecDeque::with_capacity(medium),
                VecDeque::with_capacity(long),
            ],
            tr: [
                VecDeque::with_capacity(short),
                VecDeque::with_capacity(medium),
                VecDeque::with_capacity(long),
            ],
            bp_sum: [0.0; 3],
            tr_sum: [0.0; 3],
            prev_close: None,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for UltimateOscillator {
    fn warmup_period(&self) -> usize {
        self.periods[2]
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let prev_close = self.prev_close.unwrap_or(bar.close);
        let true_low = bar.low.min(prev_close);
        let true_high = bar.high.max(prev_close);
        let bp = bar.close - true_low;
        let tr = true_high - true_low;

        for i in 0..3 {
            self.bp[i].push_back(bp);
            self.bp_sum[i] += bp;
            self.tr[i].push_back(tr);
            self.tr_sum[i] += tr;
            if self.bp[i].len() > self.periods[i] {
                self.bp_sum[i] -= self.bp[i].pop_front().unwrap();
                self.tr_sum[i] -= self.tr[i].pop_front().unwrap();
            }
        }

        self.prev_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        if self.bp[2].len() < self.periods[2] {
            return Value::Scalar(None);
        }
        let avg = |i: usize| -> f64 {
            if self.tr_sum[i] == 0.0 {
                0.0
            } else {
                self.bp_sum[i] / self.tr_sum[i]
            }
        };
        let a1 = avg(0);
        let a2 = avg(1);
        let a3 = avg(2);
        Value::Scalar(Some(100.0 * (4.0 * a1 + 2.0 * a2 + a3) / 7.0))
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
    fn rsi_all_gains_hits_one_hundred() {
        let mut rsi = Rsi::new(14).unwrap();
        for i in 0..15 {
            rsi.update(&bar_at(i, (i + 1) as f64));
        }
        assert!(rsi.is_warmed_up());
        assert_eq!(rsi.value(), Value::Scalar(Some(100.0)));
    }

    #[test]
    fn rsi_is_null_before_warmup() {
        let mut rsi = Rsi::new(14).unwrap();
        for i in 0..10 {
            rsi.update(&bar_at(i, (i + 1) as f64));
        }
        assert!(!rsi.is_warmed_up());
        assert_eq!(rsi.value(), Value::Scalar(None));
    }

    #[test]
    fn macd_histogram_equals_macd_line_minus_signal_line() {
        let mut macd = Macd::new(2, 3, 2).unwrap();
        assert_eq!(macd.warmup_period(), 5);
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        for (i, c) in closes.iter().enumerate() {
            macd.update(&bar_at(i as i64, *c));
            if macd.is_warmed_up() {
                if let Value::Macd {
                    fast_line,
                    signal_line,
                    histogram,
                    ..
                } = macd.value()
                {
                    assert_eq!(histogram, Some(fast_line.unwrap() - signal_line.unwrap()));
                } else {
                    panic!("expected Value::Macd");
                }
            }
        }
    }

    #[test]
    fn macd_rejects_fast_greater_or_equal_slow() {
        assert!(Macd::new(5, 5, 2).is_err());
        assert!(Macd::new(6, 5, 2).is_err());
    }

    #[test]
    fn stochastic_k_and_d_stay_within_zero_and_hundred() {
        let mut stoch = Stochastic::new(5, 3).unwrap();
        for i in 0..20 {
            stoch.update(&bar_at(i, 10.0 + (i % 4) as f64));
        }
        if let Value::Stoch { k: Some(k), d: Some(d) } = stoch.value() {
            assert!((0.0..=100.0).contains(&k));
            assert!((0.0..=100.0).contains(&d));
        } else {
            panic!("expected stoch to be warmed up by bar 20");
        }
    }
}
