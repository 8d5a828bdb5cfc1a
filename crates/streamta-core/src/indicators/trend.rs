//! Moving averages and the "trend" family (ADX, Aroon, PSAR, Supertrend,
//! TRIX, DPO, KST). Grounded on `indicators::trend::ema`'s seed-then-smooth
//! style, generalized across every moving-average variant the registry
//! supports.

use std::collections::VecDeque;

use streamta_data::Bar;

use crate::error::EngineError;
use crate::indicators::indicator_trait::{Indicator, Value};

/// Internal EMA state machine shared by `Ema`, `Dema`, `Tema`, `Zlema`,
/// `T3`, and MACD. Not itself an `Indicator` — callers own the bar-count
/// bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct EmaCore {
    period: usize,
    alpha: f64,
    seed: Vec<f64>,
    value: Option<f64>,
}

impl EmaCore {
    pub(crate) fn new(period: usize) -> Result<Self, String> {
        if period == 0 {
            return Err("period must be positive".to_string());
        }
        Ok(Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed: Vec::with_capacity(period),
            value: None,
        })
    }

    pub(crate) fn update(&mut self, x: f64) {
        match self.value {
            None => {
                self.seed.push(x);
                if self.seed.len() == self.period {
                    self.value = Some(self.seed.iter().sum::<f64>() / self.period as f64);
                }
            }
            Some(prev) => {
                self.value = Some((x - prev) * self.alpha + prev);
            }
        }
    }

    pub(crate) fn value(&self) -> Option<f64> {
        self.value
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    pub(crate) fn period(&self) -> usize {
        self.period
    }
}

/// Shared per-indicator bookkeeping every family needs: how many bars it's
/// seen and the last bar's timestamp.
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
// SMA
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    cursor: Cursor,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("sma", period)?;
        Ok(Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Sma {
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
        if self.window.len() > self.period {
            self.sum -= self.window.pop_front().unwrap();
        }
    }
    fn value(&self) -> Value {
        if self.is_warmed_up() {
            Value::Scalar(Some(self.sum / self.period as f64))
        } else {
            Value::Scalar(None)
        }
    }
}

// ---------------------------------------------------------------------
// EMA
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Ema {
    core: EmaCore,
    cursor: Cursor,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        let core = EmaCore::new(period).map_err(|reason| EngineError::InvalidConfig {
            id: "ema".to_string(),
            reason,
        })?;
        Ok(Self {
            core,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Ema {
    fn warmup_period(&self) -> usize {
        self.core.period()
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.core.update(bar.close);
    }
    fn value(&self) -> Value {
        Value::Scalar(self.core.value())
    }
}

// ---------------------------------------------------------------------
// DEMA / TEMA
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Dema {
    ema1: EmaCore,
    ema2: EmaCore,
    period: usize,
    cursor: Cursor,
}

impl Dema {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("dema", period)?;
        Ok(Self {
            ema1: EmaCore::new(period).unwrap(),
            ema2: EmaCore::new(period).unwrap(),
            period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Dema {
    fn warmup_period(&self) -> usize {
        2 * self.period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.ema1.update(bar.close);
        if let Some(e1) = self.ema1.value() {
            self.ema2.update(e1);
        }
    }
    fn value(&self) -> Value {
        match (self.ema1.value(), self.ema2.value()) {
            (Some(e1), Some(e2)) => Value::Scalar(Some(2.0 * e1 - e2)),
            _ => Value::Scalar(None),
        }
    }
}

#[derive(Debug)]
pub struct Tema {
    ema1: EmaCore,
    ema2: EmaCore,
    ema3: EmaCore,
    period: usize,
    cursor: Cursor,
}

impl Tema {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("tema", period)?;
        Ok(Self {
            ema1: EmaCore::new(period).unwrap(),
            ema2: EmaCore::new(period).unwrap(),
            ema3: EmaCore::new(period).unwrap(),
            period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Tema {
    fn warmup_period(&self) -> usize {
        3 * self.period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.ema1.update(bar.close);
        if let Some(e1) = self.ema1.value() {
            self.ema2.update(e1);
        }
        if let Some(e2) = self.ema2.value() {
            self.ema3.update(e2);
        }
    }
    fn value(&self) -> Value {
        match (self.ema1.value(), self.ema2.value(), self.ema3.value()) {
            (Some(e1), Some(e2), Some(e3)) => {
                Value::Scalar(Some(3.0 * e1 - 3.0 * e2 + e3))
            }
            _ => Value::Scalar(None),
        }
    }
}

// ---------------------------------------------------------------------
// WMA / SMMA (Wilder) / HMA
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct WmaCore {
    period: usize,
    window: VecDeque<f64>,
}

impl WmaCore {
    pub(crate) fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    pub(crate) fn update(&mut self, x: f64) {
        self.window.push_back(x);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
    }

    pub(crate) fn value(&self) -> Option<f64> {
        if self.window.len() < self.period {
            return None;
        }
        let denom = (self.period * (self.period + 1) / 2) as f64;
        let numer: f64 = self
            .window
            .iter()
            .enumerate()
            .map(|(i, v)| v * (i + 1) as f64)
            .sum();
        Some(numer / denom)
    }
}

#[derive(Debug)]
pub struct Wma {
    core: WmaCore,
    period: usize,
    cursor: Cursor,
}

impl Wma {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("wma", period)?;
        Ok(Self {
            core: WmaCore::new(period),
            period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Wma {
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
        self.core.update(bar.close);
    }
    fn value(&self) -> Value {
        Value::Scalar(self.core.value())
    }
}

/// Wilder's smoothed moving average: seeded with a plain mean of the first
/// `period` closes, then smoothed with `alpha = 1/period`.
#[derive(Debug)]
pub struct Smma {
    period: usize,
    seed: Vec<f64>,
    value: Option<f64>,
    cursor: Cursor,
}

impl Smma {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("smma", period)?;
        Ok(Self {
            period,
            seed: Vec::with_capacity(period),
            value: None,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Smma {
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
        match self.value {
            None => {
                self.seed.push(bar.close);
                if self.seed.len() == self.period {
                    self.value = Some(self.seed.iter().sum::<f64>() / self.period as f64);
                }
            }
            Some(prev) => {
                self.value = Some((prev * (self.period as f64 - 1.0) + bar.close) / self.period as f64);
            }
        }
    }
    fn value(&self) -> Value {
        Value::Scalar(self.value)
    }
}

/// Hull MA: `WMA(2*WMA(period/2) - WMA(period), round(sqrt(period)))`.
#[derive(Debug)]
pub struct Hma {
    half: WmaCore,
    full: WmaCore,
    smoothed: WmaCore,
    period: usize,
    half_period: usize,
    sqrt_period: usize,
    cursor: Cursor,
}

impl Hma {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("hma", period)?;
        let half_period = (period / 2).max(1);
        let sqrt_period = (period as f64).sqrt().round().max(1.0) as usize;
        Ok(Self {
            half: WmaCore::new(half_period),
            full: WmaCore::new(period),
            smoothed: WmaCore::new(sqrt_period),
            period,
            half_period,
            sqrt_period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Hma {
    fn warmup_period(&self) -> usize {
        self.period + self.sqrt_period - 1
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        self.half.update(bar.close);
        self.full.update(bar.close);
        if let (Some(h), Some(f)) = (self.half.value(), self.full.value()) {
            self.smoothed.update(2.0 * h - f);
        }
        let _ = self.half_period;
    }
    fn value(&self) -> Value {
        Value::Scalar(self.smoothed.value())
    }
}

// ---------------------------------------------------------------------
// KAMA
// ---------------------------------------------------------------------

/// Kaufman Adaptive MA: smoothing constant scales with the efficiency
/// ratio over `period`, between `fast=2` and `slow=30` period bounds.
#[derive(Debug)]
pub struct Kama {
    period: usize,
    fast_sc: f64,
    slow_sc: f64,
    closes: VecDeque<f64>,
    value: Option<f64>,
    cursor: Cursor,
}

impl Kama {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("kama", period)?;
        Ok(Self {
            period,
            fast_sc: 2.0 / (2.0 + 1.0),
            slow_sc: 2.0 / (30.0 + 1.0),
            closes: VecDeque::with_capacity(period + 1),
            value: None,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Kama {
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
        self.closes.push_back(bar.close);
        if self.closes.len() > self.period + 1 {
            self.closes.pop_front();
        }
        if self.closes.len() < self.period + 1 {
            return;
        }
        let change = (self.closes.back().unwrap() - self.closes.front().unwrap()).abs();
        let volatility: f64 = self
            .closes
            .iter()
            .zip(self.closes.iter().skip(1))
            .map(|(a, b)| (b - a).abs())
            .sum();
        let er = if volatility > 0.0 { change / volatility } else { 0.0 };
        let sc = (er * (self.fast_sc - self.slow_sc) + self.slow_sc).powi(2);
        let close = bar.close;
        self.value = Some(match self.value {
            None => close,
            Some(prev) => prev + sc * (close - prev),
        });
    }
    fn value(&self) -> Value {
        Value::Scalar(self.value)
    }
}

// ---------------------------------------------------------------------
// ZLEMA
// ---------------------------------------------------------------------

/// Zero-lag EMA: EMA applied to a de-lagged series
/// `2*price[t] - price[t - lag]`, `lag = (period-1)/2`.
#[derive(Debug)]
pub struct Zlema {
    core: EmaCore,
    lag: usize,
    history: VecDeque<f64>,
    period: usize,
    cursor: Cursor,
}

impl Zlema {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("zlema", period)?;
        let lag = (period.saturating_sub(1)) / 2;
        Ok(Self {
            core: EmaCore::new(period).unwrap(),
            lag,
            history: VecDeque::with_capacity(lag + 1),
            period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Zlema {
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
        self.history.push_back(bar.close);
        if self.history.len() > self.lag + 1 {
            self.history.pop_front();
        }
        let lagged = *self.history.front().unwrap();
        let de_lagged = 2.0 * bar.close - lagged;
        self.core.update(de_lagged);
    }
    fn value(&self) -> Value {
        Value::Scalar(self.core.value())
    }
}

// ---------------------------------------------------------------------
// T3
// ---------------------------------------------------------------------

/// Tillson T3: six cascaded EMAs combined with volume factor `vfactor=0.7`.
#[derive(Debug)]
pub struct T3 {
    stages: Vec<EmaCore>,
    period: usize,
    vfactor: f64,
    cursor: Cursor,
}

impl T3 {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("t3", period)?;
        Ok(Self {
            stages: (0..6).map(|_| EmaCore::new(period).unwrap()).collect(),
            period,
            vfactor: 0.7,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for T3 {
    fn warmup_period(&self) -> usize {
        6 * self.period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let mut input = bar.close;
        for stage in self.stages.iter_mut() {
            stage.update(input);
            input = match stage.value() {
                Some(v) => v,
                None => return,
            };
        }
    }
    fn value(&self) -> Value {
        let v: Vec<Option<f64>> = self.stages.iter().map(|s| s.value()).collect();
        if let [Some(_e1), Some(_e2), Some(e3), Some(e4), Some(e5), Some(e6)] =
            [v[0], v[1], v[2], v[3], v[4], v[5]]
        {
            let c = self.vfactor;
            let c1 = -c.powi(3);
            let c2 = 3.0 * c.powi(2) + 3.0 * c.powi(3);
            let c3 = -6.0 * c.powi(2) - 3.0 * c - 3.0 * c.powi(3);
            let c4 = 1.0 + 3.0 * c + c.powi(3) + 3.0 * c.powi(2);
            Value::Scalar(Some(c1 * e6 + c2 * e5 + c3 * e4 + c4 * e3))
        } else {
            Value::Scalar(None)
        }
    }
}

// ---------------------------------------------------------------------
// ALMA
// ---------------------------------------------------------------------

/// Arnaud Legoux MA: Gaussian-weighted window, `offset=0.85`, `sigma=6`.
#[derive(Debug)]
pub struct Alma {
    period: usize,
    weights: Vec<f64>,
    window: VecDeque<f64>,
    cursor: Cursor,
}

impl Alma {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("alma", period)?;
        let offset = 0.85;
        let sigma = 6.0;
        let m = offset * (period as f64 - 1.0);
        let s = period as f64 / sigma;
        let mut weights: Vec<f64> = (0..period)
            .map(|i| (-((i as f64 - m).powi(2)) / (2.0 * s * s)).exp())
            .collect();
        let norm: f64 = weights.iter().sum();
        for w in weights.iter_mut() {
            *w /= norm;
        }
        Ok(Self {
            period,
            weights,
            window: VecDeque::with_capacity(period),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Alma {
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
        if self.window.len() > self.period {
            self.window.pop_front();
        }
    }
    fn value(&self) -> Value {
        if self.window.len() < self.period {
            return Value::Scalar(None);
        }
        let v: f64 = self
            .window
            .iter()
            .zip(self.weights.iter())
            .map(|(x, w)| x * w)
            .sum();
        Value::Scalar(Some(v))
    }
}

// ---------------------------------------------------------------------
// VWMA
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Vwma {
    period: usize,
    closes: VecDeque<f64>,
    volumes: VecDeque<f64>,
    cursor: Cursor,
}

impl Vwma {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("vwma", period)?;
        Ok(Self {
            period,
            closes: VecDeque::with_capacity(period),
            volumes: VecDeque::with_capacity(period),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Vwma {
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
        self.volumes.push_back(bar.volume);
        if self.closes.len() > self.period {
            self.closes.pop_front();
            self.volumes.pop_front();
        }
    }
    fn value(&self) -> Value {
        if self.closes.len() < self.period {
            return Value::Scalar(None);
        }
        let vol_sum: f64 = self.volumes.iter().sum();
        if vol_sum == 0.0 {
            return Value::Scalar(Some(
                self.closes.iter().sum::<f64>() / self.period as f64,
            ));
        }
        let weighted: f64 = self
            .closes
            .iter()
            .zip(self.volumes.iter())
            .map(|(c, v)| c * v)
            .sum();
        Value::Scalar(Some(weighted / vol_sum))
    }
}

// ---------------------------------------------------------------------
// ADX (with +DI/-DI)
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Adx {
    di_period: usize,
    prev: Option<(f64, f64, f64)>, // (high, low, close)
    tr_smma: Option<f64>,
    plus_dm_smma: Option<f64>,
    minus_dm_smma: Option<f64>,
    dx_smma: Option<f64>,
    seed_tr: Vec<f64>,
    seed_plus_dm: Vec<f64>,
    seed_minus_dm: Vec<f64>,
    seed_dx: Vec<f64>,
    cursor: Cursor,
}

impl Adx {
    pub fn new(di_period: usize) -> Result<Self, EngineError> {
        require_positive("adx", di_period)?;
        Ok(Self {
            di_period,
            prev: None,
            tr_smma: None,
            plus_dm_smma: None,
            minus_dm_smma: None,
            dx_smma: None,
            seed_tr: Vec::with_capacity(di_period),
            seed_plus_dm: Vec::with_capacity(di_period),
            seed_minus_dm: Vec::with_capacity(di_period),
            seed_dx: Vec::with_capacity(di_period),
            cursor: Cursor::default(),
        })
    }

    fn wilder_seed_or_smooth(seed: &mut Vec<f64>, smoothed: &mut Option<f64>, period: usize, x: f64) {
        match *smoothed {
            None => {
                seed.push(x);
                if seed.len() == period {
                    *smoothed = Some(seed.iter().sum::<f64>() / period as f64);
                }
            }
            Some(prev) => {
                *smoothed = Some((prev * (period as f64 - 1.0) + x) / period as f64);
            }
        }
    }
}

impl Indicator for Adx {
    fn warmup_period(&self) -> usize {
        2 * self.di_period
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let Some((prev_h, prev_l, prev_c)) = self.prev else {
            self.prev = Some((bar.high, bar.low, bar.close));
            return;
        };

        let tr = (bar.high - bar.low)
            .max((bar.high - prev_c).abs())
            .max((bar.low - prev_c).abs());
        let up_move = bar.high - prev_h;
        let down_move = prev_l - bar.low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        Self::wilder_seed_or_smooth(&mut self.seed_tr, &mut self.tr_smma, self.di_period, tr);
        Self::wilder_seed_or_smooth(&mut self.seed_plus_dm, &mut self.plus_dm_smma, self.di_period, plus_dm);
        Self::wilder_seed_or_smooth(&mut self.seed_minus_dm, &mut self.minus_dm_smma, self.di_period, minus_dm);

        if let (Some(tr_s), Some(pdm), Some(mdm)) = (self.tr_smma, self.plus_dm_smma, self.minus_dm_smma) {
            if tr_s > 0.0 {
                let plus_di = 100.0 * pdm / tr_s;
                let minus_di = 100.0 * mdm / tr_s;
                let di_sum = plus_di + minus_di;
                let dx = if di_sum > 0.0 {
                    100.0 * (plus_di - minus_di).abs() / di_sum
                } else {
                    0.0
                };
                Self::wilder_seed_or_smooth(&mut self.seed_dx, &mut self.dx_smma, self.di_period, dx);
            }
        }

        self.prev = Some((bar.high, bar.low, bar.close));
    }
    fn value(&self) -> Value {
        let (plus_di, minus_di) = match (self.tr_smma, self.plus_dm_smma, self.minus_dm_smma) {
            (Some(tr), Some(pdm), Some(mdm)) if tr > 0.0 => {
                (Some(100.0 * pdm / tr), Some(100.0 * mdm / tr))
            }
            _ => (None, None),
        };
        Value::Adx {
            adx: self.dx_smma,
            plus_di,
            minus_di,
        }
    }
}

// ---------------------------------------------------------------------
// Aroon
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Aroon {
    period: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    cursor: Cursor,
}

impl Aroon {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("aroon", period)?;
        Ok(Self {
            period,
            highs: VecDeque::with_capacity(period + 1),
            lows: VecDeque::with_capacity(period + 1),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Aroon {
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
        if self.highs.len() > self.period + 1 {
            self.highs.pop_front();
            self.lows.pop_front();
        }
    }
    fn value(&self) -> Value {
        if self.highs.len() < self.period + 1 {
            return Value::Aroon { up: None, down: None };
        }
        let n = self.highs.len() - 1;
        let (hi_idx, _) = self
            .highs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        let (lo_idx, _) = self
            .lows
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        let periods_since_high = n - hi_idx;
        let periods_since_low = n - lo_idx;
        let up = 100.0 * (n as f64 - periods_since_high as f64) / n as f64;
        let down = 100.0 * (n as f64 - periods_since_low as f64) / n as f64;
        Value::Aroon {
            up: Some(up),
            down: Some(down),
        }
    }
}

// ---------------------------------------------------------------------
// Parabolic SAR
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Psar {
    acceleration: f64,
    max_acceleration: f64,
    af: f64,
    sar: Option<f64>,
    ep: f64,
    is_uptrend: bool,
    prev_high: f64,
    prev_low: f64,
    cursor: Cursor,
}

impl Psar {
    pub fn new(acceleration: f64, max_acceleration: f64) -> Result<Self, EngineError> {
        if acceleration <= 0.0 || max_acceleration <= 0.0 || acceleration > max_acceleration {
            return Err(EngineError::InvalidConfig {
                id: "psar".to_string(),
                reason: "acceleration/max must be positive with acceleration <= max".to_string(),
            });
        }
        Ok(Self {
            acceleration,
            max_acceleration,
            af: acceleration,
            sar: None,
            ep: 0.0,
            is_uptrend: true,
            prev_high: 0.0,
            prev_low: 0.0,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Psar {
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
        if self.sar.is_none() {
            self.sar = Some(bar.low);
            self.ep = bar.high;
            self.is_uptrend = true;
            self.af = self.acceleration;
            self.prev_high = bar.high;
            self.prev_low = bar.low;
            return;
        }

        let prev_sar = self.sar.unwrap();
        let mut next_sar = prev_sar + self.af * (self.ep - prev_sar);

        if self.is_uptrend {
            next_sar = next_sar.min(self.prev_low).min(bar.low);
            if bar.high > self.ep {
                self.ep = bar.high;
                self.af = (self.af + self.acceleration).min(self.max_acceleration);
            }
            if bar.low < next_sar {
                self.is_uptrend = false;
                next_sar = self.ep;
                self.ep = bar.low;
                self.af = self.acceleration;
            }
        } else {
            next_sar = next_sar.max(self.prev_high).max(bar.high);
            if bar.low < self.ep {
                self.ep = bar.low;
                self.af = (self.af + self.acceleration).min(self.max_acceleration);
            }
            if bar.high > next_sar {
                self.is_uptrend = true;
                next_sar = self.ep;
                self.ep = bar.high;
                self.af = self.acceleration;
            }
        }

        self.sar = Some(next_sar);
        self.prev_high = bar.high;
        self.prev_low = bar.low;
    }
    fn value(&self) -> Value {
        Value::Scalar(self.sar)
    }
}

// ---------------------------------------------------------------------
// Supertrend
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Supertrend {
    atr_period: usize,
    multiplier: f64,
    prev_close: Option<f64>,
    tr_smma: Option<f64>,
    seed_tr: Vec<f64>,
    upper_band: Option<f64>,
    lower_band: Option<f64>,
    value: Option<f64>,
    trend_up: bool,
    cursor: Cursor,
}

impl Supertrend {
    pub fn new(atr_period: usize, multiplier: f64) -> Result<Self, EngineError> {
        require_positive("supertrend", atr_period)?;
        if multiplier <= 0.0 {
            return Err(EngineError::InvalidConfig {
                id: "supertrend".to_string(),
                reason: "multiplier must be positive".to_string(),
            });
        }
        Ok(Self {
            atr_period,
            multiplier,
            prev_close: None,
            tr_smma: None,
            seed_tr: Vec::with_capacity(atr_period),
            upper_band: None,
            lower_band: None,
            value: None,
            trend_up: true,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Supertrend {
    fn warmup_period(&self) -> usize {
        self.atr_period
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
        let tr = (bar.high - bar.low)
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs());

        match self.tr_smma {
            None => {
                self.seed_tr.push(tr);
                if self.seed_tr.len() == self.atr_period {
                    self.tr_smma = Some(self.seed_tr.iter().sum::<f64>() / self.atr_period as f64);
                }
            }
            Some(prev) => {
                self.tr_smma =
                    Some((prev * (self.atr_period as f64 - 1.0) + tr) / self.atr_period as f64);
            }
        }

        if let Some(atr) = self.tr_smma {
            let mid = (bar.high + bar.low) / 2.0;
            let basic_upper = mid + self.multiplier * atr;
            let basic_lower = mid - self.multiplier * atr;

            let upper = match self.upper_band {
                Some(prev_upper) if prev_close <= prev_upper => basic_upper.min(prev_upper),
                _ => basic_upper,
            };
            let lower = match self.lower_band {
                Some(prev_lower) if prev_close >= prev_lower => basic_lower.max(prev_lower),
                _ => basic_lower,
            };

            if bar.close > upper {
                self.trend_up = true;
            } else if bar.close < lower {
                self.trend_up = false;
            }

            self.value = Some(if self.trend_up { lower } else { upper });
            self.upper_band = Some(upper);
            self.lower_band = Some(lower);
        }

        self.prev_close = Some(bar.close);
    }
    fn value(&self) -> Value {
        Value::Supertrend {
            supertrend: self.value,
            trend: self.value.map(|_| if self.trend_up { 1.0 } else { -1.0 }),
        }
    }
}

// ---------------------------------------------------------------------
// TRIX
// ---------------------------------------------------------------------

#[derive(Debug)]
pub struct Trix {
    ema1: EmaCore,
    ema2: EmaCore,
    ema3: EmaCore,
    prev_ema3: Option<f64>,
    period: usize,
    cursor: Cursor,
}

impl Trix {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("trix", period)?;
        Ok(Self {
            ema1: EmaCore::new(period).unwrap(),
            ema2: EmaCore::new(period).unwrap(),
            ema3: EmaCore::new(period).unwrap(),
            prev_ema3: None,
            period,
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Trix {
    // One extra bar beyond the triple EMA's own warmup is needed to have a
    // prior EMA3 value to rate-of-change against.
    fn warmup_period(&self) -> usize {
        3 * self.period + 1
    }
    fn bar_count(&self) -> usize {
        self.cursor.count
    }
    fn last_bar_ts(&self) -> Option<i64> {
        self.cursor.last_ts
    }
    fn update(&mut self, bar: &Bar) {
        self.cursor.observe(bar);
        let old_e3 = self.ema3.value();
        self.ema1.update(bar.close);
        if let Some(e1) = self.ema1.value() {
            self.ema2.update(e1);
        }
        if let Some(e2) = self.ema2.value() {
            self.ema3.update(e2);
        }
        if old_e3.is_some() {
            self.prev_ema3 = old_e3;
        }
    }
    fn value(&self) -> Value {
        match (self.ema3.value(), self.prev_ema3) {
            (Some(e3), Some(prev)) if prev != 0.0 => {
                Value::Scalar(Some(100.0 * (e3 - prev) / prev))
            }
            _ => Value::Scalar(None),
        }
    }
}

// ---------------------------------------------------------------------
// DPO
// ---------------------------------------------------------------------

/// Detrended Price Oscillator: `close[t - shift] - SMA(period)[t]`,
/// `shift = period/2 + 1`.
#[derive(Debug)]
pub struct Dpo {
    period: usize,
    shift: usize,
    window: VecDeque<f64>,
    sum: f64,
    history: VecDeque<f64>,
    cursor: Cursor,
}

impl Dpo {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        require_positive("dpo", period)?;
        let shift = period / 2 + 1;
        Ok(Self {
            period,
            shift,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            history: VecDeque::with_capacity(shift + 1),
            cursor: Cursor::default(),
        })
    }
}

impl Indicator for Dpo {
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
        if self.window.len() > self.period {
            self.sum -= self.window.pop_front().unwrap();
        }
        self.history.push_back(bar.close);
        if self.history.len() > self.shift + 1 {
            self.history.pop_front();
        }
    }
    fn value(&self) -> Value {
        if self.window.len() < self.period || self.history.len() <= self.shift {
            return Value::Scalar(None);
        }
        let sma = self.sum / self.period as f64;
        let shifted_close = self.history[self.history.len() - 1 - self.shift];
        Value::Scalar(Some(shifted_close - sma))
    }
}

// ---------------------------------------------------------------------
// KST
// ---------------------------------------------------------------------

/// Know Sure Thing: fixed warmup of 55 bars per the registry table, using
/// standard ROC periods (10,15,20,30) with SMA smoothing (10,10,10,15) and
/// a 9-period signal SMA.
#[derive(Debug)]
pub struct Kst {
    roc_periods: [usize; 4],
    sma_periods: [usize; 4],
    signal_period: usize,
    closes: VecDeque<f64>,
    roc_smas: [WmaLikeSma; 4],
    signal_sma: WmaLikeSma,
    cursor: Cursor,
}

/// Plain running-mean SMA helper (distinct name from `Sma` to avoid an
/// `Indicator` impl where none is needed internally).
#[derive(Debug, Clone)]
struct WmaLikeSma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}
impl WmaLikeSma {
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

impl Kst {
    pub fn new() -> Self {
        let roc_periods = [10, 15, 20, 30];
        Self {
            roc_periods,
            sma_periods: [10, 10, 10, 15],
            signal_period: 9,
            closes: VecDeque::with_capacity(roc_periods[3] + 1),
            roc_smas: [
                WmaLikeSma::new(10),
                WmaLikeSma::new(10),
                WmaLikeSma::new(10),
                WmaLikeSma::new(15),
            ],
            signal_sma: WmaLikeSma::new(9),
            cursor: Cursor::default(),
        }
    }

    fn roc(&self, period: usize) -> Option<f64> {
        if self.closes.len() <= period {
            return None;
        }
        let last = *self.closes.back().unwrap();
        let past = self.closes[self.closes.len() - 1 - period];
        if past == 0.0 {
            None
        } else {
            Some(100.0 * (last - past) / past)
        }
    }
}

impl Default for Kst {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Kst {
    fn warmup_period(&self) -> usize {
        55
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
        let cap = self.roc_periods[3] + 1;
        if self.closes.len() > cap {
            self.closes.pop_front();
        }
        for i in 0..4 {
            if let Some(roc) = self.roc(self.roc_periods[i]) {
                self.roc_smas[i].update(roc);
            }
        }
        let _ = self.sma_periods;
        if let Some(kst) = self.kst_value() {
            self.signal_sma.update(kst);
        }
    }
    fn value(&self) -> Value {
        Value::Kst {
            kst: self.kst_value(),
            signal: self.signal_sma.value(),
        }
    }
}

impl Kst {
    fn kst_value(&self) -> Option<f64> {
        let vals: Vec<f64> = self.roc_smas.iter().map(|s| s.value()).collect::<Option<_>>()?;
        Some(vals[0] * 1.0 + vals[1] * 2.0 + vals[2] * 3.0 + vals[3] * 4.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamta_data::Timeframe;

    fn tf() -> Timeframe {
        Timeframe::parse("1m").unwrap()
    }

    fn bar(i: i64, close: f64) -> Bar {
        Bar::new(i * 60_000, close, close + 1.0, close - 1.0, close, 1.0, tf()).unwrap()
    }

    #[test]
    fn ema_seeds_with_sma_of_first_period_bars() {
        let mut ema = Ema::new(3).unwrap();
        for (i, c) in [10.0, 20.0, 30.0].into_iter().enumerate() {
            ema.update(&bar(i as i64, c));
        }
        assert!(!ema.is_warmed_up() || ema.bar_count() == 3);
        assert_eq!(ema.value(), Value::Scalar(Some(20.0)));
        ema.update(&bar(3, 40.0));
        match ema.value() {
            Value::Scalar(Some(v)) => assert!((v - 30.0).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ema_is_null_before_seed_completes() {
        let mut ema = Ema::new(3).unwrap();
        ema.update(&bar(0, 10.0));
        ema.update(&bar(1, 20.0));
        assert_eq!(ema.value(), Value::Scalar(None));
    }

    #[test]
    fn sma_matches_simple_mean_once_warmed() {
        let mut sma = Sma::new(4).unwrap();
        for (i, c) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            sma.update(&bar(i as i64, c));
        }
        assert_eq!(sma.value(), Value::Scalar(Some(2.5)));
    }

    #[test]
    fn dema_requires_double_the_period_to_warm_up() {
        let dema = Dema::new(5).unwrap();
        assert_eq!(dema.warmup_period(), 10);
    }

    #[test]
    fn tema_requires_triple_the_period_to_warm_up() {
        let tema = Tema::new(5).unwrap();
        assert_eq!(tema.warmup_period(), 15);
    }
}
