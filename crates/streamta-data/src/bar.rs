use serde::{Deserialize, Serialize};

use crate::timeframe::Timeframe;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BarError {
    #[error("bar low {low} exceeds min(open={open}, close={close})")]
    LowAboveBody { low: f64, open: f64, close: f64 },
    #[error("bar high {high} is below max(open={open}, close={close})")]
    HighBelowBody { high: f64, open: f64, close: f64 },
    #[error("bar volume {volume} is negative")]
    NegativeVolume { volume: f64 },
}

/// An immutable OHLCV record for a single closed period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timeframe: Timeframe,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timeframe: Timeframe,
    ) -> Result<Self, BarError> {
        let min_body = open.min(close);
        let max_body = open.max(close);

        if low > min_body {
            return Err(BarError::LowAboveBody { low, open, close });
        }
        if high < max_body {
            return Err(BarError::HighBelowBody { high, open, close });
        }
        if volume < 0.0 {
            return Err(BarError::NegativeVolume { volume });
        }

        Ok(Self {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
            timeframe,
        })
    }

    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// A synthetic bar carrying `timeframe`, used internally by the
    /// resampler to emit aggregated higher-TF bars without re-validating
    /// already-validated OHLCV relationships from their source bars.
    pub(crate) fn from_aggregate(
        timestamp_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timeframe: Timeframe,
    ) -> Self {
        Self {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
            timeframe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf(s: &str) -> Timeframe {
        Timeframe::parse(s).unwrap()
    }

    #[test]
    fn accepts_well_formed_bar() {
        let bar = Bar::new(0, 10.0, 11.0, 9.0, 10.5, 100.0, tf("1m")).unwrap();
        assert_eq!(bar.midpoint(), 10.0);
        assert!((bar.range() - 2.0).abs() < 1e-12);
        assert!(bar.is_bullish());
    }

    #[test]
    fn rejects_low_above_body() {
        let err = Bar::new(0, 10.0, 11.0, 10.2, 10.5, 100.0, tf("1m")).unwrap_err();
        assert!(matches!(err, BarError::LowAboveBody { .. }));
    }

    #[test]
    fn rejects_high_below_body() {
        let err = Bar::new(0, 10.0, 10.3, 9.0, 10.5, 100.0, tf("1m")).unwrap_err();
        assert!(matches!(err, BarError::HighBelowBody { .. }));
    }

    #[test]
    fn rejects_negative_volume() {
        let err = Bar::new(0, 10.0, 11.0, 9.0, 10.5, -1.0, tf("1m")).unwrap_err();
        assert!(matches!(err, BarError::NegativeVolume { .. }));
    }
}
