use streamta_data::{Bar, Timeframe};

use crate::error::EngineError;

/// Aggregates a stream of `source_tf` bars into `target_tf` bars aligned to
/// epoch-based period boundaries, emitting exactly when a period's final
/// source bar arrives (no one-bar lag).
#[derive(Debug)]
pub struct OhlcvResampler {
    source_tf: Timeframe,
    target_tf: Timeframe,
    source_ms: i64,
    target_ms: i64,
    ratio: i64,
    current_period_start: Option<i64>,
    pending_open: Option<f64>,
    pending_high: f64,
    pending_low: f64,
    pending_close: f64,
    pending_volume: f64,
    pending_ts: i64,
    count: u64,
}

impl OhlcvResampler {
    pub fn new(source_tf: Timeframe, target_tf: Timeframe) -> Result<Self, EngineError> {
        let source_ms = source_tf.duration_ms();
        let target_ms = target_tf.duration_ms();

        if target_ms < source_ms {
            return Err(EngineError::InvalidResampleRatio {
                source: source_tf.as_str().to_string(),
                target: target_tf.as_str().to_string(),
                reason: "target timeframe is smaller than source".to_string(),
            });
        }
        if target_ms % source_ms != 0 {
            return Err(EngineError::InvalidResampleRatio {
                source: source_tf.as_str().to_string(),
                target: target_tf.as_str().to_string(),
                reason: "target is not an integer multiple of source".to_string(),
            });
        }

        let ratio = target_ms / source_ms;
        Ok(Self {
            source_tf,
            target_tf,
            source_ms,
            target_ms,
            ratio,
            current_period_start: None,
            pending_open: None,
            pending_high: f64::NEG_INFINITY,
            pending_low: f64::INFINITY,
            pending_close: 0.0,
            pending_volume: 0.0,
            pending_ts: 0,
            count: 0,
        })
    }

    pub fn source_tf(&self) -> &Timeframe {
        &self.source_tf
    }

    pub fn target_tf(&self) -> &Timeframe {
        &self.target_tf
    }

    pub fn ratio(&self) -> i64 {
        self.ratio
    }

    pub fn pending_count(&self) -> u64 {
        self.count
    }

    fn period_start(&self, timestamp_ms: i64) -> i64 {
        (timestamp_ms.div_euclid(self.target_ms)) * self.target_ms
    }

    fn is_period_last_bar(&self, bar_timestamp_ms: i64) -> bool {
        let period_start = self.period_start(bar_timestamp_ms);
        let period_end = period_start + self.target_ms;
        let next_bar_ts = bar_timestamp_ms + self.source_ms;
        next_bar_ts >= period_end
    }

    /// Folds one source bar in. Returns at most one emitted aggregate: a
    /// current-period close supersedes a prior-period flush when both would
    /// occur on the same call (they can't both be returned — see the
    /// resampler design note on this exact tradeoff).
    pub fn add(&mut self, bar: &Bar) -> Option<Bar> {
        let bar_period_start = self.period_start(bar.timestamp_ms);
        let mut result = None;

        if let Some(current) = self.current_period_start {
            if bar_period_start != current && self.pending_open.is_some() {
                result = self.create_output_bar();
                self.reset();
            }
        }

        self.current_period_start = Some(bar_period_start);

        if self.pending_open.is_none() {
            self.pending_open = Some(bar.open);
            self.pending_ts = bar_period_start;
        }

        self.pending_high = self.pending_high.max(bar.high);
        self.pending_low = self.pending_low.min(bar.low);
        self.pending_close = bar.close;
        self.pending_volume += bar.volume;
        self.count += 1;

        if self.is_period_last_bar(bar.timestamp_ms) {
            result = self.create_output_bar();
            self.reset();
        }

        result
    }

    /// Forces emission of whatever partial aggregate is pending. Used at
    /// end-of-stream; returns `None` if there is nothing to flush.
    pub fn flush(&mut self) -> Option<Bar> {
        let result = self.create_output_bar();
        if result.is_some() {
            self.reset();
        }
        result
    }

    fn create_output_bar(&self) -> Option<Bar> {
        let open = self.pending_open?;
        Some(Bar::from_aggregate(
            self.pending_ts,
            open,
            self.pending_high,
            self.pending_low,
            self.pending_close,
            self.pending_volume,
            self.target_tf.clone(),
        ))
    }

    fn reset(&mut self) {
        self.current_period_start = None;
        self.pending_open = None;
        self.pending_high = f64::NEG_INFINITY;
        self.pending_low = f64::INFINITY;
        self.pending_close = 0.0;
        self.pending_volume = 0.0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf(s: &str) -> Timeframe {
        Timeframe::parse(s).unwrap()
    }

    fn bar(ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64, t: &str) -> Bar {
        Bar::new(ts, o, h, l, c, v, tf(t)).unwrap()
    }

    #[test]
    fn rejects_smaller_or_non_integer_ratio() {
        assert!(OhlcvResampler::new(tf("1h"), tf("1m")).is_err());
        assert!(OhlcvResampler::new(tf("30m"), tf("1h")).is_ok());
        // 1M (2_592_000s) is not an integer multiple of 1w (604_800s).
        assert!(OhlcvResampler::new(tf("1w"), tf("1M")).is_err());
    }

    #[test]
    fn emits_exactly_one_5m_bar_on_fifth_input() {
        let mut r = OhlcvResampler::new(tf("1m"), tf("5m")).unwrap();
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0];
        let highs = [11.0, 12.0, 13.0, 14.0, 15.0];
        let lows = [9.0, 10.0, 11.0, 12.0, 13.0];
        let mut last = None;
        for (i, ts) in [0, 60_000, 120_000, 180_000, 240_000].into_iter().enumerate() {
            let b = bar(ts, closes[i], highs[i], lows[i], closes[i], 1.0, "1m");
            let out = r.add(&b);
            if i < 4 {
                assert!(out.is_none(), "no emission before period close");
            } else {
                last = out;
            }
        }
        let emitted = last.expect("5th bar closes the 5m period");
        assert_eq!(emitted.timestamp_ms, 0);
        assert_eq!(emitted.open, 10.0);
        assert_eq!(emitted.high, 15.0);
        assert_eq!(emitted.low, 9.0);
        assert_eq!(emitted.close, 14.0);
        assert_eq!(emitted.volume, 5.0);
        assert_eq!(emitted.timeframe.as_str(), "5m");
    }

    #[test]
    fn gap_flushes_partial_period_on_next_period_arrival() {
        let mut r = OhlcvResampler::new(tf("1m"), tf("5m")).unwrap();
        r.add(&bar(0, 10.0, 11.0, 9.0, 10.0, 1.0, "1m"));
        r.add(&bar(60_000, 11.0, 12.0, 10.0, 11.0, 1.0, "1m"));
        // bar at 120_000 is skipped (the gap)
        r.add(&bar(180_000, 13.0, 14.0, 12.0, 13.0, 1.0, "1m"));
        let out = r.add(&bar(300_000, 20.0, 21.0, 19.0, 20.0, 1.0, "1m"));
        let flushed = out.expect("arrival of the next period flushes the partial first period");
        assert_eq!(flushed.timestamp_ms, 0);
        assert_eq!(flushed.open, 10.0);
        assert_eq!(flushed.close, 13.0);
        assert_eq!(flushed.high, 14.0);
        assert_eq!(flushed.low, 9.0);
    }

    #[test]
    fn flush_emits_pending_partial_aggregate_at_end_of_stream() {
        let mut r = OhlcvResampler::new(tf("1m"), tf("5m")).unwrap();
        r.add(&bar(0, 10.0, 11.0, 9.0, 10.0, 1.0, "1m"));
        r.add(&bar(60_000, 11.0, 12.0, 10.0, 11.0, 1.0, "1m"));
        let out = r.flush();
        let flushed = out.expect("flush emits the partial aggregate");
        assert_eq!(flushed.volume, 2.0);
        assert!(r.flush().is_none(), "nothing left to flush after reset");
    }

    #[test]
    fn emitted_timestamp_is_always_period_aligned() {
        let mut r = OhlcvResampler::new(tf("1m"), tf("1h")).unwrap();
        let mut emitted = vec![];
        for i in 0..120 {
            let ts = i * 60_000;
            if let Some(b) = r.add(&bar(ts, 1.0, 1.0, 1.0, 1.0, 1.0, "1m")) {
                emitted.push(b);
            }
        }
        assert_eq!(emitted.len(), 2);
        for b in emitted {
            assert_eq!(b.timestamp_ms % 3_600_000, 0);
        }
    }
}
