//! Static `type_tag -> factory` table. Keeps `register_requirements`
//! data-driven instead of growing one giant match arm per call site.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::indicators::indicator_trait::Indicator;
use crate::indicators::momentum::{
    AwesomeOscillator, Cci, Macd, Roc, Rsi, Stochastic, StochRsi, Tsi, UltimateOscillator, WilliamsR,
};
use crate::indicators::other::{BalanceOfPower, ChoppinessIndex, Ichimoku, Vortex};
use crate::indicators::trend::{
    Adx, Alma, Aroon, Dema, Dpo, Ema, Hma, Kama, Kst, Psar, Sma, Smma, Supertrend, T3, Tema, Trix, Vwma, Wma,
    Zlema,
};
use crate::indicators::volatility::{Atr, BollingerBands, DonchianChannels, KeltnerChannels, Natr, StdDev};
use crate::indicators::volume::{AccumulationDistribution, ChaikinMoneyFlow, EaseOfMovement, ForceIndex, MassIndex, Obv, Vwap};

fn param(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

fn period(params: &HashMap<String, f64>, default: usize) -> usize {
    param(params, "period", default as f64).round().max(0.0) as usize
}

/// Every tag the registry accepts, including the aliases listed in §4.1.
pub fn supported_types() -> &'static [&'static str] {
    &[
        "sma", "ema", "dema", "tema", "wma", "smma", "hma", "kama", "zlema", "t3", "alma", "vwma",
        "rsi", "macd", "stoch", "stochrsi", "cci", "roc", "willr", "williams", "tsi", "ao", "uo",
        "boll", "bb", "bollinger", "atr", "natr", "kc", "dc", "stddev",
        "adx", "aroon", "psar", "supertrend", "trix", "dpo", "kst",
        "obv", "vwap", "adl", "accudist", "chaikin", "force", "emv", "mass",
        "ichimoku", "bop", "chop", "vtx",
    ]
}

/// Builds a boxed indicator for `type_tag` from a raw params map. Unknown
/// tags fail with `UnsupportedIndicator`; bad param combinations propagate
/// whatever `InvalidConfig` the underlying constructor raised.
pub fn build(type_tag: &str, params: &HashMap<String, f64>) -> Result<Box<dyn Indicator>, EngineError> {
    let p = |default| period(params, default);
    match type_tag {
        "sma" => Ok(Box::new(Sma::new(p(20))?)),
        "ema" => Ok(Box::new(Ema::new(p(20))?)),
        "dema" => Ok(Box::new(Dema::new(p(20))?)),
        "tema" => Ok(Box::new(Tema::new(p(20))?)),
        "wma" => Ok(Box::new(Wma::new(p(20))?)),
        "smma" => Ok(Box::new(Smma::new(p(20))?)),
        "hma" => Ok(Box::new(Hma::new(p(20))?)),
        "kama" => Ok(Box::new(Kama::new(p(10))?)),
        "zlema" => Ok(Box::new(Zlema::new(p(20))?)),
        "t3" => Ok(Box::new(T3::new(p(5))?)),
        "alma" => Ok(Box::new(Alma::new(p(9))?)),
        "vwma" => Ok(Box::new(Vwma::new(p(20))?)),

        "rsi" => Ok(Box::new(Rsi::new(p(14))?)),
        "macd" => {
            let fast = param(params, "fast", 12.0).round().max(1.0) as usize;
            let slow = param(params, "slow", 26.0).round().max(1.0) as usize;
            let signal = param(params, "signal", 9.0).round().max(1.0) as usize;
            Ok(Box::new(Macd::new(fast, slow, signal)?))
        }
        "stoch" => {
            let per = p(14);
            let smoothing = param(params, "smoothing", 3.0).round().max(1.0) as usize;
            Ok(Box::new(Stochastic::new(per, smoothing)?))
        }
        "stochrsi" => {
            let rsi_period = param(params, "rsi_period", 14.0).round().max(1.0) as usize;
            let stoch_period = param(params, "stoch_period", 14.0).round().max(1.0) as usize;
            Ok(Box::new(StochRsi::new(rsi_period, stoch_period)?))
        }
        "cci" => Ok(Box::new(Cci::new(p(20))?)),
        "roc" => Ok(Box::new(Roc::new(p(12))?)),
        "willr" | "williams" => Ok(Box::new(WilliamsR::new(p(14))?)),
        "tsi" => {
            let slow = param(params, "slow", 25.0).round().max(1.0) as usize;
            let fast = param(params, "fast", 13.0).round().max(1.0) as usize;
            Ok(Box::new(Tsi::new(slow, fast)?))
        }
        "ao" => {
            let fast = param(params, "fast", 5.0).round().max(1.0) as usize;
            let slow = param(params, "slow", 34.0).round().max(1.0) as usize;
            Ok(Box::new(AwesomeOscillator::new(fast, slow)?))
        }
        "uo" => {
            let short = param(params, "short", 7.0).round().max(1.0) as usize;
            let medium = param(params, "medium", 14.0).round().max(1.0) as usize;
            let long = param(params, "long", 28.0).round().max(1.0) as usize;
            Ok(Box::new(UltimateOscillator::new(short, medium, long)?))
        }

        "boll" | "bb" | "bollinger" => {
            let per = p(20);
            let std_dev = param(params, "std_dev", 2.0);
            Ok(Box::new(BollingerBands::new(per, std_dev)?))
        }
        "atr" => Ok(Box::new(Atr::new(p(14))?)),
        "natr" => Ok(Box::new(Natr::new(p(14))?)),
        "kc" => {
            let per = p(20);
            let multiplier = param(params, "multiplier", 2.0);
            Ok(Box::new(KeltnerChannels::new(per, multiplier)?))
        }
        "dc" => Ok(Box::new(DonchianChannels::new(p(20))?)),
        "stddev" => Ok(Box::new(StdDev::new(p(20))?)),

        "adx" => Ok(Box::new(Adx::new(p(14))?)),
        "aroon" => Ok(Box::new(Aroon::new(p(25))?)),
        "psar" => {
            let acceleration = param(params, "acceleration", 0.02);
            let max_acceleration = param(params, "max_acceleration", 0.2);
            Ok(Box::new(Psar::new(acceleration, max_acceleration)?))
        }
        "supertrend" => {
            let atr_period = period(params, 10);
            let multiplier = param(params, "multiplier", 3.0);
            Ok(Box::new(Supertrend::new(atr_period, multiplier)?))
        }
        "trix" => Ok(Box::new(Trix::new(p(15))?)),
        "dpo" => Ok(Box::new(Dpo::new(p(20))?)),
        "kst" => Ok(Box::new(Kst::new())),

        "obv" => Ok(Box::new(Obv::new())),
        "vwap" => Ok(Box::new(Vwap::new())),
        "adl" | "accudist" => Ok(Box::new(AccumulationDistribution::new())),
        "chaikin" => Ok(Box::new(ChaikinMoneyFlow::new(p(20))?)),
        "force" => Ok(Box::new(ForceIndex::new(p(13))?)),
        "emv" => Ok(Box::new(EaseOfMovement::new(p(14))?)),
        "mass" => {
            let ema_period = param(params, "ema_period", 9.0).round().max(1.0) as usize;
            let sum_period = param(params, "sum_period", 25.0).round().max(1.0) as usize;
            Ok(Box::new(MassIndex::new(ema_period, sum_period)?))
        }

        "ichimoku" => {
            let tenkan = param(params, "tenkan_period", 9.0).round().max(1.0) as usize;
            let kijun = param(params, "kijun_period", 26.0).round().max(1.0) as usize;
            let senkou_b = param(params, "senkou_b_period", 52.0).round().max(1.0) as usize;
            let chikou_lag = param(params, "chikou_lag", 26.0).round().max(1.0) as usize;
            Ok(Box::new(Ichimoku::new(tenkan, kijun, senkou_b, chikou_lag)?))
        }
        "bop" => Ok(Box::new(BalanceOfPower::new())),
        "chop" => Ok(Box::new(ChoppinessIndex::new(p(14))?)),
        "vtx" => Ok(Box::new(Vortex::new(p(14))?)),

        other => Err(EngineError::UnsupportedIndicator(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_tag_builds_with_default_params() {
        let empty = HashMap::new();
        for tag in supported_types() {
            let built = build(tag, &empty);
            assert!(built.is_ok(), "tag {tag} failed to build with defaults");
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let empty = HashMap::new();
        assert!(matches!(
            build("not_a_real_indicator", &empty),
            Err(EngineError::UnsupportedIndicator(_))
        ));
    }

    #[test]
    fn macd_rejects_fast_not_less_than_slow_via_registry() {
        let mut params = HashMap::new();
        params.insert("fast".to_string(), 10.0);
        params.insert("slow".to_string(), 10.0);
        assert!(matches!(build("macd", &params), Err(EngineError::InvalidConfig { .. })));
    }
}
