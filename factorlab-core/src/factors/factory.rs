//! Factor factory — converts `FactorConfig` into runtime trait objects.
//!
//! Factors are identified by a string id plus an f64 parameter map, so
//! external registries (config files, sweep generators) can name them
//! without linking against concrete types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::buy::{BreakoutBuy, MaCrossoverBuy};
use super::sell::{PercentStopSell, TrailingStopSell};
use super::{BuyFactor, SellFactor};

/// Named, parameterized factor description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorConfig {
    pub factor_type: String,
    #[serde(default)]
    pub params: HashMap<String, f64>,
}

/// Errors that can occur during factor construction.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("unknown buy factor type: {0}")]
    UnknownBuyFactor(String),
    #[error("unknown sell factor type: {0}")]
    UnknownSellFactor(String),
}

/// Extract a named f64 parameter, falling back to `default`.
fn param(config: &FactorConfig, name: &str, default: f64) -> f64 {
    config.params.get(name).copied().unwrap_or(default)
}

/// Extract a named usize parameter, falling back to `default`.
fn param_usize(config: &FactorConfig, name: &str, default: usize) -> usize {
    config
        .params
        .get(name)
        .copied()
        .map(|v| v as usize)
        .unwrap_or(default)
}

/// Create a buy factor from a `FactorConfig`.
pub fn create_buy_factor(config: &FactorConfig) -> Result<Box<dyn BuyFactor>, FactoryError> {
    match config.factor_type.as_str() {
        "breakout" => {
            let lookback = param_usize(config, "lookback", 60);
            let exclusive = param(config, "exclusive", 0.0) != 0.0;
            Ok(Box::new(BreakoutBuy::new(lookback, exclusive)))
        }
        "ma_crossover" => {
            let fast = param_usize(config, "fast", 5);
            let slow = param_usize(config, "slow", 20);
            Ok(Box::new(MaCrossoverBuy::new(fast, slow)))
        }
        other => Err(FactoryError::UnknownBuyFactor(other.to_string())),
    }
}

/// Create a sell factor from a `FactorConfig`.
pub fn create_sell_factor(config: &FactorConfig) -> Result<Box<dyn SellFactor>, FactoryError> {
    match config.factor_type.as_str() {
        "percent_stop" => {
            let stop_loss = param(config, "stop_loss_pct", 0.08);
            let take_profit = param(config, "take_profit_pct", 0.20);
            Ok(Box::new(PercentStopSell::new(stop_loss, take_profit)))
        }
        "trailing_stop" => {
            let giveback = param(config, "giveback_pct", 0.10);
            let activation = param(config, "activation_pct", 0.05);
            Ok(Box::new(TrailingStopSell::new(giveback, activation)))
        }
        other => Err(FactoryError::UnknownSellFactor(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(factor_type: &str, params: &[(&str, f64)]) -> FactorConfig {
        FactorConfig {
            factor_type: factor_type.to_string(),
            params: params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn creates_breakout_with_params() {
        let factor = create_buy_factor(&config("breakout", &[("lookback", 20.0)])).unwrap();
        assert_eq!(factor.name(), "breakout_20");
        assert_eq!(factor.lookback(), 20);
        assert!(!factor.exclusive());

        let exclusive =
            create_buy_factor(&config("breakout", &[("exclusive", 1.0)])).unwrap();
        assert!(exclusive.exclusive());
    }

    #[test]
    fn creates_ma_crossover_with_defaults() {
        let factor = create_buy_factor(&config("ma_crossover", &[])).unwrap();
        assert_eq!(factor.name(), "ma_cross_5_20");
    }

    #[test]
    fn creates_sell_factors() {
        assert_eq!(
            create_sell_factor(&config("percent_stop", &[])).unwrap().name(),
            "percent_stop"
        );
        assert_eq!(
            create_sell_factor(&config("trailing_stop", &[])).unwrap().name(),
            "trailing_stop"
        );
    }

    #[test]
    fn unknown_types_are_errors() {
        assert!(matches!(
            create_buy_factor(&config("astrology", &[])),
            Err(FactoryError::UnknownBuyFactor(_))
        ));
        assert!(matches!(
            create_sell_factor(&config("astrology", &[])),
            Err(FactoryError::UnknownSellFactor(_))
        ));
    }

    #[test]
    fn factor_config_toml_roundtrip() {
        let toml_src = r#"
            factor_type = "breakout"
            [params]
            lookback = 42.0
        "#;
        let config: FactorConfig = toml::from_str(toml_src).unwrap();
        let factor = create_buy_factor(&config).unwrap();
        assert_eq!(factor.lookback(), 42);
    }
}
