//! Simulation configuration — TOML-backed, no process-wide globals.
//!
//! Everything the master and supplier need is carried in one explicit
//! struct: capital, sizing, date range, universe, factor chains, data
//! source settings, and execution constants.

use chrono::NaiveDate;
use factorlab_core::data::{FetchMode, SupplierConfig};
use factorlab_core::engine::{CommissionModel, MidpointSlippage, PositionSizer};
use factorlab_core::factors::{
    create_buy_factor, create_sell_factor, FactorChain, FactorConfig, FactoryError,
};
use factorlab_core::domain::{Symbol, SymbolParseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid symbol in universe: {0}")]
    Symbol(#[from] SymbolParseError),
    #[error("config invalid: {0}")]
    Invalid(String),
}

/// Top-level simulation config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub simulation: SimulationSection,
    #[serde(default)]
    pub buy_factors: Vec<FactorConfig>,
    #[serde(default)]
    pub sell_factors: Vec<FactorConfig>,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub execution: ExecutionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    pub initial_capital: f64,
    /// Fraction of the cash snapshot committed per position.
    #[serde(default = "default_position_pct")]
    pub position_pct: f64,
    /// Hold-duration ceiling in trading days.
    pub max_keep_days: Option<u32>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Benchmark symbol for the relative equity column.
    pub benchmark: Option<String>,
    /// Inline symbol list; merged with `universe_file` when both are set.
    #[serde(default)]
    pub universe: Vec<String>,
    /// Path to a group-organized universe TOML file.
    pub universe_file: Option<String>,
}

/// Group-organized symbol lists loaded from a separate TOML file, so a
/// large universe can be maintained outside the simulation config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseFile {
    pub groups: BTreeMap<String, Vec<String>>,
}

impl UniverseFile {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// All symbols across all groups, in group-name order.
    pub fn all_symbols(&self) -> Vec<&str> {
        self.groups
            .values()
            .flat_map(|symbols| symbols.iter().map(|s| s.as_str()))
            .collect()
    }

    pub fn symbol_count(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }
}

fn default_position_pct() -> f64 {
    0.25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// "auto" consults the provider for uncovered ranges; "local" never does.
    #[serde(default = "default_fetch_mode")]
    pub fetch_mode: String,
    #[serde(default = "default_span_years")]
    pub span_years: u32,
}

fn default_cache_dir() -> String {
    "data".to_string()
}

fn default_fetch_mode() -> String {
    "auto".to_string()
}

fn default_span_years() -> u32 {
    2
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            fetch_mode: default_fetch_mode(),
            span_years: default_span_years(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSection {
    #[serde(default = "default_gap_down_limit")]
    pub gap_down_limit: f64,
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    #[serde(default = "default_min_fee")]
    pub min_fee: f64,
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
}

fn default_gap_down_limit() -> f64 {
    0.07
}

fn default_fee_rate() -> f64 {
    0.00025
}

fn default_min_fee() -> f64 {
    5.0
}

fn default_tax_rate() -> f64 {
    0.001
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            gap_down_limit: default_gap_down_limit(),
            fee_rate: default_fee_rate(),
            min_fee: default_min_fee(),
            tax_rate: default_tax_rate(),
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.universe.is_empty() && self.simulation.universe_file.is_none() {
            return Err(ConfigError::Invalid("universe is empty".into()));
        }
        if self.buy_factors.is_empty() {
            return Err(ConfigError::Invalid("no buy factors configured".into()));
        }
        if self.simulation.initial_capital <= 0.0 {
            return Err(ConfigError::Invalid("initial_capital must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.simulation.position_pct)
            || self.simulation.position_pct == 0.0
        {
            return Err(ConfigError::Invalid(
                "position_pct must be in (0, 1]".into(),
            ));
        }
        match (self.simulation.start, self.simulation.end) {
            (Some(s), Some(e)) if s > e => {
                return Err(ConfigError::Invalid(format!("start {s} after end {e}")))
            }
            _ => {}
        }
        Ok(())
    }

    /// Parsed symbol universe: the inline list plus the universe file's
    /// groups when one is configured, de-duplicated keeping first mention.
    pub fn universe(&self) -> Result<Vec<Symbol>, ConfigError> {
        let mut raw: Vec<String> = self.simulation.universe.clone();
        if let Some(path) = &self.simulation.universe_file {
            let file = UniverseFile::from_file(Path::new(path))?;
            raw.extend(file.all_symbols().iter().map(|s| s.to_string()));
        }
        if raw.is_empty() {
            return Err(ConfigError::Invalid("universe is empty".into()));
        }

        let mut seen = BTreeSet::new();
        raw.iter()
            .filter(|s| seen.insert(s.to_string()))
            .map(|s| s.parse::<Symbol>().map_err(ConfigError::from))
            .collect()
    }

    /// Parsed benchmark symbol, if configured.
    pub fn benchmark(&self) -> Result<Option<Symbol>, ConfigError> {
        self.simulation
            .benchmark
            .as_deref()
            .map(|s| s.parse::<Symbol>().map_err(ConfigError::from))
            .transpose()
    }

    /// Build the factor-chain template cloned for each symbol.
    pub fn build_chain(&self) -> Result<FactorChain, FactoryError> {
        let buy = self
            .buy_factors
            .iter()
            .map(create_buy_factor)
            .collect::<Result<Vec<_>, _>>()?;
        let sell = self
            .sell_factors
            .iter()
            .map(create_sell_factor)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FactorChain::new(buy, sell))
    }

    pub fn supplier_config(&self) -> SupplierConfig {
        SupplierConfig {
            fetch_mode: if self.data.fetch_mode == "local" {
                FetchMode::LocalOnly
            } else {
                FetchMode::Auto
            },
            default_span_years: self.data.span_years,
        }
    }

    pub fn commission_model(&self) -> CommissionModel {
        CommissionModel::new(
            self.execution.fee_rate,
            self.execution.min_fee,
            self.execution.tax_rate,
        )
    }

    pub fn slippage(&self) -> MidpointSlippage {
        MidpointSlippage::new(self.execution.gap_down_limit)
    }

    pub fn sizer(&self) -> PositionSizer {
        PositionSizer::new(self.simulation.position_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [simulation]
        initial_capital = 1000000.0
        universe = ["sh600036", "sz000001"]

        [[buy_factors]]
        factor_type = "breakout"
    "#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = SimulationConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.simulation.position_pct, 0.25);
        assert_eq!(config.data.cache_dir, "data");
        assert_eq!(config.execution.gap_down_limit, 0.07);
        assert_eq!(config.universe().unwrap().len(), 2);
        assert!(config.benchmark().unwrap().is_none());
    }

    #[test]
    fn full_config_parses() {
        let toml_src = r#"
            [simulation]
            initial_capital = 500000.0
            position_pct = 0.5
            max_keep_days = 30
            start = "2020-01-01"
            end = "2020-12-31"
            benchmark = "sh000300"
            universe = ["sh600036"]

            [[buy_factors]]
            factor_type = "breakout"
            params = { lookback = 42.0 }

            [[sell_factors]]
            factor_type = "percent_stop"

            [data]
            cache_dir = "cache"
            fetch_mode = "local"
            span_years = 3

            [execution]
            gap_down_limit = 0.05
        "#;
        let config = SimulationConfig::from_toml(toml_src).unwrap();
        assert_eq!(config.simulation.max_keep_days, Some(30));
        assert_eq!(
            config.simulation.start,
            Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
        );
        assert_eq!(config.supplier_config().fetch_mode, FetchMode::LocalOnly);
        assert!(config.benchmark().unwrap().is_some());
        let chain = config.build_chain().unwrap();
        assert_eq!(chain.max_lookback(), 42);
    }

    #[test]
    fn universe_file_merges_and_dedups() {
        let dir = std::env::temp_dir().join(format!("factorlab_universe_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("universe.toml");
        std::fs::write(
            &path,
            r#"
            [groups]
            banks = ["sh600036", "sh601318"]
            tech = ["sz000001"]
            "#,
        )
        .unwrap();

        let toml_src = format!(
            r#"
            [simulation]
            initial_capital = 1000000.0
            universe = ["sh600036", "usAAPL"]
            universe_file = "{}"

            [[buy_factors]]
            factor_type = "breakout"
            "#,
            path.display()
        );
        let config = SimulationConfig::from_toml(&toml_src).unwrap();
        let universe = config.universe().unwrap();

        // Inline first, then file groups; sh600036 appears only once.
        let raw: Vec<String> = universe.iter().map(|s| s.to_string()).collect();
        assert_eq!(raw, vec!["sh600036", "usAAPL", "sh601318", "sz000001"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn universe_file_parses_groups() {
        let file = UniverseFile::from_toml(
            r#"
            [groups]
            banks = ["sh600036"]
            tech = ["sz000001", "usAAPL"]
            "#,
        )
        .unwrap();
        assert_eq!(file.symbol_count(), 3);
        assert_eq!(file.all_symbols(), vec!["sh600036", "sz000001", "usAAPL"]);
    }

    #[test]
    fn empty_universe_is_invalid() {
        let toml_src = r#"
            [simulation]
            initial_capital = 1000.0
            universe = []

            [[buy_factors]]
            factor_type = "breakout"
        "#;
        assert!(matches!(
            SimulationConfig::from_toml(toml_src),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_buy_factors_is_invalid() {
        let toml_src = r#"
            [simulation]
            initial_capital = 1000.0
            universe = ["sh600036"]
        "#;
        assert!(matches!(
            SimulationConfig::from_toml(toml_src),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn inverted_dates_are_invalid() {
        let toml_src = r#"
            [simulation]
            initial_capital = 1000.0
            start = "2021-01-01"
            end = "2020-01-01"
            universe = ["sh600036"]

            [[buy_factors]]
            factor_type = "breakout"
        "#;
        assert!(SimulationConfig::from_toml(toml_src).is_err());
    }
}
