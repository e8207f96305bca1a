//! Symbol — market-qualified instrument identifier.
//!
//! A symbol is market + sub-market + code (e.g. `sh600036`, `usAAPL`,
//! `hk00700`). It is an immutable value type used as the store and ledger
//! key, created at simulation setup and never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Top-level market an instrument trades in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Market {
    Cn,
    Us,
    Hk,
}

/// Exchange within a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SubMarket {
    Sh,
    Sz,
    Nyse,
    Nasdaq,
    Hkex,
}

impl SubMarket {
    /// The market this exchange belongs to.
    pub fn market(&self) -> Market {
        match self {
            SubMarket::Sh | SubMarket::Sz => Market::Cn,
            SubMarket::Nyse | SubMarket::Nasdaq => Market::Us,
            SubMarket::Hkex => Market::Hk,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            SubMarket::Sh => "sh",
            SubMarket::Sz => "sz",
            SubMarket::Nyse | SubMarket::Nasdaq => "us",
            SubMarket::Hkex => "hk",
        }
    }
}

/// Market-qualified instrument identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub market: Market,
    pub sub_market: SubMarket,
    pub code: String,
}

impl Symbol {
    pub fn new(sub_market: SubMarket, code: impl Into<String>) -> Self {
        Self {
            market: sub_market.market(),
            sub_market,
            code: code.into(),
        }
    }

    /// Minimum order lot size for this symbol's market.
    ///
    /// CN and HK equities trade in board lots of 100 shares; US equities
    /// trade in single shares.
    pub fn min_lot(&self) -> u64 {
        match self.market {
            Market::Cn | Market::Hk => 100,
            Market::Us => 1,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sub_market.prefix(), self.code)
    }
}

/// Errors parsing a symbol from its compact string form.
#[derive(Debug, Error)]
pub enum SymbolParseError {
    #[error("symbol too short: '{0}'")]
    TooShort(String),
    #[error("unknown market prefix in '{0}'")]
    UnknownPrefix(String),
    #[error("empty instrument code in '{0}'")]
    EmptyCode(String),
}

impl FromStr for Symbol {
    type Err = SymbolParseError;

    /// Parse the compact form: `sh600036`, `sz000001`, `hk00700`, `usAAPL`.
    ///
    /// The compact form does not encode the US exchange; `us` parses as
    /// Nasdaq. Use `Symbol::new(SubMarket::Nyse, ..)` for NYSE listings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 3 {
            return Err(SymbolParseError::TooShort(s.to_string()));
        }
        let (prefix, code) = s.split_at(2);
        if code.is_empty() {
            return Err(SymbolParseError::EmptyCode(s.to_string()));
        }
        let sub_market = match prefix {
            "sh" => SubMarket::Sh,
            "sz" => SubMarket::Sz,
            "hk" => SubMarket::Hkex,
            "us" => SubMarket::Nasdaq,
            _ => return Err(SymbolParseError::UnknownPrefix(s.to_string())),
        };
        Ok(Symbol::new(sub_market, code))
    }
}
