//! Sell-factor implementations.

pub mod percent_stop;
pub mod trailing_stop;

pub use percent_stop::PercentStopSell;
pub use trailing_stop::TrailingStopSell;
