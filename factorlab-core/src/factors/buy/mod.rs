//! Buy-factor implementations.

pub mod breakout;
pub mod ma_crossover;

pub use breakout::BreakoutBuy;
pub use ma_crossover::MaCrossoverBuy;
